//! Sign-In With Ethereum (EIP-4361) message parsing.
//!
//! The parser is a single forward pass over the message lines. It never
//! re-serializes: [`ParsedMessage`] keeps the verbatim bytes it was parsed
//! from, and signature verification must use those bytes.
//!
//! Layout accepted:
//!
//! ```text
//! example.com wants you to sign in with your Ethereum account:
//! 0xAbC...
//!
//! Optional statement
//!
//! URI: https://example.com
//! Version: 1
//! Chain ID: 1
//! Nonce: 8f3a...
//! Issued At: 2024-01-01T00:00:00Z
//! ```
//!
//! Labelled fields are matched by line prefix; the first occurrence of a
//! label wins. A statement line that starts with a label is read as that
//! field.

use chrono::{DateTime, Utc};

const DOMAIN_SEPARATOR: &str = " wants you to sign in";
const MIN_LINES: usize = 6;

const URI_LABEL: &str = "URI:";
const VERSION_LABEL: &str = "Version:";
const CHAIN_ID_LABEL: &str = "Chain ID:";
const NONCE_LABEL: &str = "Nonce:";
const ISSUED_AT_LABEL: &str = "Issued At:";

const LABELS: [&str; 5] = [
    URI_LABEL,
    VERSION_LABEL,
    CHAIN_ID_LABEL,
    NONCE_LABEL,
    ISSUED_AT_LABEL,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("message too short")]
    TooShort,

    #[error("invalid domain line")]
    InvalidDomainLine,

    #[error("missing address line")]
    MissingAddress,
}

/// Structured view of a sign-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub domain: String,
    /// As written in the message; compare with [`ParsedMessage::address_lower`].
    pub address: String,
    pub statement: Option<String>,
    pub uri: Option<String>,
    pub version: Option<String>,
    pub chain_id: Option<String>,
    /// Empty when the message carries no `Nonce:` line.
    pub nonce: String,
    /// `None` when absent or not valid RFC 3339.
    pub issued_at: Option<DateTime<Utc>>,
    raw: Vec<u8>,
}

impl ParsedMessage {
    /// The exact bytes the message was parsed from.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn address_lower(&self) -> String {
        self.address.to_lowercase()
    }
}

/// Parse an untrusted sign-in message.
pub fn parse(raw: &[u8]) -> Result<ParsedMessage, ParseError> {
    let text = String::from_utf8_lossy(raw);
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.trim().split('\n').collect();

    if lines.iter().filter(|l| !l.trim().is_empty()).count() < MIN_LINES {
        return Err(ParseError::TooShort);
    }

    let (domain, _) = lines[0]
        .split_once(DOMAIN_SEPARATOR)
        .ok_or(ParseError::InvalidDomainLine)?;
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(ParseError::InvalidDomainLine);
    }

    let mut rest = lines[1..].iter().map(|l| l.trim());

    let address = rest
        .by_ref()
        .find(|l| !l.is_empty())
        .ok_or(ParseError::MissingAddress)?;

    let mut parsed = ParsedMessage {
        domain: domain.to_string(),
        address: address.to_string(),
        statement: None,
        uri: None,
        version: None,
        chain_id: None,
        nonce: String::new(),
        issued_at: None,
        raw: raw.to_vec(),
    };

    let mut seen_field = false;
    let mut nonce_set = false;
    let mut issued_at_set = false;

    for line in rest {
        if line.is_empty() {
            continue;
        }

        let Some(label) = LABELS.iter().find(|label| line.starts_with(**label)) else {
            // Free text before the first field is the statement
            if !seen_field && parsed.statement.is_none() {
                parsed.statement = Some(line.to_string());
            }
            continue;
        };
        seen_field = true;

        let value = line[label.len()..].trim();
        match *label {
            URI_LABEL => set_once(&mut parsed.uri, value),
            VERSION_LABEL => set_once(&mut parsed.version, value),
            CHAIN_ID_LABEL => set_once(&mut parsed.chain_id, value),
            NONCE_LABEL if !nonce_set => {
                parsed.nonce = value.to_string();
                nonce_set = true;
            }
            ISSUED_AT_LABEL if !issued_at_set => {
                parsed.issued_at = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
                issued_at_set = true;
            }
            _ => {}
        }
    }

    Ok(parsed)
}

fn set_once(field: &mut Option<String>, value: &str) {
    if field.is_none() {
        *field = Some(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FULL: &str = "example.com wants you to sign in with your Ethereum account:\n\
        0xABCDEF0123456789abcdef0123456789ABCDEF01\n\
        \n\
        Sign in to the marketplace.\n\
        \n\
        URI: https://example.com\n\
        Version: 1\n\
        Chain ID: 1\n\
        Nonce: abc123\n\
        Issued At: 2024-01-01T00:00:00Z";

    #[test]
    fn test_parse_all_fields() {
        let parsed = parse(FULL.as_bytes()).unwrap();

        assert_eq!(parsed.domain, "example.com");
        assert_eq!(parsed.address, "0xABCDEF0123456789abcdef0123456789ABCDEF01");
        assert_eq!(
            parsed.address_lower(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
        assert_eq!(
            parsed.statement.as_deref(),
            Some("Sign in to the marketplace.")
        );
        assert_eq!(parsed.uri.as_deref(), Some("https://example.com"));
        assert_eq!(parsed.version.as_deref(), Some("1"));
        assert_eq!(parsed.chain_id.as_deref(), Some("1"));
        assert_eq!(parsed.nonce, "abc123");
        assert_eq!(
            parsed.issued_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parsed.raw(), FULL.as_bytes());
    }

    #[test]
    fn test_raw_bytes_are_verbatim() {
        let crlf = format!("  {}\r\n", FULL.replace('\n', "\r\n"));
        let parsed = parse(crlf.as_bytes()).unwrap();

        assert_eq!(parsed.nonce, "abc123");
        assert_eq!(parsed.raw(), crlf.as_bytes());
    }

    #[test]
    fn test_too_short() {
        let msg = "example.com wants you to sign in with your Ethereum account:\n0xabc\n\n\nNonce: x";
        assert_eq!(parse(msg.as_bytes()), Err(ParseError::TooShort));
        assert_eq!(parse(b""), Err(ParseError::TooShort));
    }

    #[test]
    fn test_line_count_boundary() {
        let five = "example.com wants you to sign in with your Ethereum account:\n\
            0xabc\n\
            \n\
            URI: https://example.com\n\
            Version: 1\n\
            Nonce: abc123";
        assert_eq!(parse(five.as_bytes()), Err(ParseError::TooShort));

        let six = format!("{}\nChain ID: 1", five);
        let parsed = parse(six.as_bytes()).unwrap();
        assert_eq!(parsed.nonce, "abc123");
        assert_eq!(parsed.chain_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_missing_domain_separator() {
        let msg = FULL.replace(" wants you to sign in", " would like you to log in");
        assert_eq!(parse(msg.as_bytes()), Err(ParseError::InvalidDomainLine));
    }

    #[test]
    fn test_empty_domain() {
        let msg = FULL.replace("example.com wants", " wants");
        assert_eq!(parse(msg.as_bytes()), Err(ParseError::InvalidDomainLine));
    }

    #[test]
    fn test_blank_lines_before_address() {
        let msg = FULL.replace(":\n0xABCDEF", ":\n\n\n0xABCDEF");
        let parsed = parse(msg.as_bytes()).unwrap();
        assert_eq!(parsed.address, "0xABCDEF0123456789abcdef0123456789ABCDEF01");
    }

    #[test]
    fn test_optional_fields_absent() {
        let msg = "example.com wants you to sign in with your Ethereum account:\n\
            0xabc\n\
            \n\
            one\n\
            two\n\
            three\n\
            Nonce: n1";
        let parsed = parse(msg.as_bytes()).unwrap();

        assert_eq!(parsed.statement.as_deref(), Some("one"));
        assert_eq!(parsed.uri, None);
        assert_eq!(parsed.version, None);
        assert_eq!(parsed.chain_id, None);
        assert_eq!(parsed.issued_at, None);
        assert_eq!(parsed.nonce, "n1");
    }

    #[test]
    fn test_missing_nonce_is_empty() {
        let msg = FULL.replace("Nonce: abc123", "Request ID: 7");
        let parsed = parse(msg.as_bytes()).unwrap();
        assert!(parsed.nonce.is_empty());
    }

    #[test]
    fn test_unparsable_issued_at_is_absent() {
        let msg = FULL.replace("2024-01-01T00:00:00Z", "yesterday");
        let parsed = parse(msg.as_bytes()).unwrap();
        assert_eq!(parsed.issued_at, None);
        assert_eq!(parsed.nonce, "abc123");
    }

    #[test]
    fn test_first_label_wins() {
        let msg = format!("{}\nNonce: second", FULL);
        let parsed = parse(msg.as_bytes()).unwrap();
        assert_eq!(parsed.nonce, "abc123");
    }

    #[test]
    fn test_label_inside_free_text_is_not_a_field() {
        let msg = FULL.replace(
            "Sign in to the marketplace.",
            "Your Nonce: is below, do not share it",
        );
        let parsed = parse(msg.as_bytes()).unwrap();
        assert_eq!(parsed.nonce, "abc123");
        assert_eq!(
            parsed.statement.as_deref(),
            Some("Your Nonce: is below, do not share it")
        );
    }

    #[test]
    fn test_adversarial_input_is_linear() {
        let long = "Nonce:".repeat(50_000);
        let msg = format!("{}\n{}", FULL, long);
        let parsed = parse(msg.as_bytes()).unwrap();
        assert_eq!(parsed.nonce, "abc123");
    }
}
