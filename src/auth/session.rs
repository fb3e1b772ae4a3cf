//! Token and nonce generation for authentication.

use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

/// Generate a cryptographically random session token.
///
/// Returns a URL-safe base64 string (43 characters) from 32 random bytes.
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically random sign-in nonce.
///
/// Returns 32 lowercase hex characters (128 bits). Sign-in messages require
/// an alphanumeric nonce, so base64 is not used here.
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_session_token() {
        let token = generate_session_token();

        assert_eq!(token.len(), 43);

        let decoded = general_purpose::URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn test_generate_nonce() {
        let nonce = generate_nonce();

        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hex::decode(&nonce).unwrap().len(), 16);
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_session_token(), generate_session_token());
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
