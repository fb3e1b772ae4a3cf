//! Ethereum personal-message (EIP-191) signature verification.
//!
//! The signer's address is recovered from the signature over
//! `keccak256("\x19Ethereum Signed Message:\n" ++ len(message) ++ message)`
//! and compared case-insensitively with the address the message claims.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// `r || s || v`
const SIGNATURE_LEN: usize = 65;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// Bad transport encoding or wrong byte length.
    #[error("Invalid signature format: {0}")]
    InvalidFormat(String),

    /// No public key could be recovered from the signature.
    #[error("Failed to recover public key")]
    RecoveryFailed,

    /// The recovered address differs from the claimed one.
    #[error("Signer mismatch")]
    Mismatch { recovered: String, claimed: String },
}

/// Hash a message the way `personal_sign` does before signing.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Lower-case `0x` address of a public key: the last 20 bytes of the
/// keccak256 of its uncompressed encoding without the `0x04` tag.
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Decode a hex signature (optional `0x` prefix) into its 65 raw bytes.
pub fn decode_signature(signature: &str) -> Result<[u8; SIGNATURE_LEN], SignatureError> {
    let trimmed = signature.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let bytes = hex::decode(hex_part)
        .map_err(|e| SignatureError::InvalidFormat(format!("invalid hex: {}", e)))?;

    bytes.try_into().map_err(|b: Vec<u8>| {
        SignatureError::InvalidFormat(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LEN,
            b.len()
        ))
    })
}

/// Recover the signer address of `message` from a raw 65-byte signature.
///
/// `v` may be 0/1 or the legacy 27/28. High-`s` signatures are normalised
/// first, flipping the recovery parity to match.
pub fn recover_address(
    message: &[u8],
    signature: &[u8; SIGNATURE_LEN],
) -> Result<String, SignatureError> {
    let mut v = signature[64];
    if v >= 27 {
        v -= 27;
    }
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(SignatureError::RecoveryFailed)?;

    let mut sig =
        Signature::from_slice(&signature[..64]).map_err(|_| SignatureError::RecoveryFailed)?;
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;

    Ok(address_of(&key))
}

/// Verify that `signature` over the exact `message` bytes was produced by
/// `claimed_address`.
pub fn verify_signature(
    message: &[u8],
    signature: &str,
    claimed_address: &str,
) -> Result<(), SignatureError> {
    let raw = decode_signature(signature)?;
    let recovered = recover_address(message, &raw)?;

    if !recovered.eq_ignore_ascii_case(claimed_address.trim()) {
        return Err(SignatureError::Mismatch {
            recovered,
            claimed: claimed_address.to_string(),
        });
    }

    Ok(())
}
