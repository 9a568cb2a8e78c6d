//! HMAC-SHA256 body signatures for outbound resume callbacks.
//!
//! The engine can authenticate a resume call by recomputing the MAC over the
//! raw body and comparing it with the `X-Humanloop-Signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the `sha256=<hex>` signature.
pub const SIGNATURE_HEADER: &str = "X-Humanloop-Signature";

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("HMAC signature verification failed")]
    Mismatch,

    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn compute_hmac_sha256_hex(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(body);
    Ok(hex_encode(&mac.finalize().into_bytes()))
}

/// Header value for a signed body: `sha256=<hex>`.
pub fn signature_header_value(secret: &[u8], body: &[u8]) -> Result<String, SignatureError> {
    Ok(format!("sha256={}", compute_hmac_sha256_hex(secret, body)?))
}

/// Constant-time check of a `sha256=<hex>` (or bare hex) signature.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> Result<(), SignatureError> {
    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let expected = hex_decode(hex_sig).ok_or(SignatureError::Mismatch)?;
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
