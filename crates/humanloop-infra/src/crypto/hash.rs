//! SHA-256 hashing and random secret generation.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `content`.
pub fn sha256_hex(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// `bytes` bytes from the OS RNG, hex encoded.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// A fresh plaintext API key. Only its hash is ever stored.
pub fn generate_api_key() -> String {
    format!("hloop_{}", random_hex(32))
}
