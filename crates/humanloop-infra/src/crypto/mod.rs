//! Cryptographic helpers for humanloop.
//!
//! - `hash`: SHA-256 hashing and random secret generation for API keys
//! - `signature`: HMAC-SHA256 signing of outbound resume callbacks
//! - `token`: signed, expiring form-link tokens

pub mod hash;
pub mod signature;
pub mod token;
