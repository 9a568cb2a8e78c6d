//! Infrastructure layer for humanloop.
//!
//! Contains implementations of the ports defined in `humanloop-core`: SQLite
//! repositories, the HTTP resume callback, plus form-token signing and the
//! configuration loader.

pub mod callback;
pub mod config;
pub mod crypto;
pub mod sqlite;
