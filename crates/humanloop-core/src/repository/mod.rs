//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (humanloop-infra) implements. Every status change is expressed as a
//! conditional update whose boolean result tells the caller whether it won;
//! the core crate never takes locks around storage.

pub mod execution;
pub mod input_request;
