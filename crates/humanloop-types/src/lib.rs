//! Shared domain types for humanloop.
//!
//! This crate contains the domain types of the human-in-the-loop coordinator:
//! Execution, Input Request, input schema, caller identity, coordinator
//! events, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod identity;
pub mod input_request;
pub mod schema;
