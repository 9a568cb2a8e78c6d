//! Business logic and repository trait definitions for humanloop.
//!
//! This crate defines the "ports" (repository traits and the resume callback)
//! that the infrastructure layer implements, plus the coordinator services
//! built on them. It depends only on `humanloop-types` -- never on
//! `humanloop-infra` or any database/IO crate.

pub mod event;
pub mod ledger;
pub mod repository;
pub mod resume;
pub mod sweeper;
pub mod tracker;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;
