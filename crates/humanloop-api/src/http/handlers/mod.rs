//! HTTP request handlers for the REST API.

pub mod execution;
pub mod form;
pub mod input;
