//! Outbound resume callbacks to the workflow engine.

pub mod http;

pub use http::HttpResumeCallback;
