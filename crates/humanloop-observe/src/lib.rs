//! Observability for humanloop: subscriber setup and span naming.

pub mod spans;
pub mod telemetry;
