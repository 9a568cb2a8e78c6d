//! Span names for the coordinator's externally visible operations.
//!
//! Fields on these spans use the `humanloop.*` prefix
//! (`humanloop.execution_id`, `humanloop.request_id`, `humanloop.step`).

/// An engine registering a pause point.
pub const REGISTER_PAUSE: &str = "humanloop.register_pause";

/// A human submission, including the resume callback round-trip.
pub const SUBMIT_INPUT: &str = "humanloop.submit_input";

/// A submission arriving through a signed form link.
pub const SUBMIT_FORM: &str = "humanloop.submit_form";

/// An administrative cancel of the open pause.
pub const CANCEL_INPUT: &str = "humanloop.cancel_input";

/// One pass of the expiry sweeper started from the CLI.
pub const SWEEP: &str = "humanloop.sweep";
