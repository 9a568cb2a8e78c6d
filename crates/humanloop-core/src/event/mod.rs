//! Notification plumbing for coordinator events, plus the logging
//! subscriber the server runs.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, EventStream};
pub use logger::spawn_event_logger;
