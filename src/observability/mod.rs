//! Observability for sdstore
//!
//! - Structured logging (one JSON object per line on stderr)
//! - Typed lifecycle events
//! - Begin/complete scopes around disk operations
//!
//! Logging is read-only: it never changes the outcome of an operation,
//! and a failure to write a log line is ignored.
//!
//! ```ignore
//! use sdstore::observability::{Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Info);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
