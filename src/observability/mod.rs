//! Observability for the storage subsystem
//!
//! - Structured logging (JSON, one line per event)
//! - Typed lifecycle and failure events
//!
//! Absorbed operation failures are logged here before the facade turns them
//! into an empty result, so "operation silently did nothing" still leaves a
//! trace.
//!
//! # Usage
//!
//! ```ignore
//! use unifs::observability::{log_event_with_fields, Event, Logger};
//!
//! Logger::warn("OP_FAILED", &[("op", "unlink"), ("path", "a.txt")]);
//! log_event_with_fields(Event::AdapterOpen, &[("backend", "native")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    if event.is_fatal() {
        Logger::fatal(event.as_str(), fields);
    } else {
        Logger::info(event.as_str(), fields);
    }
}
