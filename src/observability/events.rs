//! Observable storage events
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events in the storage subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Configuration loaded
    ConfigLoaded,
    /// Active adapter opened
    AdapterOpen,
    /// Active adapter could not be opened (FATAL)
    AdapterOpenFailed,

    // Browser record store
    /// Version upgrade ran against the record database
    StoreUpgrade,
    /// Write rejected by a unique index
    ConstraintViolation,

    // Operations
    /// Facade operation absorbed a failure
    OpFailed,
    /// Applet sandbox refused an operation
    SandboxDenied,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::AdapterOpen => "ADAPTER_OPEN",
            Event::AdapterOpenFailed => "ADAPTER_OPEN_FAILED",
            Event::StoreUpgrade => "STORE_UPGRADE",
            Event::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Event::OpFailed => "OP_FAILED",
            Event::SandboxDenied => "SANDBOX_DENIED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::AdapterOpenFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
