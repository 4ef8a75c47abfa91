//! Environment Selector
//!
//! The active backend is fixed when the crate is built, through the
//! `native`, `browser` and `applet` cargo features. When more than one is
//! enabled the priority is browser, then applet, then native.
//!
//! Exactly one adapter is constructed. If it cannot be opened the failure is
//! logged as FATAL and returned; there is no second choice.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::config::StorageConfig;
use crate::fs::{FileSystem, InitError};
use crate::observability::{log_event_with_fields, Event};

/// Deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Native,
    Browser,
    Applet,
}

impl Environment {
    /// The environment this build targets
    pub const ACTIVE: Environment = if cfg!(feature = "browser") {
        Environment::Browser
    } else if cfg!(feature = "applet") {
        Environment::Applet
    } else {
        Environment::Native
    };

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Native => "native",
            Environment::Browser => "browser",
            Environment::Applet => "applet",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An adapter that can be opened from configuration
pub trait Backend: FileSystem + Sized {
    const ENVIRONMENT: Environment;

    fn open(config: &StorageConfig) -> impl Future<Output = Result<Self, InitError>> + Send;
}

/// The adapter compiled in as the active one
#[cfg(feature = "browser")]
pub type ActiveFileSystem = crate::fs::BrowserStoreAdapter;

/// The adapter compiled in as the active one
#[cfg(all(feature = "applet", not(feature = "browser")))]
pub type ActiveFileSystem = crate::fs::AppletPathAdapter;

/// The adapter compiled in as the active one
#[cfg(not(any(feature = "browser", feature = "applet")))]
pub type ActiveFileSystem = crate::fs::NativePathAdapter;

/// Shared handle to inject into consumers
pub type SharedFileSystem = Arc<ActiveFileSystem>;

/// Open a specific backend, logging a fatal event when it fails
pub async fn open_backend<B: Backend>(config: &StorageConfig) -> Result<B, InitError> {
    match B::open(config).await {
        Ok(backend) => {
            let data_dir = config.data_dir.display().to_string();
            log_event_with_fields(
                Event::AdapterOpen,
                &[("environment", B::ENVIRONMENT.as_str()), ("data_dir", data_dir.as_str())],
            );
            Ok(backend)
        }
        Err(e) => {
            let message = e.to_string();
            log_event_with_fields(
                Event::AdapterOpenFailed,
                &[("environment", B::ENVIRONMENT.as_str()), ("error", message.as_str())],
            );
            Err(e)
        }
    }
}

/// Open the active backend. Call once at startup and inject the result.
pub async fn open_active(config: &StorageConfig) -> Result<SharedFileSystem, InitError> {
    open_backend::<ActiveFileSystem>(config).await.map(Arc::new)
}
