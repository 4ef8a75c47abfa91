//! unifs - One asynchronous file storage API over three backends
//!
//! The backend is chosen when the crate is built (`native`, `browser` or
//! `applet` feature) and opened once through [`selector::open_active`].

pub mod cli;
pub mod config;
pub mod fs;
pub mod observability;
pub mod selector;

pub use config::StorageConfig;
pub use fs::{FileContent, FileSystem};
pub use selector::{open_active, Environment, SharedFileSystem};
