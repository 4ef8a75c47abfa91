//! CLI module for unifs
//!
//! Provides command-line access to the active storage backend:
//! - info: Report the backend this build targets
//! - exec: Run JSON-lines operation requests against one adapter
//! - read, write, ls, hash, stat, rm, mkdir, rmdir, cp, access: one-shot operations

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{dispatch, exec, info, run, run_command, Payload, Request};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_requests, write_error, write_response};
