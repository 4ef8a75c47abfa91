//! CLI argument definitions using clap
//!
//! Commands:
//! - unifs info
//! - unifs exec
//! - unifs read <path> [--json]
//! - unifs write <path> [--text <text>] [--json]
//! - unifs ls [path]
//! - unifs hash <path> [--text]
//! - unifs stat <path> [--kind file|audio|video|image]
//! - unifs rm|mkdir|rmdir|access <path>
//! - unifs cp <source> <target>
//!
//! `--config` and `--data-dir` apply to every command.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::fs::InfoKind;

/// unifs - One file storage API over native, browser and applet backends
#[derive(Parser, Debug)]
#[command(name = "unifs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory; overrides the configured one
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the active environment and configuration
    Info,

    /// Read operation requests from stdin, one JSON object per line
    Exec,

    /// Read a file
    Read {
        path: String,

        /// Parse the content as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a file from --text or stdin
    Write {
        path: String,

        /// Content to write; stdin is used when absent
        #[arg(long)]
        text: Option<String>,

        /// Store the content as a JSON document
        #[arg(long)]
        json: bool,
    },

    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },

    /// Content fingerprint of a stored file
    Hash {
        path: String,

        /// Hash the argument itself as text
        #[arg(long)]
        text: bool,
    },

    /// File or media metadata
    Stat {
        path: String,

        #[arg(long, default_value = "file")]
        kind: InfoKind,
    },

    /// Delete a file
    Rm { path: String },

    /// Create a directory
    Mkdir { path: String },

    /// Remove a directory recursively
    Rmdir { path: String },

    /// Copy a file
    Cp { source: String, target: String },

    /// Check that a path exists
    Access { path: String },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
