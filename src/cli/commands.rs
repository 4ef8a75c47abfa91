//! CLI command implementations
//!
//! Every storage command is expressed as a [`Request`] and goes through
//! [`dispatch`], so the one-shot commands and `exec` share one code path.
//! Facade results are reported as-is: an operation that failed is a
//! successful response whose data is `null` or `false`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::StorageConfig;
use crate::fs::{FileContent, FileSystem, HashInput, InfoKind};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::selector::{open_active, Environment, SharedFileSystem};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_requests, read_stdin, write_error, write_response};

/// Default data directory when neither `--config` nor `--data-dir` is given
const DEFAULT_DATA_DIR: &str = "./unifs-data";

/// Write payload: a JSON string is text, an array of numbers is binary
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<Payload> for FileContent {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => FileContent::Text(text),
            Payload::Bytes(bytes) => FileContent::Binary(bytes),
        }
    }
}

/// One storage operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    ReadFile { path: String },
    ReadJson { path: String },
    WriteFile { path: String, data: Payload },
    WriteJson { path: String, data: Value },
    ReadAndWrite { source: String, target: String },
    Mkdir { path: String },
    Unlink { path: String },
    Rmdir { path: String },
    Ensure { path: String },
    Readdir { path: String },
    Access { path: String },
    ReadFileInfo {
        path: String,
        #[serde(default = "default_kind")]
        kind: InfoKind,
    },
    ReadFileToHash {
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
}

fn default_kind() -> InfoKind {
    InfoKind::File
}

fn content_value(content: FileContent) -> Value {
    match content {
        FileContent::Text(text) => Value::String(text),
        FileContent::Binary(bytes) => json!(bytes),
    }
}

/// Run one request against `fs`. Facade results map to JSON directly.
pub async fn dispatch<F: FileSystem>(fs: &F, request: Request) -> Value {
    match request {
        Request::ReadFile { path } => fs
            .read_file(&path)
            .await
            .map(content_value)
            .unwrap_or(Value::Null),
        Request::ReadJson { path } => fs.read_json(&path).await.unwrap_or(Value::Null),
        Request::WriteFile { path, data } => json!(fs.write_file(&path, data.into()).await),
        Request::WriteJson { path, data } => json!(fs.write_json(&path, &data).await),
        Request::ReadAndWrite { source, target } => {
            json!(fs.read_and_write(&source, &target).await)
        }
        Request::Mkdir { path } => json!(fs.mkdir(&path).await),
        Request::Unlink { path } => json!(fs.unlink(&path).await),
        Request::Rmdir { path } => json!(fs.rmdir(&path).await),
        Request::Ensure { path } => json!(fs.ensure(&path).await),
        Request::Readdir { path } => json!(fs.readdir(&path).await),
        Request::Access { path } => json!(fs.access(&path).await),
        Request::ReadFileInfo { path, kind } => json!(fs.read_file_info(&path, kind).await),
        Request::ReadFileToHash { path, text } => {
            let input = match (&path, &text) {
                (Some(path), _) => HashInput::Path(path),
                (None, Some(text)) => HashInput::Text(text),
                (None, None) => return Value::Null,
            };
            json!(fs.read_file_to_hash(input).await)
        }
    }
}

/// Parse CLI args and run the command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cli: Cli) -> CliResult<()> {
    let config = configure(&cli)?;

    let request = match cli.command {
        Command::Info => return info(&config),
        Command::Exec => return exec(&config),
        Command::Read { path, json: true } => Request::ReadJson { path },
        Command::Read { path, json: false } => Request::ReadFile { path },
        Command::Write { path, text, json } => {
            let bytes = match text {
                Some(text) => text.into_bytes(),
                None => read_stdin()?,
            };
            if json {
                let data = serde_json::from_slice(&bytes)
                    .map_err(|e| CliError::bad_request(format!("Invalid JSON input: {}", e)))?;
                Request::WriteJson { path, data }
            } else {
                let data = match FileContent::from_bytes(bytes) {
                    FileContent::Text(text) => Payload::Text(text),
                    FileContent::Binary(bytes) => Payload::Bytes(bytes),
                };
                Request::WriteFile { path, data }
            }
        }
        Command::Ls { path } => Request::Readdir { path },
        Command::Hash { path, text: true } => Request::ReadFileToHash {
            path: None,
            text: Some(path),
        },
        Command::Hash { path, text: false } => Request::ReadFileToHash {
            path: Some(path),
            text: None,
        },
        Command::Stat { path, kind } => Request::ReadFileInfo { path, kind },
        Command::Rm { path } => Request::Unlink { path },
        Command::Mkdir { path } => Request::Mkdir { path },
        Command::Rmdir { path } => Request::Rmdir { path },
        Command::Cp { source, target } => Request::ReadAndWrite { source, target },
        Command::Access { path } => Request::Access { path },
    };

    let rt = runtime()?;
    let data = rt.block_on(async {
        let fs = open_active(&config).await?;
        Ok::<_, CliError>(dispatch(fs.as_ref(), request).await)
    })?;
    write_response(data)
}

/// Resolve configuration from `--config` and `--data-dir`
/// Load the config and apply its log level. Nothing is logged before the
/// level is in place.
fn configure(cli: &Cli) -> CliResult<StorageConfig> {
    let config = load_config(cli)?;
    Logger::set_min_severity(config.severity()?);

    let data_dir = config.data_dir.display().to_string();
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("data_dir", data_dir.as_str()),
            ("digest_algorithm", config.digest_algorithm.as_str()),
        ],
    );

    Ok(config)
}

fn load_config(cli: &Cli) -> CliResult<StorageConfig> {
    let mut config = match &cli.config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::with_data_dir(DEFAULT_DATA_DIR),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Report the active environment
pub fn info(config: &StorageConfig) -> CliResult<()> {
    write_response(json!({
        "environment": Environment::ACTIVE,
        "data_dir": config.data_dir,
        "digest_algorithm": config.digest_algorithm,
        "database": config.database,
        "applet": config.applet,
    }))
}

/// Serve JSON-lines requests from stdin against one adapter instance.
///
/// A malformed line gets an error response and the loop continues.
pub fn exec(config: &StorageConfig) -> CliResult<()> {
    let rt = runtime()?;
    let fs: SharedFileSystem = rt.block_on(open_active(config))?;

    for line in read_requests() {
        let value = match line {
            Ok(value) => value,
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                continue;
            }
        };

        match serde_json::from_value::<Request>(value) {
            Ok(request) => {
                let data = rt.block_on(dispatch(fs.as_ref(), request));
                write_response(data)?;
            }
            Err(e) => {
                let err = CliError::bad_request(e.to_string());
                write_error(err.code_str(), err.message())?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::NativePathAdapter;
    use crate::fs::DigestAlgorithm;
    use crate::observability::Severity;
    use clap::Parser;
    use tempfile::TempDir;

    fn request(value: Value) -> Request {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_parsing() {
        assert_eq!(
            request(json!({"op": "write_file", "path": "a", "data": "hi"})),
            Request::WriteFile {
                path: "a".into(),
                data: Payload::Text("hi".into())
            }
        );
        assert_eq!(
            request(json!({"op": "write_file", "path": "a", "data": [1, 2]})),
            Request::WriteFile {
                path: "a".into(),
                data: Payload::Bytes(vec![1, 2])
            }
        );
        assert_eq!(
            request(json!({"op": "read_file_info", "path": "a"})),
            Request::ReadFileInfo {
                path: "a".into(),
                kind: InfoKind::File
            }
        );
        assert!(serde_json::from_value::<Request>(json!({"op": "format_disk"})).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_against_native() {
        let temp = TempDir::new().unwrap();
        let fs = NativePathAdapter::open_at(temp.path().join("_doc"), DigestAlgorithm::Md5)
            .await
            .unwrap();

        let written = dispatch(&fs, request(json!({"op": "write_file", "path": "a.txt", "data": "hello"}))).await;
        assert!(written.is_string());

        assert_eq!(
            dispatch(&fs, request(json!({"op": "read_file", "path": "a.txt"}))).await,
            json!("hello")
        );
        assert_eq!(
            dispatch(&fs, request(json!({"op": "read_file_to_hash", "path": "a.txt"}))).await,
            json!("5d41402abc4b2a76b9719d911017c592")
        );
        assert_eq!(
            dispatch(&fs, request(json!({"op": "readdir", "path": ""}))).await,
            json!([{"name": "a.txt", "is_dir": false}])
        );
        assert_eq!(
            dispatch(&fs, request(json!({"op": "unlink", "path": "missing"}))).await,
            json!(false)
        );
        assert_eq!(
            dispatch(&fs, request(json!({"op": "read_file", "path": "missing"}))).await,
            Value::Null
        );
        assert_eq!(
            dispatch(&fs, request(json!({"op": "read_file_to_hash"}))).await,
            Value::Null
        );
    }

    #[test]
    fn test_configure_applies_level_first() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("unifs.json");
        let data_dir = temp.path().join("data");
        let document = json!({"data_dir": data_dir, "log_level": "error"});
        std::fs::write(&config_path, document.to_string()).unwrap();

        let cli = Cli::parse_from(["unifs", "--config", config_path.to_str().unwrap(), "info"]);
        let config = configure(&cli).unwrap();

        // CONFIG_LOADED is INFO, so it was already filtered when emitted
        assert_eq!(config.data_dir, data_dir);
        assert_eq!(Logger::min_severity(), Severity::Error);

        Logger::set_min_severity(Severity::Info);
    }
}
