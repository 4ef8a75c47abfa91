//! Storage Configuration
//!
//! Loaded from a JSON file. Only `data_dir` is required; everything else has
//! a default.
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "digest_algorithm": "md5",
//!   "log_level": "info",
//!   "database": { "name": "app_runtime_store", "version": 2 },
//!   "applet": { "quota_bytes": 209715200 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs::DigestAlgorithm;
use crate::observability::Severity;

/// Directory under `data_dir` holding the native private document root
pub const NATIVE_ROOT_DIR: &str = "_doc";

/// Directory under `data_dir` holding the applet sandbox
pub const APPLET_ROOT_DIR: &str = "usr";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Browser record database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name (default: "app_runtime_store")
    #[serde(default = "default_database_name")]
    pub name: String,

    /// Schema version; a bump runs the upgrade (default: 2)
    #[serde(default = "default_database_version")]
    pub version: u32,

    /// Byte quota of the flat string store (default: 5MB)
    #[serde(default = "default_string_store_quota")]
    pub string_store_quota_bytes: u64,
}

fn default_database_name() -> String {
    "app_runtime_store".to_string()
}

fn default_database_version() -> u32 {
    2
}

fn default_string_store_quota() -> u64 {
    5 * 1024 * 1024
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_database_name(),
            version: default_database_version(),
            string_store_quota_bytes: default_string_store_quota(),
        }
    }
}

/// Applet sandbox settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppletConfig {
    /// Total bytes the sandbox may hold (default: 200MB)
    #[serde(default = "default_applet_quota")]
    pub quota_bytes: u64,
}

fn default_applet_quota() -> u64 {
    200 * 1024 * 1024
}

impl Default for AppletConfig {
    fn default() -> Self {
        Self {
            quota_bytes: default_applet_quota(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory (required)
    pub data_dir: PathBuf,

    /// Fingerprint algorithm (default: md5)
    #[serde(default)]
    pub digest_algorithm: DigestAlgorithm,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub applet: AppletConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl StorageConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            digest_algorithm: DigestAlgorithm::default(),
            log_level: default_log_level(),
            database: DatabaseConfig::default(),
            applet: AppletConfig::default(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate a JSON document
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: StorageConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }

        self.severity()?;

        if self.database.name.is_empty() {
            return Err(ConfigError::Invalid("database.name must not be empty".into()));
        }

        if self.database.version == 0 {
            return Err(ConfigError::Invalid("database.version must be > 0".into()));
        }

        if self.applet.quota_bytes == 0 {
            return Err(ConfigError::Invalid("applet.quota_bytes must be > 0".into()));
        }

        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> Result<Severity, ConfigError> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }

    /// Native private document root
    pub fn native_root(&self) -> PathBuf {
        self.data_dir.join(NATIVE_ROOT_DIR)
    }

    /// Applet sandbox root
    pub fn applet_root(&self) -> PathBuf {
        self.data_dir.join(APPLET_ROOT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = StorageConfig::from_json(r#"{"data_dir": "/tmp/unifs"}"#).unwrap();
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Md5);
        assert_eq!(config.database.name, "app_runtime_store");
        assert_eq!(config.database.version, 2);
        assert_eq!(config.applet.quota_bytes, 200 * 1024 * 1024);
        assert_eq!(config.native_root(), PathBuf::from("/tmp/unifs/_doc"));
        assert_eq!(config.applet_root(), PathBuf::from("/tmp/unifs/usr"));
    }

    #[test]
    fn test_full_config() {
        let config = StorageConfig::from_json(
            r#"{
                "data_dir": "/data",
                "digest_algorithm": "sha256",
                "log_level": "warn",
                "database": {"name": "files", "version": 5},
                "applet": {"quota_bytes": 1024}
            }"#,
        )
        .unwrap();
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(config.severity().unwrap(), Severity::Warn);
        assert_eq!(config.database.version, 5);
        assert_eq!(config.database.string_store_quota_bytes, 5 * 1024 * 1024);
        assert_eq!(config.applet.quota_bytes, 1024);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            StorageConfig::from_json(r#"{"data_dir": ""}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(StorageConfig::from_json(r#"{"data_dir": "/d", "log_level": "loud"}"#).is_err());
        assert!(StorageConfig::from_json(r#"{"data_dir": "/d", "database": {"version": 0}}"#).is_err());
        assert!(matches!(StorageConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = StorageConfig::load(Path::new("/nonexistent/unifs.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
