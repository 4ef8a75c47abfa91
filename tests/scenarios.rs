//! End-to-End Scenario Tests
//!
//! - The logs lifecycle on the path-hierarchical adapters
//! - JSON documents on the record-database adapter
//! - Content-digest uniqueness on the record-database adapter
//! - Sandbox quota and escape handling on the applet adapter
//! - Startup through the environment selector

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use unifs::config::DatabaseConfig;
use unifs::fs::{
    AppletPathAdapter, BrowserStoreAdapter, DatabaseFactory, DigestAlgorithm, FileContent,
    FileSystem, HashInput, NativePathAdapter, SandboxFileManager, StringStore,
};
use unifs::selector::{open_active, open_backend, Backend, Environment};
use unifs::StorageConfig;

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

async fn logs_lifecycle<F: FileSystem>(fs: &F) {
    assert!(fs.ensure("logs").await, "{}", fs.backend());
    assert!(fs.write_file("logs/a.txt", "hello".into()).await.is_some());
    assert!(fs.access("logs/a.txt").await, "{}", fs.backend());
    assert_eq!(fs.read_file("logs/a.txt").await, Some(FileContent::Text("hello".into())));
    assert!(fs.unlink("logs/a.txt").await, "{}", fs.backend());
    assert!(!fs.access("logs/a.txt").await, "{}", fs.backend());
}

// =============================================================================
// Path-hierarchical adapters
// =============================================================================

#[tokio::test]
async fn test_logs_lifecycle_native() {
    let temp = create_temp_data_dir();
    let config = StorageConfig::with_data_dir(temp.path());
    let fs = <NativePathAdapter as Backend>::open(&config).await.unwrap();

    logs_lifecycle(&fs).await;
    assert!(fs.root().join("logs").is_dir());
}

#[tokio::test]
async fn test_logs_lifecycle_applet() {
    let temp = create_temp_data_dir();
    let config = StorageConfig::with_data_dir(temp.path());
    let fs = <AppletPathAdapter as Backend>::open(&config).await.unwrap();

    logs_lifecycle(&fs).await;
    assert_eq!(fs.manager().usage().await, 0);
}

#[tokio::test]
async fn test_native_access_rejects_empty_file() {
    let temp = create_temp_data_dir();
    let fs = NativePathAdapter::open_at(temp.path().to_path_buf(), DigestAlgorithm::Md5)
        .await
        .unwrap();

    fs.write_file("empty.txt", "".into()).await.unwrap();
    assert!(!fs.access("empty.txt").await);
    assert!(temp.path().join("empty.txt").is_file());
}

#[tokio::test]
async fn test_native_paths_cannot_escape_root() {
    let temp = create_temp_data_dir();
    let fs = NativePathAdapter::open_at(temp.path().join("_doc"), DigestAlgorithm::Md5)
        .await
        .unwrap();

    assert!(fs.write_file("../outside.txt", "x".into()).await.is_none());
    assert!(!temp.path().join("outside.txt").exists());
    // A leading slash is relative to the root
    assert!(fs.write_file("/inside.txt", "y".into()).await.is_some());
    assert!(temp.path().join("_doc").join("inside.txt").is_file());
}

#[tokio::test]
async fn test_applet_quota_and_escape() {
    let temp = create_temp_data_dir();
    let manager = SandboxFileManager::open(temp.path().join("usr"), 8).await.unwrap();
    let fs = AppletPathAdapter::new(manager, DigestAlgorithm::Md5);

    assert!(fs.write_file("small.txt", "1234".into()).await.is_some());
    assert!(fs.write_file("big.txt", "123456789".into()).await.is_none());
    assert!(!fs.access("big.txt").await);

    assert!(fs.read_file("../secret").await.is_none());
    assert!(!fs.mkdir("../escape").await);
    assert!(!temp.path().join("escape").exists());
}

#[tokio::test]
async fn test_applet_concurrent_ensure() {
    let temp = create_temp_data_dir();
    let config = StorageConfig::with_data_dir(temp.path());
    let fs = Arc::new(<AppletPathAdapter as Backend>::open(&config).await.unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fs = Arc::clone(&fs);
            tokio::spawn(async move { fs.ensure("shared").await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert!(fs.access("shared").await);
}

// =============================================================================
// Record database adapter
// =============================================================================

#[tokio::test]
async fn test_browser_json_scenario() {
    let config = StorageConfig::with_data_dir("unused");
    let fs = BrowserStoreAdapter::open_in_memory(&config).unwrap();

    assert!(fs.write_json("cfg", &json!({"a": 1})).await.is_some());
    assert_eq!(fs.read_json("cfg").await, Some(json!({"a": 1})));
}

#[tokio::test]
async fn test_browser_duplicate_digest_rejected() {
    let config = StorageConfig::with_data_dir("unused");
    let fs = BrowserStoreAdapter::open_in_memory(&config).unwrap();

    assert!(fs.write_file("first.bin", vec![1u8, 2, 3].into()).await.is_some());
    assert!(fs.write_file("second.bin", vec![1u8, 2, 3].into()).await.is_none());

    let digest = fs
        .read_file_to_hash(HashInput::Bytes(&[1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(fs.records_with_hash(&digest), vec!["first.bin".to_string()]);
    assert_eq!(fs.record_count(), 1);
    assert!(fs.read_file("second.bin").await.is_none());
}

#[tokio::test]
async fn test_browser_overwrite_into_taken_digest_keeps_old_content() {
    let config = StorageConfig::with_data_dir("unused");
    let fs = BrowserStoreAdapter::open_in_memory(&config).unwrap();

    fs.write_file("a.txt", "alpha".into()).await.unwrap();
    fs.write_file("b.txt", "beta".into()).await.unwrap();

    assert!(fs.write_file("b.txt", "alpha".into()).await.is_none());
    assert_eq!(fs.read_file("b.txt").await, Some(FileContent::Text("beta".into())));
}

#[tokio::test]
async fn test_browser_state_shared_across_reopen() {
    let factory = DatabaseFactory::new();
    let strings = Arc::new(StringStore::new(1024 * 1024));
    let db_config = DatabaseConfig::default();

    let first =
        BrowserStoreAdapter::open_with(&factory, strings.clone(), &db_config, DigestAlgorithm::Md5)
            .unwrap();
    first.write_file("kept.txt", "persisted".into()).await.unwrap();
    first.write_json("cfg", &json!({"n": 2})).await.unwrap();

    let bumped = DatabaseConfig {
        version: db_config.version + 1,
        ..db_config
    };
    let second =
        BrowserStoreAdapter::open_with(&factory, strings, &bumped, DigestAlgorithm::Md5).unwrap();

    assert_eq!(second.database().object_store_names().len(), 1);
    assert_eq!(second.read_file("kept.txt").await, Some("persisted".into()));
    assert_eq!(second.read_json("cfg").await, Some(json!({"n": 2})));
}

#[tokio::test]
async fn test_browser_string_store_quota() {
    let mut config = StorageConfig::with_data_dir("unused");
    config.database.string_store_quota_bytes = 16;
    let fs = BrowserStoreAdapter::open_in_memory(&config).unwrap();

    assert!(fs.write_json("k", &json!([1, 2, 3, 4, 5, 6, 7, 8, 9])).await.is_none());
    assert!(fs.read_json("k").await.is_none());
}

// =============================================================================
// Selector
// =============================================================================

#[tokio::test]
async fn test_open_active_matches_build() {
    let temp = create_temp_data_dir();
    let config = StorageConfig::with_data_dir(temp.path());

    let fs = open_active(&config).await.unwrap();
    assert_eq!(fs.backend(), Environment::ACTIVE.as_str());
    assert!(fs.ensure("startup").await);
}

#[tokio::test]
async fn test_open_backend_failure_is_fatal_error() {
    let temp = create_temp_data_dir();
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, b"occupied").unwrap();
    let config = StorageConfig::with_data_dir(&blocker);

    assert!(open_backend::<NativePathAdapter>(&config).await.is_err());
    assert!(open_backend::<AppletPathAdapter>(&config).await.is_err());
}

#[tokio::test]
async fn test_sha256_config_flows_to_adapters() {
    let temp = create_temp_data_dir();
    let mut config = StorageConfig::with_data_dir(temp.path());
    config.digest_algorithm = DigestAlgorithm::Sha256;

    let fs = <NativePathAdapter as Backend>::open(&config).await.unwrap();
    let digest = fs.read_file_to_hash(HashInput::Text("hello")).await.unwrap();
    assert_eq!(
        digest.as_str(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}
