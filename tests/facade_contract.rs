//! Facade Contract Tests
//!
//! Every adapter must honor the same resolve-not-reject contract:
//! - Round-trip: a written file reads back byte-identical
//! - unlink of a never-written path resolves false
//! - mkdir/ensure twice is idempotent and keeps directory contents
//! - mkdir/ensure over an existing file resolves false
//! - Hashing is deterministic within and across adapters
//! - Missing resources resolve to empty values

use serde_json::json;
use tempfile::TempDir;
use unifs::fs::{
    AppletPathAdapter, BrowserStoreAdapter, FileContent, FileSystem, HashInput, InfoKind,
    NativePathAdapter,
};
use unifs::selector::Backend;
use unifs::StorageConfig;

// =============================================================================
// Test Utilities
// =============================================================================

struct Adapters {
    _temp: TempDir,
    native: NativePathAdapter,
    browser: BrowserStoreAdapter,
    applet: AppletPathAdapter,
}

async fn open_all() -> Adapters {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config = StorageConfig::with_data_dir(temp.path());

    Adapters {
        native: <NativePathAdapter as Backend>::open(&config).await.unwrap(),
        browser: <BrowserStoreAdapter as Backend>::open(&config).await.unwrap(),
        applet: <AppletPathAdapter as Backend>::open(&config).await.unwrap(),
        _temp: temp,
    }
}

async fn check_round_trip<F: FileSystem>(fs: &F) {
    let text = FileContent::Text("round trip text".into());
    let binary = FileContent::Binary(vec![0xff, 0x00, 0xfe, 0x01]);

    assert!(fs.write_file("t.txt", text.clone()).await.is_some(), "{}", fs.backend());
    assert!(fs.write_file("b.bin", binary.clone()).await.is_some(), "{}", fs.backend());

    assert_eq!(fs.read_file("t.txt").await, Some(text), "{}", fs.backend());
    assert_eq!(fs.read_file("b.bin").await, Some(binary), "{}", fs.backend());

    // Overwrite replaces
    fs.write_file("t.txt", "second".into()).await.unwrap();
    assert_eq!(fs.read_file("t.txt").await, Some("second".into()), "{}", fs.backend());
}

async fn check_missing_resolves_empty<F: FileSystem>(fs: &F) {
    assert!(!fs.unlink("never-written.txt").await, "{}", fs.backend());
    assert!(fs.read_file("never-written.txt").await.is_none(), "{}", fs.backend());
    assert!(fs.read_json("never-written.json").await.is_none(), "{}", fs.backend());
    assert!(!fs.access("never-written.txt").await, "{}", fs.backend());
    assert!(fs.read_file_info("never-written.txt", InfoKind::File).await.is_none());
    assert!(fs.read_file_to_hash(HashInput::Path("never-written.txt")).await.is_none());
    assert!(fs.read_and_write("never-written.txt", "copy.txt").await.is_none());
}

async fn check_mkdir_idempotent<F: FileSystem>(fs: &F) {
    assert!(fs.mkdir("dir").await, "{}", fs.backend());
    assert!(fs.ensure("dir").await, "{}", fs.backend());
    fs.write_file("dir/keep.txt", "kept content".into()).await.unwrap();

    assert!(fs.mkdir("dir").await, "{}", fs.backend());
    assert!(fs.ensure("dir").await, "{}", fs.backend());
    assert_eq!(
        fs.read_file("dir/keep.txt").await,
        Some("kept content".into()),
        "{}",
        fs.backend()
    );
}

async fn check_mkdir_over_file<F: FileSystem>(fs: &F) {
    fs.write_file("plain", "not a dir".into()).await.unwrap();

    assert!(!fs.mkdir("plain").await, "{}", fs.backend());
    assert!(!fs.ensure("plain").await, "{}", fs.backend());
    assert_eq!(fs.read_file("plain").await, Some("not a dir".into()), "{}", fs.backend());
}

async fn check_json<F: FileSystem>(fs: &F) {
    fs.write_json("cfg", &json!({"a": 1})).await.unwrap();
    assert_eq!(fs.read_json("cfg").await, Some(json!({"a": 1})), "{}", fs.backend());

    // Strings are written verbatim, not re-quoted
    fs.write_json("raw", &json!("[1, 2]")).await.unwrap();
    assert_eq!(fs.read_json("raw").await, Some(json!([1, 2])), "{}", fs.backend());
}

// =============================================================================
// Round trip
// =============================================================================

#[tokio::test]
async fn test_round_trip_all_adapters() {
    let a = open_all().await;
    check_round_trip(&a.native).await;
    check_round_trip(&a.browser).await;
    check_round_trip(&a.applet).await;
}

// =============================================================================
// Missing resources
// =============================================================================

#[tokio::test]
async fn test_missing_resolves_empty_all_adapters() {
    let a = open_all().await;
    check_missing_resolves_empty(&a.native).await;
    check_missing_resolves_empty(&a.browser).await;
    check_missing_resolves_empty(&a.applet).await;
}

// =============================================================================
// Directories
// =============================================================================

#[tokio::test]
async fn test_mkdir_ensure_idempotent_all_adapters() {
    let a = open_all().await;
    check_mkdir_idempotent(&a.native).await;
    check_mkdir_idempotent(&a.browser).await;
    check_mkdir_idempotent(&a.applet).await;
}

// Browser records are flat, so only path-hierarchical adapters can collide
#[tokio::test]
async fn test_mkdir_over_file_hierarchical_adapters() {
    let a = open_all().await;
    check_mkdir_over_file(&a.native).await;
    check_mkdir_over_file(&a.applet).await;
}

#[tokio::test]
async fn test_readdir_lists_children_all_adapters() {
    let a = open_all().await;

    async fn listing<F: FileSystem>(fs: &F) -> Vec<(String, bool)> {
        assert!(fs.ensure("box").await);
        assert!(fs.ensure("box/inner").await);
        fs.write_file("box/one.txt", "one".into()).await.unwrap();
        fs.write_file("box/inner/two.txt", "two".into()).await.unwrap();
        fs.readdir("box")
            .await
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect()
    }

    let expected = vec![("inner".to_string(), true), ("one.txt".to_string(), false)];
    assert_eq!(listing(&a.native).await, expected);
    assert_eq!(listing(&a.browser).await, expected);
    assert_eq!(listing(&a.applet).await, expected);
}

#[tokio::test]
async fn test_rmdir_recursive_all_adapters() {
    let a = open_all().await;

    async fn remove<F: FileSystem>(fs: &F) {
        assert!(fs.ensure("tree/sub").await, "{}", fs.backend());
        fs.write_file("tree/sub/leaf.txt", "leaf".into()).await.unwrap();
        assert!(fs.rmdir("tree").await, "{}", fs.backend());
        assert!(!fs.access("tree/sub/leaf.txt").await, "{}", fs.backend());
    }

    remove(&a.native).await;
    remove(&a.browser).await;
    remove(&a.applet).await;
}

// =============================================================================
// JSON
// =============================================================================

#[tokio::test]
async fn test_json_all_adapters() {
    let a = open_all().await;
    check_json(&a.native).await;
    check_json(&a.browser).await;
    check_json(&a.applet).await;
}

// =============================================================================
// Digests
// =============================================================================

#[tokio::test]
async fn test_hash_deterministic_across_adapters() {
    let a = open_all().await;
    let bytes: &[u8] = b"identical bytes everywhere";

    let native = a.native.read_file_to_hash(HashInput::Bytes(bytes)).await.unwrap();
    let browser = a.browser.read_file_to_hash(HashInput::Bytes(bytes)).await.unwrap();
    let applet = a.applet.read_file_to_hash(HashInput::Bytes(bytes)).await.unwrap();
    assert_eq!(native, browser);
    assert_eq!(native, applet);

    // Same bytes twice on one instance
    assert_eq!(
        a.native.read_file_to_hash(HashInput::Bytes(bytes)).await,
        Some(native.clone())
    );

    // Stored files hash to the same digest as their raw bytes
    a.native.write_file("h.bin", bytes.into()).await.unwrap();
    a.browser.write_file("h.bin", bytes.into()).await.unwrap();
    a.applet.write_file("h.bin", bytes.into()).await.unwrap();
    assert_eq!(a.native.read_file_to_hash(HashInput::Path("h.bin")).await, Some(native.clone()));
    assert_eq!(a.browser.read_file_to_hash(HashInput::Path("h.bin")).await, Some(native.clone()));
    assert_eq!(a.applet.read_file_to_hash(HashInput::Path("h.bin")).await, Some(native));
}

#[tokio::test]
async fn test_text_and_bytes_hash_agree() {
    let a = open_all().await;
    let text = a.browser.read_file_to_hash(HashInput::Text("hello")).await;
    let bytes = a.applet.read_file_to_hash(HashInput::Bytes(b"hello")).await;
    assert_eq!(text, bytes);
    assert_eq!(text.unwrap().as_str(), "5d41402abc4b2a76b9719d911017c592");
}
