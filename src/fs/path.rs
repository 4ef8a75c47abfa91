//! # Storage Path Resolution

use std::path::{Component, Path, PathBuf};

use super::errors::{FsError, FsResult};

/// Resolve a caller-supplied path under `root`.
///
/// A leading `/` is relative to the root. `..`, drive prefixes and anything
/// else that could leave the root are rejected.
pub fn resolve(root: &Path, path: &str) -> FsResult<PathBuf> {
    let mut resolved = root.to_path_buf();

    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(FsError::InvalidPath(path.to_string()));
            }
        }
    }

    Ok(resolved)
}

/// Directory prefix used by the key-record backend (`logs` -> `logs/`)
pub fn key_prefix(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}
