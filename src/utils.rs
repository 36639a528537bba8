//! Utility functions for refsync
//!
//! Hashing helpers, POSIX path normalization and atomic file writes shared
//! by the scanner, the stores and the report writer.

use crate::error::{Result, SyncError};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Hash a file's content using SHA-256
///
/// Reads the file in 8KB chunks so large files never have to fit in memory.
///
/// # Arguments
///
/// * `path` - Path to the file to hash
///
/// # Returns
///
/// Returns the SHA-256 hash as a 64-character hexadecimal string.
pub fn hash_file_content(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary data using SHA-256
///
/// Convenience for content that is already in memory; for files on disk
/// prefer [`hash_file_content`].
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Make a path relative to a base path
///
/// Attempts a lexical strip first so symbolic links in the base are never
/// resolved; falls back to canonicalizing both sides when the lexical
/// approach fails (e.g. `..` components or differing normalization).
pub fn make_relative(path: &Path, base: &Path) -> Result<PathBuf> {
    if let Ok(relative) = path.strip_prefix(base) {
        return Ok(relative.to_path_buf());
    }

    let path_canon = path.canonicalize()?;
    let base_canon = base.canonicalize()?;

    path_canon
        .strip_prefix(&base_canon)
        .map(|p| p.to_path_buf())
        .map_err(|_| {
            SyncError::internal(format!(
                "Path {:?} is not relative to {:?}",
                path_canon, base_canon
            ))
        })
}

/// Render a relative path as a POSIX-style string
///
/// Forward-slash separated, no leading slash. Fails on non-UTF-8 components
/// since both the report format and the store key space are textual.
pub fn to_posix_string(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| SyncError::PathConversion(part.to_os_string()))?;
                parts.push(part);
            }
            Component::CurDir => {}
            other => {
                return Err(SyncError::internal(format!(
                    "unexpected path component {:?} in relative path {:?}",
                    other, path
                )));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Split a POSIX path into its ancestor directories
///
/// `"a/b/c.txt"` yields `["a", "a/b"]`. Used for ancestor-directory ignore
/// matching.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut prefix = String::new();
    let mut parts = path.split('/').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            break;
        }
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(part);
        out.push(prefix.clone());
    }
    out
}

/// Atomic file write (write to temp file then rename)
///
/// The target file is never observable in a partially written state.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
