//! Flat path store backed by a directory tree
//!
//! [`FileStore`] maps a target scope to a path prefix under its root and
//! stores entries as plain files. It deliberately exposes **no content
//! identity** in its listings: like a remote namespace-file API that only
//! reports paths, it has no diffable "unchanged" signal, so the Diff
//! Engine classifies every present-in-both unit as `OVERWRITTEN`. There is
//! no revisioning either; `put` returns `None`.
//!
//! Writes go through the atomic temp-then-rename helper so a crashed run
//! never leaves a half-written entry behind.

use crate::error::{Result, SyncError};
use crate::store::{StoreEntry, StoreIndex, TargetStore};
use crate::types::EntryKind;
use crate::utils;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Directory-backed flat path store
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Absolute path of a scoped key
    fn resolve(&self, scope: &str, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        if !scope.is_empty() {
            path.push(scope);
        }
        if !key.is_empty() {
            for part in key.split('/') {
                path.push(part);
            }
        }
        path
    }

    /// The store's root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TargetStore for FileStore {
    fn list(&self, scope: &str, include_sub_scopes: bool) -> Result<StoreIndex> {
        let scope_root = self.resolve(scope, "");
        let mut index = StoreIndex::new();
        if !scope_root.exists() {
            return Ok(index);
        }

        let mut walker = WalkDir::new(&scope_root).follow_links(false);
        if !include_sub_scopes {
            walker = walker.max_depth(1);
        }

        for entry in walker {
            let entry = entry.map_err(|e| SyncError::store(format!("listing failed: {}", e)))?;
            let path = entry.path();
            if path == scope_root {
                continue;
            }
            let rel = utils::make_relative(path, &scope_root)?;
            let key = utils::to_posix_string(&rel)?;
            let kind = if entry.file_type().is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            index.insert(
                key,
                StoreEntry {
                    kind,
                    identity: None,
                    revision: None,
                    logical_key: None,
                },
            );
        }

        debug!(scope, entries = index.len(), "listed file store scope");
        Ok(index)
    }

    fn get(&self, scope: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(scope, key);
        if !path.is_file() {
            return Err(SyncError::EntryNotFound(format!("{}/{}", scope, key)));
        }
        Ok(fs::read(path)?)
    }

    fn put(&mut self, scope: &str, key: &str, bytes: &[u8]) -> Result<Option<u64>> {
        let path = self.resolve(scope, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        utils::atomic_write(&path, bytes)?;
        trace!(scope, key, bytes = bytes.len(), "put file store entry");
        Ok(None)
    }

    fn delete(&mut self, scope: &str, key: &str) -> Result<()> {
        let path = self.resolve(scope, key);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else if path.is_file() {
            fs::remove_file(&path)?;
        }
        // Already-absent keys succeed: a structure deleted as a unit must
        // not fail its children's decisions.
        trace!(scope, key, "deleted file store entry");
        Ok(())
    }

    fn exists(&self, scope: &str, key: &str) -> Result<bool> {
        Ok(self.resolve(scope, key).exists())
    }

    fn create_dir_marker(&mut self, scope: &str, key: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(scope, key))?;
        Ok(())
    }

    fn replace_only(&self) -> bool {
        true
    }
}
