//! Target store boundary
//!
//! The reconciliation engine talks to its target through [`TargetStore`], a
//! narrow capability set of `list` / `get` / `put` / `delete` / `exists`
//! plus directory markers. Two implementations ship with the crate:
//!
//! - [`crate::file_store::FileStore`] - a flat path store with
//!   replace-in-place semantics (no content identity, so present-in-both
//!   units classify as `OVERWRITTEN`);
//! - [`crate::definition_store::DefinitionStore`] - a structured-identity
//!   store keyed by `(namespace, id)` with integer revisions, where equal
//!   content classifies as `UNCHANGED` and differing content as `UPDATED`.
//!
//! `list` must return a deterministic, complete snapshot - no partial
//! results on success. Keys in the snapshot are scoped unit keys: plain
//! relative paths for path stores, [`LogicalKey::scoped_key`] renderings
//! for definition stores.

use crate::error::Result;
use crate::types::{EntryKind, LogicalKey};
use std::collections::BTreeMap;

/// One entry in a store's scoped inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// File or directory marker
    pub kind: EntryKind,
    /// Content fingerprint; `None` for directories and for stores that
    /// expose no diffable identity (replace-only stores)
    pub identity: Option<String>,
    /// Current version number; `None` for stores without revisioning
    pub revision: Option<u64>,
    /// Structured identity, when the store uses one
    pub logical_key: Option<LogicalKey>,
}

/// Complete, deterministic inventory of a store scope
///
/// Ordered map from scoped unit key to entry; the ordering carries through
/// to the decision list, keeping reports stable across runs.
pub type StoreIndex = BTreeMap<String, StoreEntry>;

/// Capability set of a reconciliation target
///
/// Implementations decide the identity/versioning semantics; the Diff
/// Engine and Applier stay generic over them.
pub trait TargetStore {
    /// Inventory the scope
    ///
    /// When `include_sub_scopes` is false only entries exactly one level /
    /// one namespace deep are returned; child scopes stay invisible.
    fn list(&self, scope: &str, include_sub_scopes: bool) -> Result<StoreIndex>;

    /// Read an entry's content
    fn get(&self, scope: &str, key: &str) -> Result<Vec<u8>>;

    /// Write an entry, creating or replacing it
    ///
    /// Returns the entry's revision after the write, or `None` for stores
    /// without revisioning.
    fn put(&mut self, scope: &str, key: &str, bytes: &[u8]) -> Result<Option<u64>>;

    /// Remove an entry
    ///
    /// Deleting a directory key removes the whole structure under it.
    /// Implementations treat an already-absent key as success so that a
    /// structure deleted as a unit does not fail its children's decisions.
    fn delete(&mut self, scope: &str, key: &str) -> Result<()>;

    /// Whether an entry exists
    fn exists(&self, scope: &str, key: &str) -> Result<bool>;

    /// Create an empty directory marker
    fn create_dir_marker(&mut self, scope: &str, key: &str) -> Result<()>;

    /// Replace-in-place semantics: the store cannot distinguish "same
    /// content, no new version", so present-in-both units classify as
    /// `OVERWRITTEN` instead of `UPDATED`/`UNCHANGED`
    fn replace_only(&self) -> bool {
        false
    }

    /// Whether the store has directory units at all
    ///
    /// Definition stores have namespaces instead of directories; source
    /// directory entries are dropped from the diff for them.
    fn supports_directories(&self) -> bool {
        true
    }

    /// Whether source entries carry a structured identity worth resolving
    ///
    /// When `false` the orchestrator skips [`resolve_key`](Self::resolve_key)
    /// entirely and never re-reads source content for it.
    fn resolves_keys(&self) -> bool {
        false
    }

    /// Resolve the structured identity of a source entry
    ///
    /// Path stores return `None`. Definition stores parse the content
    /// header and may fail with
    /// [`crate::error::SyncError::InvalidDefinition`], which the caller
    /// routes through the configured invalid-entry policy.
    fn resolve_key(
        &self,
        _scope: &str,
        _rel_path: &str,
        _bytes: &[u8],
    ) -> Result<Option<LogicalKey>> {
        Ok(None)
    }
}
