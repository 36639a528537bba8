//! Structured-identity store for versioned workflow definitions
//!
//! [`DefinitionStore`] keys entries by [`LogicalKey`] `(namespace, id)`
//! instead of raw paths and assigns each key an integer revision starting
//! at 1, bumped on every content change. Listings expose the content hash
//! as identity, so the Diff Engine can classify `UNCHANGED` and `UPDATED`
//! - which is what makes reconciliation against this store idempotent.
//!
//! Namespaces are dot-separated. A scope's descendants are namespaces with
//! the scope as a strict dot-prefix: scope `prod` covers `prod.team` but
//! never `production`.
//!
//! The structured identity of a source file is resolved from two places:
//! the namespace comes from the file's directory relative to the scan root
//! (subdirectory `team/` under scope `prod` means namespace `prod.team`),
//! and the id comes from the `id:` field of the leading YAML document,
//! falling back to the file stem. A file that does not parse as YAML, or
//! that declares a namespace contradicting its location, is a malformed
//! entry routed through the run's invalid-entry policy.

use crate::error::{Result, SyncError};
use crate::store::{StoreEntry, StoreIndex, TargetStore};
use crate::types::{EntryKind, LogicalKey};
use crate::utils;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// One stored definition
#[derive(Debug, Clone)]
struct Definition {
    content: Vec<u8>,
    revision: u64,
}

/// In-memory structured-identity store with integer revisions
///
/// Suitable both for embedding behind a repository facade and as the test
/// double for definition-store reconciliation.
#[derive(Debug, Default)]
pub struct DefinitionStore {
    entries: BTreeMap<LogicalKey, Definition>,
}

/// The subset of a definition's YAML header the engine reads
///
/// Everything else in the document is opaque bytes to the engine.
#[derive(Debug, Deserialize)]
struct DefinitionHeader {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

impl DefinitionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of definitions across all namespaces
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no definitions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current revision of a definition, if present
    pub fn revision_of(&self, key: &LogicalKey) -> Option<u64> {
        self.entries.get(key).map(|d| d.revision)
    }

    /// Whether `namespace` is in scope
    fn in_scope(namespace: &str, scope: &str, include_sub_scopes: bool) -> bool {
        if namespace == scope {
            return true;
        }
        include_sub_scopes
            && namespace
                .strip_prefix(scope)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Derive the namespace of a source file from its directory path
    fn namespace_for(scope: &str, rel_path: &str) -> String {
        match rel_path.rsplit_once('/') {
            Some((dirs, _)) => format!("{}.{}", scope, dirs.replace('/', ".")),
            None => scope.to_string(),
        }
    }

    /// File stem of a relative POSIX path, used as the fallback id
    fn stem_of(rel_path: &str) -> &str {
        let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }
}

impl TargetStore for DefinitionStore {
    fn list(&self, scope: &str, include_sub_scopes: bool) -> Result<StoreIndex> {
        let mut index = StoreIndex::new();
        for (key, definition) in &self.entries {
            if !Self::in_scope(&key.namespace, scope, include_sub_scopes) {
                continue;
            }
            index.insert(
                key.scoped_key(scope),
                StoreEntry {
                    kind: EntryKind::File,
                    identity: Some(utils::hash_data(&definition.content)),
                    revision: Some(definition.revision),
                    logical_key: Some(key.clone()),
                },
            );
        }
        debug!(scope, entries = index.len(), "listed definition store scope");
        Ok(index)
    }

    fn get(&self, scope: &str, key: &str) -> Result<Vec<u8>> {
        let logical = LogicalKey::from_scoped_key(scope, key);
        self.entries
            .get(&logical)
            .map(|d| d.content.clone())
            .ok_or_else(|| SyncError::EntryNotFound(logical.to_string()))
    }

    fn put(&mut self, scope: &str, key: &str, bytes: &[u8]) -> Result<Option<u64>> {
        let logical = LogicalKey::from_scoped_key(scope, key);
        let revision = match self.entries.get(&logical) {
            Some(existing) if existing.content == bytes => existing.revision,
            Some(existing) => existing.revision + 1,
            None => 1,
        };
        self.entries.insert(
            logical.clone(),
            Definition {
                content: bytes.to_vec(),
                revision,
            },
        );
        trace!(%logical, revision, "put definition");
        Ok(Some(revision))
    }

    fn delete(&mut self, scope: &str, key: &str) -> Result<()> {
        let logical = LogicalKey::from_scoped_key(scope, key);
        self.entries.remove(&logical);
        trace!(%logical, "deleted definition");
        Ok(())
    }

    fn exists(&self, scope: &str, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .contains_key(&LogicalKey::from_scoped_key(scope, key)))
    }

    fn create_dir_marker(&mut self, _scope: &str, _key: &str) -> Result<()> {
        // Namespaces exist implicitly; there is nothing to create.
        Ok(())
    }

    fn supports_directories(&self) -> bool {
        false
    }

    fn resolves_keys(&self) -> bool {
        true
    }

    fn resolve_key(
        &self,
        scope: &str,
        rel_path: &str,
        bytes: &[u8],
    ) -> Result<Option<LogicalKey>> {
        let namespace = Self::namespace_for(scope, rel_path);
        let header: DefinitionHeader =
            serde_yaml::from_slice(bytes).map_err(|e| SyncError::InvalidDefinition {
                path: rel_path.to_string(),
                reason: e.to_string(),
            })?;
        if let Some(declared) = &header.namespace {
            if declared != &namespace {
                return Err(SyncError::InvalidDefinition {
                    path: rel_path.to_string(),
                    reason: format!(
                        "declared namespace '{}' does not match location '{}'",
                        declared, namespace
                    ),
                });
            }
        }
        let id = header
            .id
            .unwrap_or_else(|| Self::stem_of(rel_path).to_string());
        Ok(Some(LogicalKey::new(namespace, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_bumps_revision_on_change_only() {
        let mut store = DefinitionStore::new();
        assert_eq!(store.put("prod", "flow", b"id: flow\n").unwrap(), Some(1));
        assert_eq!(store.put("prod", "flow", b"id: flow\n").unwrap(), Some(1));
        assert_eq!(
            store.put("prod", "flow", b"id: flow\nx: 2\n").unwrap(),
            Some(2)
        );
        assert_eq!(
            store.revision_of(&LogicalKey::new("prod", "flow")),
            Some(2)
        );
    }

    #[test]
    fn test_list_scope_and_descendants() {
        let mut store = DefinitionStore::new();
        store.put("prod", "a", b"id: a\n").unwrap();
        store.put("prod", "team/b", b"id: b\n").unwrap();
        store.put("production", "c", b"id: c\n").unwrap();

        let exact = store.list("prod", false).unwrap();
        assert_eq!(exact.keys().collect::<Vec<_>>(), vec!["a"]);

        let with_sub = store.list("prod", true).unwrap();
        assert_eq!(with_sub.keys().collect::<Vec<_>>(), vec!["a", "team/b"]);
        assert_eq!(
            with_sub["team/b"].logical_key,
            Some(LogicalKey::new("prod.team", "b"))
        );
        // "production" is not a descendant of "prod"
        assert!(!with_sub.contains_key("c"));
    }

    #[test]
    fn test_listing_exposes_identity_and_revision() {
        let mut store = DefinitionStore::new();
        store.put("prod", "a", b"id: a\n").unwrap();
        let index = store.list("prod", false).unwrap();
        let entry = &index["a"];
        assert_eq!(entry.identity.as_deref(), Some(&utils::hash_data(b"id: a\n")[..]));
        assert_eq!(entry.revision, Some(1));
        assert!(!store.replace_only());
        assert!(!store.supports_directories());
    }

    #[test]
    fn test_resolve_key_from_header_and_location() {
        let store = DefinitionStore::new();
        let key = store
            .resolve_key("prod", "team/my-flow.yml", b"id: my-flow\ntasks: []\n")
            .unwrap()
            .unwrap();
        assert_eq!(key, LogicalKey::new("prod.team", "my-flow"));
    }

    #[test]
    fn test_resolve_key_falls_back_to_stem() {
        let store = DefinitionStore::new();
        let key = store
            .resolve_key("prod", "daily.yaml", b"tasks: []\n")
            .unwrap()
            .unwrap();
        assert_eq!(key, LogicalKey::new("prod", "daily"));
    }

    #[test]
    fn test_resolve_key_rejects_malformed_yaml() {
        let store = DefinitionStore::new();
        let err = store
            .resolve_key("prod", "broken.yml", b"id: [unclosed\n")
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_resolve_key_rejects_namespace_mismatch() {
        let store = DefinitionStore::new();
        let err = store
            .resolve_key("prod", "flow.yml", b"id: flow\nnamespace: other.place\n")
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_get_delete_roundtrip() {
        let mut store = DefinitionStore::new();
        store.put("prod", "a", b"id: a\n").unwrap();
        assert_eq!(store.get("prod", "a").unwrap(), b"id: a\n");
        assert!(store.exists("prod", "a").unwrap());
        store.delete("prod", "a").unwrap();
        assert!(!store.exists("prod", "a").unwrap());
        assert!(matches!(
            store.get("prod", "a").unwrap_err(),
            SyncError::EntryNotFound(_)
        ));
    }
}
