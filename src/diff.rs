//! The Diff Engine
//!
//! Merges the scanner's source snapshot and the store's index into a
//! single ordered decision list, classifying every logical unit as
//! `ADDED`, `UPDATED`, `OVERWRITTEN`, `UNCHANGED` or `DELETED`.
//!
//! Classification is pure: each decision depends only on the
//! presence/absence/identity of the same unit on the two sides, never on
//! processing order. The full list is materialized before any mutation so
//! deletions are scoped correctly even when a later entry would re-create
//! a path being removed.
//!
//! Three protections remove target-only units from deletion candidacy
//! entirely (they produce no decision at all):
//!
//! 1. the run's self key - the entity driving the reconciliation can never
//!    delete itself;
//! 2. the name-pattern allow-list - pre-existing entries outside the
//!    patterns are never touched;
//! 3. a target-side application of the ignore rules - content the source
//!    side cannot even see is not deleted for being unseen.
//!
//! A unit that is a file on one side and a directory on the other is never
//! silently merged. With deletion enabled it becomes a `DELETED` +
//! `ADDED` pair (same unit, delete first); otherwise the existing target
//! structure is preserved and the clash surfaces as a warning on a no-op
//! decision.

use crate::ignore::IgnoreRules;
use crate::matcher::PatternSet;
use crate::store::{StoreEntry, StoreIndex, TargetStore};
use crate::types::{EntryKind, ScopeSelector, SourceEntry, SyncDecision, SyncState};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Classifier for one reconciliation run
pub struct DiffEngine<'a> {
    selector: &'a ScopeSelector,
    ignore: &'a IgnoreRules,
    patterns: &'a PatternSet,
}

impl<'a> DiffEngine<'a> {
    /// Create an engine over the run's filters
    pub fn new(
        selector: &'a ScopeSelector,
        ignore: &'a IgnoreRules,
        patterns: &'a PatternSet,
    ) -> Self {
        Self {
            selector,
            ignore,
            patterns,
        }
    }

    /// Merge and classify both sides into the ordered decision list
    ///
    /// `source` is the scanner's snapshot (logical keys already resolved
    /// for definition stores), `target` the store index for the run's
    /// scope. The store itself is only consulted for its capabilities,
    /// never mutated here.
    pub fn classify(
        &self,
        source: &[SourceEntry],
        target: &StoreIndex,
        store: &dyn TargetStore,
    ) -> Vec<SyncDecision> {
        let scope = &self.selector.target_scope;
        let replace_only = store.replace_only();

        let mut source_by_key: BTreeMap<String, &SourceEntry> = BTreeMap::new();
        for entry in source {
            if entry.kind == EntryKind::Directory && !store.supports_directories() {
                continue;
            }
            source_by_key.insert(entry.unit_key(scope), entry);
        }

        let mut keys: Vec<&str> = source_by_key
            .keys()
            .map(String::as_str)
            .chain(target.keys().map(String::as_str))
            .collect();
        keys.sort_unstable();
        keys.dedup();

        let mut decisions = Vec::with_capacity(keys.len());
        // Prefixes of warned directory clashes: the kept target file makes
        // the whole source subtree unplaceable. Siblings such as `d.txt`
        // sort between `d` and `d/`, so the prefixes accumulate for the
        // rest of the walk instead of resetting on the first miss.
        let mut suppressed: Vec<String> = Vec::new();
        for key in keys {
            if suppressed.iter().any(|p| key.starts_with(p.as_str())) {
                continue;
            }
            match (source_by_key.get(key), target.get(key)) {
                (Some(src), None) => decisions.push(self.added(key, src, replace_only)),
                (None, Some(tgt)) => {
                    if self.protected_from_deletion(key, tgt) {
                        continue;
                    }
                    decisions.push(SyncDecision {
                        source_path: None,
                        target_path: Some(key.to_string()),
                        logical_key: tgt.logical_key.clone(),
                        state: SyncState::Deleted,
                        revision: None,
                        warning: None,
                    });
                }
                (Some(src), Some(tgt)) => {
                    if let Some(prefix) =
                        self.classify_both(key, src, tgt, replace_only, &mut decisions)
                    {
                        suppressed.push(prefix);
                    }
                }
                (None, None) => unreachable!("key came from one of the two sides"),
            }
        }

        debug!(
            decisions = decisions.len(),
            scope = %scope,
            "classified reconciliation run"
        );
        decisions
    }

    fn added(&self, key: &str, src: &SourceEntry, replace_only: bool) -> SyncDecision {
        SyncDecision {
            source_path: Some(src.path.clone()),
            target_path: Some(key.to_string()),
            logical_key: src.logical_key.clone(),
            state: SyncState::Added,
            revision: if replace_only { None } else { Some(1) },
            warning: None,
        }
    }

    /// Target-only units excluded from deletion candidacy produce no
    /// decision at all
    fn protected_from_deletion(&self, key: &str, entry: &StoreEntry) -> bool {
        if let Some(self_key) = &self.selector.self_key {
            let is_self = entry.logical_key.as_ref() == Some(self_key)
                || self_key.scoped_key(&self.selector.target_scope) == key;
            if is_self {
                debug!(key, "self key excluded from deletion consideration");
                return true;
            }
        }
        if !self.patterns.is_empty() && !self.patterns.matches(key) {
            return true;
        }
        if self.ignore.is_ignored(key, entry.kind) {
            return true;
        }
        false
    }

    /// Classify a present-in-both unit
    ///
    /// Returns the key prefix whose source subtree must be skipped, when a
    /// directory clash leaves the target file in place.
    fn classify_both(
        &self,
        key: &str,
        src: &SourceEntry,
        tgt: &StoreEntry,
        replace_only: bool,
        decisions: &mut Vec<SyncDecision>,
    ) -> Option<String> {
        if src.kind != tgt.kind {
            if self.selector.delete_enabled {
                // Replace the old structure: delete first, then create.
                decisions.push(SyncDecision {
                    source_path: None,
                    target_path: Some(key.to_string()),
                    logical_key: tgt.logical_key.clone(),
                    state: SyncState::Deleted,
                    revision: None,
                    warning: None,
                });
                decisions.push(self.added(key, src, replace_only));
                return None;
            }
            let message = format!(
                "'{}' is a {} in the source tree but a {} in the target store; \
                 existing structure kept, enable deletion to replace it",
                key,
                kind_name(src.kind),
                kind_name(tgt.kind)
            );
            warn!("{}", message);
            decisions.push(SyncDecision {
                source_path: Some(src.path.clone()),
                target_path: Some(key.to_string()),
                logical_key: tgt.logical_key.clone(),
                state: SyncState::Unchanged,
                revision: tgt.revision,
                warning: Some(message),
            });
            // The target file blocks every source path under the
            // directory that could not be created.
            if src.kind == EntryKind::Directory {
                return Some(format!("{key}/"));
            }
            return None;
        }

        // Directories are pure containers: presence only, never content.
        if src.kind == EntryKind::Directory {
            decisions.push(SyncDecision {
                source_path: Some(src.path.clone()),
                target_path: Some(key.to_string()),
                logical_key: tgt.logical_key.clone(),
                state: SyncState::Unchanged,
                revision: tgt.revision,
                warning: None,
            });
            return None;
        }

        let (state, revision) = match (&src.identity, &tgt.identity) {
            (Some(src_id), Some(tgt_id)) if src_id == tgt_id => {
                (SyncState::Unchanged, tgt.revision)
            }
            (Some(_), Some(_)) => (
                SyncState::Updated,
                Some(tgt.revision.unwrap_or(0) + 1),
            ),
            // No diffable identity on the target side: replace in place.
            _ => (
                SyncState::Overwritten,
                if replace_only {
                    None
                } else {
                    Some(tgt.revision.unwrap_or(0) + 1)
                },
            ),
        };

        decisions.push(SyncDecision {
            source_path: Some(src.path.clone()),
            target_path: Some(key.to_string()),
            logical_key: src.logical_key.clone().or_else(|| tgt.logical_key.clone()),
            state,
            revision,
            warning: None,
        });
        None
    }
}

fn kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Directory => "directory",
    }
}
