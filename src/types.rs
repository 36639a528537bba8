//! Core data types for the reconciliation engine
//!
//! The types in this module represent:
//! - **Source side**: [`SourceEntry`], [`EntryKind`] - entries scanned from the Git tree
//! - **Classification**: [`SyncState`], [`SyncDecision`] - the Diff Engine's output
//! - **Configuration**: [`ScopeSelector`] and its builder - one run's immutable settings
//! - **Results**: [`ApplySummary`], [`SyncOutcome`] - what a run produced
//!
//! All configuration is resolved once before a run starts; the engine never
//! re-reads configuration mid-run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of a logical unit in either tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Regular file with byte content
    File,
    /// Pure container; participates by presence only, never by content
    Directory,
}

/// Structured identity of an entry in a definition store
///
/// Distinct from the entry's path: for workflow-definition stores the unit
/// of comparison is `(namespace, id)`, extracted from the source content
/// and the directory layout rather than from the filename alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalKey {
    /// Dot-separated namespace, e.g. `prod.team`
    pub namespace: String,
    /// Identifier unique within the namespace
    pub id: String,
}

impl LogicalKey {
    /// Create a new logical key
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Render this key relative to a scope namespace
    ///
    /// Keys in the scope itself render as the bare id; keys in descendant
    /// namespaces render with the sub-namespace as a path prefix, so
    /// `(prod.team, flow)` under scope `prod` becomes `team/flow`. This is
    /// the unit key the Diff Engine merges on.
    pub fn scoped_key(&self, scope: &str) -> String {
        if self.namespace == scope {
            return self.id.clone();
        }
        let sub = self
            .namespace
            .strip_prefix(scope)
            .map(|s| s.trim_start_matches('.'))
            .unwrap_or(&self.namespace);
        if sub.is_empty() {
            self.id.clone()
        } else {
            format!("{}/{}", sub.replace('.', "/"), self.id)
        }
    }

    /// Reconstruct a key from a scope namespace and a scoped unit key
    ///
    /// Inverse of [`scoped_key`](Self::scoped_key).
    pub fn from_scoped_key(scope: &str, key: &str) -> Self {
        match key.rsplit_once('/') {
            Some((sub, id)) => Self {
                namespace: format!("{}.{}", scope, sub.replace('/', ".")),
                id: id.to_string(),
            },
            None => Self {
                namespace: scope.to_string(),
                id: key.to_string(),
            },
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.id)
    }
}

/// A single addressable unit scanned from the source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// POSIX-style path relative to the scan root, no leading slash
    pub path: String,
    /// File or directory
    pub kind: EntryKind,
    /// SHA-256 content fingerprint; `None` for directories
    pub identity: Option<String>,
    /// Structured identity, resolved for definition-store runs
    pub logical_key: Option<LogicalKey>,
}

impl SourceEntry {
    /// Unit key this entry is merged on in the diff
    ///
    /// The logical key when present (rendered relative to `scope`),
    /// otherwise the path itself.
    pub fn unit_key(&self, scope: &str) -> String {
        match &self.logical_key {
            Some(key) => key.scoped_key(scope),
            None => self.path.clone(),
        }
    }
}

/// Classification outcome for one logical unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// Present only in source; will be created in the target
    Added,
    /// Present in both with differing content; the store preserves identity
    /// and bumps its revision
    Updated,
    /// Present in both in a store with replace-in-place semantics only (no
    /// diffable "unchanged" signal)
    Overwritten,
    /// Present in both with equal content, or a no-op decision carrying a
    /// warning
    Unchanged,
    /// Present only in target; removed only when deletion is enabled
    Deleted,
}

impl SyncState {
    /// The one-character prefix used for human-readable diff lines
    pub fn prefix(&self) -> char {
        match self {
            SyncState::Added => '+',
            SyncState::Deleted => '-',
            SyncState::Updated | SyncState::Overwritten | SyncState::Unchanged => '~',
        }
    }
}

/// The Diff Engine's output for one logical unit
///
/// One record per line in the diff report. A `None` source path means the
/// unit no longer exists on the source side (pure deletion). The target
/// path always carries the unit key under which the unit lives, or will
/// land, in the store, so the same unit reports under the same key across
/// its whole lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDecision {
    /// Path in the Git tree, or `None` for a pure deletion
    pub source_path: Option<String>,
    /// Unit key in the target store; for `ADDED` the key the unit will be
    /// created under
    pub target_path: Option<String>,
    /// Structured identity, when the store uses one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub logical_key: Option<LogicalKey>,
    /// Classification outcome
    pub state: SyncState,
    /// Target-store version after applying this decision; absent for
    /// `DELETED` and for stores without revisioning
    pub revision: Option<u64>,
    /// Non-fatal condition attached to a no-op decision (e.g. a
    /// file-vs-directory clash with deletion disabled)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub warning: Option<String>,
}

impl SyncDecision {
    /// Unit key of this decision, preferring the target side
    pub fn unit_key(&self) -> &str {
        self.target_path
            .as_deref()
            .or(self.source_path.as_deref())
            .unwrap_or("")
    }
}

/// Policy for malformed structured-content entries on the source side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidEntryPolicy {
    /// Abort the run (default)
    #[default]
    Fail,
    /// Record a warning and exclude the entry from both the decision list
    /// and deletion candidacy
    Skip,
}

/// Immutable configuration of one reconciliation run
///
/// Constructed once via [`ScopeSelectorBuilder`] before the engine runs;
/// the engine never re-resolves configuration.
#[derive(Debug, Clone)]
pub struct ScopeSelector {
    /// Directory in the checked-out tree to scan
    pub source_root: PathBuf,
    /// Namespace/prefix identifying the target store subset in play
    pub target_scope: String,
    /// When false, both scanning and deletion are restricted to one level /
    /// one namespace
    pub include_sub_scopes: bool,
    /// When false, `DELETED` decisions are computed and reported but never
    /// applied
    pub delete_enabled: bool,
    /// When true, no store mutation of any kind occurs
    pub dry_run: bool,
    /// Logical key excluded from deletion consideration even when absent
    /// from the source tree
    pub self_key: Option<LogicalKey>,
    /// Allow-list of glob patterns; when non-empty, only matching paths
    /// participate and deletion is scoped to matching entries
    pub name_patterns: Vec<String>,
    /// Handling of malformed structured-content entries
    pub on_invalid: InvalidEntryPolicy,
}

impl ScopeSelector {
    /// Start building a selector for the given source root and target scope
    pub fn builder(
        source_root: impl Into<PathBuf>,
        target_scope: impl Into<String>,
    ) -> ScopeSelectorBuilder {
        ScopeSelectorBuilder::new(source_root, target_scope)
    }
}

/// Builder for [`ScopeSelector`]
#[derive(Debug, Clone)]
pub struct ScopeSelectorBuilder {
    source_root: PathBuf,
    target_scope: String,
    include_sub_scopes: bool,
    delete_enabled: bool,
    dry_run: bool,
    self_key: Option<LogicalKey>,
    name_patterns: Vec<String>,
    on_invalid: InvalidEntryPolicy,
}

impl ScopeSelectorBuilder {
    /// Create a builder with the defaults: sub-scopes included, deletion
    /// disabled, dry-run off, no self key, no name patterns, fail on
    /// invalid entries
    pub fn new(source_root: impl Into<PathBuf>, target_scope: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
            target_scope: target_scope.into(),
            include_sub_scopes: true,
            delete_enabled: false,
            dry_run: false,
            self_key: None,
            name_patterns: Vec::new(),
            on_invalid: InvalidEntryPolicy::Fail,
        }
    }

    /// Restrict or allow descent into child scopes
    pub fn include_sub_scopes(mut self, include: bool) -> Self {
        self.include_sub_scopes = include;
        self
    }

    /// Enable or disable actual deletion of target-only entries
    pub fn delete_enabled(mut self, enabled: bool) -> Self {
        self.delete_enabled = enabled;
        self
    }

    /// Preview mode: compute and report every decision without mutating
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Protect a logical key from deletion for the whole run
    pub fn self_key(mut self, key: LogicalKey) -> Self {
        self.self_key = Some(key);
        self
    }

    /// Set the glob allow-list applied to source paths and deletions
    pub fn name_patterns(mut self, patterns: Vec<String>) -> Self {
        self.name_patterns = patterns;
        self
    }

    /// Select the malformed-entry policy
    pub fn on_invalid(mut self, policy: InvalidEntryPolicy) -> Self {
        self.on_invalid = policy;
        self
    }

    /// Finalize the selector
    pub fn build(self) -> ScopeSelector {
        ScopeSelector {
            source_root: self.source_root,
            target_scope: self.target_scope,
            include_sub_scopes: self.include_sub_scopes,
            delete_enabled: self.delete_enabled,
            dry_run: self.dry_run,
            self_key: self.self_key,
            name_patterns: self.name_patterns,
            on_invalid: self.on_invalid,
        }
    }
}

/// Statistics from the apply phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplySummary {
    /// Decisions that mutated the store
    pub applied: usize,
    /// No-op decisions (`UNCHANGED`, and everything under dry-run)
    pub skipped: usize,
    /// `DELETED` decisions left unapplied because deletion was disabled
    pub deletions_suppressed: usize,
    /// Warnings attached to decisions during this run
    pub warnings: usize,
}

impl ApplySummary {
    /// Whether the apply phase changed the target store at all
    pub fn mutated(&self) -> bool {
        self.applied > 0
    }
}

/// Result of one reconciliation run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The full, ordered decision list
    pub decisions: Vec<SyncDecision>,
    /// Apply statistics
    pub summary: ApplySummary,
    /// Handle of the persisted diff report, when one was requested
    pub report_path: Option<PathBuf>,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

impl SyncOutcome {
    /// Whether anything other than `UNCHANGED` was classified
    pub fn has_changes(&self) -> bool {
        self.decisions
            .iter()
            .any(|d| d.state != SyncState::Unchanged)
    }
}
