//! Decision application
//!
//! Walks an ordered decision list and performs the corresponding store
//! mutations. The applier is the only component that writes to a
//! [`TargetStore`](crate::store::TargetStore); classification and
//! reporting stay pure.
//!
//! Every decision is announced through a [`DiffSink`] before it is acted
//! on, so dry runs and real runs produce the same line stream. Mutations
//! honour two switches on the [`ScopeSelector`](crate::types::ScopeSelector):
//! `dry_run` suppresses all writes, and `delete_enabled` gates deletions
//! (a suppressed deletion is still announced and counted).
//!
//! Deletions that are one half of a file/directory replacement are applied
//! in place, immediately before the matching creation. All other
//! deletions are deferred until the additive work has finished and then
//! applied deepest-first, so a parent directory is never removed while a
//! child entry still has work pending.

use crate::error::{Result, SyncError};
use crate::store::TargetStore;
use crate::types::{ApplySummary, EntryKind, ScopeSelector, SyncDecision, SyncState};
use std::collections::HashSet;
use std::fs;
use tracing::{debug, info, trace};

/// Receiver for the per-decision line stream
///
/// One line per decision, in report order: `+` for creations, `~` for
/// content changes, `-` for deletions and nothing for `UNCHANGED`.
pub trait DiffSink {
    /// Announce one decision
    fn emit(&mut self, decision: &SyncDecision);
}

/// Sink that forwards lines to the `tracing` subscriber
///
/// Dry runs log at `info` so the preview is visible at default verbosity;
/// real runs log at `debug` and leave the summary to the caller.
pub struct TracingSink {
    dry_run: bool,
}

impl TracingSink {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl DiffSink for TracingSink {
    fn emit(&mut self, decision: &SyncDecision) {
        let line = format!("{} {}", decision.state.prefix(), decision.unit_key());
        if self.dry_run {
            info!("{}", line);
        } else {
            debug!("{}", line);
        }
    }
}

/// Sink that collects lines in memory, used by tests and the CLI
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl DiffSink for MemorySink {
    fn emit(&mut self, decision: &SyncDecision) {
        self.lines
            .push(format!("{} {}", decision.state.prefix(), decision.unit_key()));
    }
}

/// Executor for one reconciliation run's decision list
pub struct Applier<'a> {
    selector: &'a ScopeSelector,
}

impl<'a> Applier<'a> {
    pub fn new(selector: &'a ScopeSelector) -> Self {
        Self { selector }
    }

    /// Apply the decision list to the store
    ///
    /// Decisions are processed in list order. Pure deletions are deferred
    /// to the end of the run and applied deepest-first. The first store
    /// failure aborts the run; decisions already applied are not rolled
    /// back.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Apply`] naming the failed unit, whether the
    /// source file could not be read or the store rejected the mutation.
    pub fn apply(
        &self,
        decisions: &[SyncDecision],
        store: &mut dyn TargetStore,
        sink: &mut dyn DiffSink,
    ) -> Result<ApplySummary> {
        let scope = &self.selector.target_scope;
        let mut summary = ApplySummary::default();

        // Deletions immediately followed by a creation of the same unit
        // are kind-conflict replacements and must run in place.
        let replaced: HashSet<&str> = decisions
            .windows(2)
            .filter(|pair| {
                pair[0].state == SyncState::Deleted
                    && pair[1].state == SyncState::Added
                    && pair[0].unit_key() == pair[1].unit_key()
            })
            .map(|pair| pair[0].unit_key())
            .collect();

        let mut deferred: Vec<&SyncDecision> = Vec::new();

        for decision in decisions {
            sink.emit(decision);
            if decision.warning.is_some() {
                summary.warnings += 1;
            }

            match decision.state {
                SyncState::Unchanged => summary.skipped += 1,
                SyncState::Added | SyncState::Updated | SyncState::Overwritten => {
                    if self.selector.dry_run {
                        summary.skipped += 1;
                    } else {
                        self.write_unit(decision, store)?;
                        summary.applied += 1;
                    }
                }
                SyncState::Deleted => {
                    if self.selector.dry_run || !self.selector.delete_enabled {
                        summary.deletions_suppressed += 1;
                    } else if replaced.contains(decision.unit_key()) {
                        store
                            .delete(scope, decision.unit_key())
                            .map_err(|e| unit_error(decision.unit_key(), e))?;
                        summary.applied += 1;
                    } else {
                        deferred.push(decision);
                    }
                }
            }
        }

        // Deepest-first so children go before their containers.
        deferred.sort_by(|a, b| b.unit_key().cmp(a.unit_key()));
        for decision in deferred {
            trace!(key = decision.unit_key(), "deleting stale unit");
            store
                .delete(scope, decision.unit_key())
                .map_err(|e| unit_error(decision.unit_key(), e))?;
            summary.applied += 1;
        }

        Ok(summary)
    }

    fn write_unit(&self, decision: &SyncDecision, store: &mut dyn TargetStore) -> Result<()> {
        let scope = &self.selector.target_scope;
        let source_path = decision.source_path.as_deref().ok_or_else(|| {
            SyncError::internal("additive decision without a source path")
        })?;
        let key = match (&decision.target_path, &decision.logical_key) {
            (Some(path), _) => path.clone(),
            (None, Some(logical)) => logical.scoped_key(scope),
            (None, None) => source_path.to_string(),
        };

        if decision.state == SyncState::Added {
            // Creations may imply directory structure on the target side.
            let is_dir = self
                .selector
                .source_root
                .join(source_path)
                .is_dir();
            if is_dir {
                store
                    .create_dir_marker(scope, &key)
                    .map_err(|e| unit_error(&key, e))?;
                return Ok(());
            }
        }

        let absolute = self.selector.source_root.join(source_path);
        let bytes = fs::read(&absolute)
            .map_err(|e| SyncError::apply(source_path, format!("cannot read source: {e}")))?;
        store
            .put(scope, &key, &bytes)
            .map_err(|e| unit_error(&key, e))?;
        Ok(())
    }
}

/// Attach the failed unit key to a store error so the run's fatal error
/// names exactly which decision aborted it
fn unit_error(key: &str, err: SyncError) -> SyncError {
    match err {
        already @ SyncError::Apply { .. } => already,
        other => SyncError::apply(key, other.to_string()),
    }
}
