//! Run orchestration
//!
//! [`Syncer`] wires the pipeline together: load ignore rules, compile the
//! name-pattern allow-list, scan the source tree, resolve logical keys
//! for structured stores, index the target scope, classify, apply, then
//! write the report. Each call to [`Syncer::run`] is one self-contained
//! reconciliation; nothing is cached between runs.
//!
//! # Example
//!
//! ```no_run
//! use refsync::{FileStore, ScopeSelector, Syncer};
//!
//! # fn main() -> refsync::Result<()> {
//! let store = FileStore::open("/var/lib/targets")?;
//! let selector = ScopeSelector::builder("/work/checkout", "project-a")
//!     .dry_run(true)
//!     .build();
//!
//! let outcome = Syncer::new(store).run(&selector)?;
//! println!("{} decisions", outcome.decisions.len());
//! # Ok(())
//! # }
//! ```

use crate::apply::{Applier, DiffSink, TracingSink};
use crate::diff::DiffEngine;
use crate::error::{Result, SyncError};
use crate::ignore::IgnoreRules;
use crate::matcher::PatternSet;
use crate::report::ReportWriter;
use crate::scanner::TreeScanner;
use crate::store::TargetStore;
use crate::types::{
    EntryKind, InvalidEntryPolicy, ScopeSelector, SourceEntry, SyncOutcome,
};
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One-shot reconciliation driver over a target store
pub struct Syncer<S: TargetStore> {
    store: S,
    report_path: Option<PathBuf>,
    sink: Option<Box<dyn DiffSink>>,
}

impl<S: TargetStore> Syncer<S> {
    /// Create a syncer over `store`
    pub fn new(store: S) -> Self {
        Self {
            store,
            report_path: None,
            sink: None,
        }
    }

    /// Write an NDJSON report to `path` after each run
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    /// Replace the default [`TracingSink`] line sink
    pub fn with_sink(mut self, sink: impl DiffSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Borrow the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the syncer and recover the store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Execute one reconciliation run
    ///
    /// The full decision list is classified before any mutation. The
    /// report, when configured, is written after the apply phase: a run
    /// that fails mid-apply leaves no report behind.
    ///
    /// # Errors
    ///
    /// Propagates scan, classification, store and report errors. With
    /// [`InvalidEntryPolicy::Fail`] a malformed structured definition
    /// aborts the run before any mutation.
    pub fn run(&mut self, selector: &ScopeSelector) -> Result<SyncOutcome> {
        let started = Instant::now();
        info!(
            source = %selector.source_root.display(),
            scope = %selector.target_scope,
            dry_run = selector.dry_run,
            delete = selector.delete_enabled,
            "starting reconciliation run"
        );

        let ignore = IgnoreRules::load(&selector.source_root)?;
        let patterns = PatternSet::compile(&selector.name_patterns)?;

        let mut scanner = TreeScanner::new(&selector.source_root)
            .with_ignore(ignore.clone())
            .with_patterns(patterns.clone());
        if !selector.include_sub_scopes {
            scanner = scanner.with_max_depth(Some(1));
        }
        let mut source = scanner.scan()?;
        self.resolve_logical_keys(selector, &mut source)?;

        let target = self
            .store
            .list(&selector.target_scope, selector.include_sub_scopes)?;
        debug!(
            source_entries = source.len(),
            target_entries = target.len(),
            "snapshots complete"
        );

        let decisions = DiffEngine::new(selector, &ignore, &patterns).classify(
            &source,
            &target,
            &self.store,
        );

        let mut fallback = TracingSink::new(selector.dry_run);
        let sink: &mut dyn DiffSink = match &mut self.sink {
            Some(sink) => sink.as_mut(),
            None => &mut fallback,
        };
        let summary = Applier::new(selector).apply(&decisions, &mut self.store, sink)?;

        let report_path = match &self.report_path {
            Some(path) => Some(ReportWriter::new(path).write(&decisions)?),
            None => None,
        };

        info!(
            applied = summary.applied,
            skipped = summary.skipped,
            deletions_suppressed = summary.deletions_suppressed,
            elapsed = ?started.elapsed(),
            "reconciliation run complete"
        );

        Ok(SyncOutcome {
            decisions,
            summary,
            report_path,
            completed_at: Utc::now(),
        })
    }

    /// Attach logical keys to file entries for structured stores
    ///
    /// Malformed definitions follow the selector's invalid-entry policy:
    /// `Fail` aborts the run, `Skip` drops the entry with a warning.
    fn resolve_logical_keys(
        &self,
        selector: &ScopeSelector,
        source: &mut Vec<SourceEntry>,
    ) -> Result<()> {
        if !self.store.resolves_keys() {
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(source.len());
        for mut entry in source.drain(..) {
            if entry.kind != EntryKind::File {
                resolved.push(entry);
                continue;
            }
            let bytes = fs::read(selector.source_root.join(&entry.path))?;
            match self
                .store
                .resolve_key(&selector.target_scope, &entry.path, &bytes)
            {
                Ok(key) => {
                    entry.logical_key = key;
                    resolved.push(entry);
                }
                Err(err @ SyncError::InvalidDefinition { .. })
                    if selector.on_invalid == InvalidEntryPolicy::Skip =>
                {
                    warn!(path = %entry.path, "skipping invalid definition: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        *source = resolved;
        Ok(())
    }
}
