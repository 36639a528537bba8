//! # Refsync - Checkout-to-store reconciliation
//!
//! A one-way synchronization engine that mirrors a Git checkout into a
//! hierarchical object store, with deterministic diff classification and
//! an auditable change report.
//!
//! ## Overview
//!
//! Refsync treats the checkout as the single source of truth and drives a
//! target store toward it, allowing you to:
//! - Scan a working tree into a complete, hash-identified snapshot
//! - Classify every logical unit as added, updated, overwritten,
//!   unchanged or deleted before touching the store
//! - Preview any run with a dry-run that performs zero mutations
//! - Gate deletions behind an explicit opt-in, with self-protection for
//!   the entity driving the run
//! - Persist an NDJSON report of every decision for downstream auditing
//!
//! ## Architecture
//!
//! A run is a fixed pipeline of pure stages followed by a single mutating
//! stage:
//!
//! - **Scanner**: walks the source tree, applies ignore rules and the
//!   name-pattern allow-list, and hashes file content in parallel
//! - **Store index**: the target store lists its scope into a complete,
//!   deterministic snapshot
//! - **Diff engine**: merges the two snapshots on unit keys and produces
//!   the ordered decision list
//! - **Applier**: executes the list (or narrates it under dry-run),
//!   deferring pure deletions until additive work is done
//! - **Report writer**: atomically persists the decision list as NDJSON
//!
//! Two store backends ship in the crate: [`FileStore`], a plain
//! directory-backed store with replace-only semantics, and
//! [`DefinitionStore`], an in-memory structured repository keyed by
//! `(namespace, id)` with per-entry revisions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use refsync::{FileStore, ScopeSelector, Syncer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileStore::open("/var/lib/refsync/targets")?;
//!
//! let selector = ScopeSelector::builder("/work/checkout", "project-a")
//!     .delete_enabled(true)
//!     .name_patterns(vec!["**/*.yaml".to_string()])
//!     .build();
//!
//! let outcome = Syncer::new(store)
//!     .with_report_path("/var/log/refsync/project-a.ndjson")
//!     .run(&selector)?;
//!
//! println!(
//!     "{} applied, {} unchanged",
//!     outcome.summary.applied, outcome.summary.skipped
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Scopes and unit keys
//!
//! A scope is the store-side subtree a run is confined to; nothing
//! outside it is read or written. Within a scope every unit has one key:
//! the relative POSIX path for path stores, the namespace-qualified
//! `(namespace, id)` pair for definition stores. The diff merges both
//! sides on these keys.
//!
//! ### Decisions before mutations
//!
//! Classification is pure and completes over the full snapshot before the
//! first write. A unit's decision depends only on its own two sides,
//! never on processing order, so the same inputs always produce the same
//! report.
//!
//! ### Deletion safety
//!
//! Deletions require `delete_enabled`; without it they are reported but
//! suppressed. Three exclusions remove target entries from deletion
//! candidacy entirely: the run's self key, entries outside the
//! name-pattern allow-list, and entries matching the ignore rules.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, SyncError>`. Scan and classification
//! errors surface before any mutation; apply errors are fail-fast and
//! leave already-applied work in place.
//!
//! ## Module Organization
//!
//! - [`scanner`]: source tree walking and hashing
//! - [`ignore`]: `.syncignore` rules
//! - [`matcher`]: name-pattern allow-list
//! - [`store`]: the `TargetStore` abstraction
//! - [`file_store`] / [`definition_store`]: the shipped backends
//! - [`diff`]: snapshot merge and classification
//! - [`apply`]: decision execution and the `DiffSink` line stream
//! - [`report`]: NDJSON report persistence
//! - [`sync`]: the run orchestrator
//! - [`types`]: common types and data structures
//! - [`error`]: error types and handling

// Public API modules
pub mod apply;
pub mod definition_store;
pub mod diff;
pub mod error;
pub mod file_store;
pub mod ignore;
pub mod matcher;
pub mod report;
pub mod scanner;
pub mod store;
pub mod sync;
pub mod types;

// Internal helpers
mod utils;

// Re-export main types for convenience
pub use apply::{Applier, DiffSink, MemorySink, TracingSink};
pub use definition_store::DefinitionStore;
pub use diff::DiffEngine;
pub use error::{Result, SyncError};
pub use file_store::FileStore;
pub use ignore::{IgnoreRules, IGNORE_FILE_NAME};
pub use matcher::PatternSet;
pub use report::{read_report, ReportWriter};
pub use scanner::TreeScanner;
pub use store::{StoreEntry, StoreIndex, TargetStore};
pub use sync::Syncer;
pub use types::*;
