//! Source tree scanning
//!
//! [`TreeScanner`] enumerates a checked-out Git tree as an ordered, finite
//! snapshot of [`SourceEntry`] values: depth-first, directories before
//! their contents, filtered through the ignore rules and the name-pattern
//! allow-list. Every call to [`TreeScanner::scan`] performs a fresh
//! traversal; no iterator state survives across calls.
//!
//! Hashing of file content runs in parallel over the collected path list,
//! but the returned snapshot is always complete and sorted before the Diff
//! Engine sees it - internal parallelism never leaks partial results.
//!
//! Symbolic links are not followed; encountering one is a fatal scan error
//! rather than a silent skip. `.git` and the ignore file itself are always
//! excluded.

use crate::error::{Result, SyncError};
use crate::ignore::{IgnoreRules, IGNORE_FILE_NAME};
use crate::matcher::PatternSet;
use crate::types::{EntryKind, SourceEntry};
use crate::utils;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;
use walkdir::WalkDir;

/// Scanner for one source root
///
/// Built once per run with the run's filters; [`scan`](Self::scan) can be
/// called repeatedly and restarts from scratch each time.
#[derive(Debug)]
pub struct TreeScanner {
    root: PathBuf,
    ignore: IgnoreRules,
    patterns: PatternSet,
    max_depth: Option<usize>,
}

impl TreeScanner {
    /// Create a scanner over `root` with no filters
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: IgnoreRules::empty(),
            patterns: PatternSet::empty(),
            max_depth: None,
        }
    }

    /// Attach ignore rules (usually loaded from the root's ignore file)
    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    /// Attach the name-pattern allow-list
    pub fn with_patterns(mut self, patterns: PatternSet) -> Self {
        self.patterns = patterns;
        self
    }

    /// Limit traversal depth; `Some(1)` scans only the root's direct
    /// children, which is how single-scope runs stay out of child scopes
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Enumerate the source tree
    ///
    /// Returns the complete snapshot sorted by path (so a directory always
    /// precedes its contents). Fatal on traversal errors and on symbolic
    /// links; nothing has been applied at that point, so a failed scan is
    /// safe to retry.
    pub fn scan(&self) -> Result<Vec<SourceEntry>> {
        let start = Instant::now();
        let mut collected: Vec<(String, PathBuf, EntryKind)> = Vec::new();

        let mut walker = WalkDir::new(&self.root).follow_links(false);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut iter = walker.into_iter();
        while let Some(entry) = iter.next() {
            let entry = entry?;
            let path = entry.path();
            if path == self.root {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                return Err(SyncError::SymlinkNotSupported {
                    path: path.to_path_buf(),
                });
            }

            let rel = utils::make_relative(path, &self.root)?;
            let rel_str = utils::to_posix_string(&rel)?;

            // .git and the ignore file are invisible to the engine
            if entry.file_name() == ".git" {
                if file_type.is_dir() {
                    iter.skip_current_dir();
                }
                continue;
            }
            if entry.depth() == 1 && entry.file_name() == IGNORE_FILE_NAME {
                continue;
            }

            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            if self.ignore.is_ignored(&rel_str, kind) {
                if kind == EntryKind::Directory {
                    iter.skip_current_dir();
                }
                continue;
            }

            // Allow-list applies per entry; a non-matching directory is
            // still descended into because its children may match.
            if !self.patterns.admits(&rel_str) {
                continue;
            }

            collected.push((rel_str, path.to_path_buf(), kind));
        }

        let mut entries: Vec<SourceEntry> = collected
            .par_iter()
            .map(|(rel, abs, kind)| -> Result<SourceEntry> {
                let identity = match kind {
                    EntryKind::File => Some(utils::hash_file_content(abs).map_err(|e| {
                        SyncError::scan(abs.clone(), e.to_string())
                    })?),
                    EntryKind::Directory => None,
                };
                Ok(SourceEntry {
                    path: rel.clone(),
                    kind: *kind,
                    identity,
                    logical_key: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        entries.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            entries = entries.len(),
            elapsed = ?start.elapsed(),
            "scanned source tree {:?}", self.root
        );

        Ok(entries)
    }

    /// The root this scanner walks
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}
