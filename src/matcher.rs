//! Glob pattern matching for name filters
//!
//! A thin wrapper over `globset` used in two places: the name-pattern
//! allow-list applied before scanning begins, and the ignore rules in
//! [`crate::ignore`]. Patterns match the full POSIX relative path, and `*`
//! is allowed to cross `/` so `*.txt` matches `docs/notes.txt` as well as
//! `notes.txt`.

use crate::error::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled set of glob patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: GlobSet,
    patterns: Vec<String>,
}

impl PatternSet {
    /// Compile a pattern set from glob strings
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SyncError::InvalidPattern`] when any glob
    /// fails to parse; a run never starts with a half-valid filter.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
            patterns: patterns.to_vec(),
        })
    }

    /// An empty set matching nothing
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Whether any pattern was supplied
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether the path matches at least one pattern
    pub fn matches(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    /// Allow-list semantics: an empty set admits everything, a non-empty
    /// set admits only matching paths
    pub fn admits(&self, path: &str) -> bool {
        self.is_empty() || self.matches(path)
    }

    /// The source patterns this set was compiled from
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
