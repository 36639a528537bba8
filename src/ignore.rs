//! Ignore rules loaded from the root-level ignore file
//!
//! At most one ignore file (`.syncignore`) is read, at the root of the
//! scanned subtree. Each non-empty, non-comment line is a glob pattern; a
//! trailing `/` marks a directory pattern covering the directory and
//! everything under it. A path is ignored when any pattern matches the path
//! itself or any of its ancestor directories.
//!
//! This is a deliberate simplification versus full gitignore semantics:
//! there is **no inheritance across nested ignore files** and no `!`
//! negation. Callers who need gitignore fidelity should filter upstream.
//!
//! The rules are consulted twice per run: by the scanner for source
//! entries, and by the Diff Engine for target-side deletion candidates, so
//! pre-existing ignored content in the store is never deleted.

use crate::error::Result;
use crate::matcher::PatternSet;
use crate::types::EntryKind;
use crate::utils::ancestors;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reserved name of the ignore file at the scan root
pub const IGNORE_FILE_NAME: &str = ".syncignore";

/// Compiled ignore rules for one reconciliation run
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    /// Patterns applicable to files and directories alike
    plain: PatternSet,
    /// All patterns, including directory-only ones (trailing `/`)
    any: PatternSet,
}

impl IgnoreRules {
    /// Load the ignore file from `root`
    ///
    /// A missing file is not an error and yields an empty rule set.
    pub fn load(root: &Path) -> Result<Self> {
        let ignore_path = root.join(IGNORE_FILE_NAME);
        if !ignore_path.is_file() {
            return Ok(Self::empty());
        }
        let content = fs::read_to_string(&ignore_path)?;
        let rules = Self::parse(&content)?;
        debug!(
            patterns = rules.any.patterns().len(),
            "loaded ignore rules from {:?}", ignore_path
        );
        Ok(rules)
    }

    /// Parse ignore rules from file content
    pub fn parse(content: &str) -> Result<Self> {
        let mut plain = Vec::new();
        let mut all = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(dir_pattern) = line.strip_suffix('/') {
                all.push(dir_pattern.to_string());
            } else {
                plain.push(line.to_string());
                all.push(line.to_string());
            }
        }
        Ok(Self {
            plain: PatternSet::compile(&plain)?,
            any: PatternSet::compile(&all)?,
        })
    }

    /// An empty rule set ignoring nothing
    pub fn empty() -> Self {
        Self {
            plain: PatternSet::empty(),
            any: PatternSet::empty(),
        }
    }

    /// Whether a relative POSIX path is excluded by these rules
    ///
    /// Directory-only patterns (trailing `/`) never match a file path
    /// directly, but they do match its ancestor directories, which is what
    /// pulls the whole subtree out of play.
    pub fn is_ignored(&self, rel_path: &str, kind: EntryKind) -> bool {
        let direct = match kind {
            EntryKind::File => self.plain.matches(rel_path),
            EntryKind::Directory => self.any.matches(rel_path),
        };
        if direct {
            return true;
        }
        ancestors(rel_path)
            .iter()
            .any(|ancestor| self.any.matches(ancestor))
    }

    /// Whether no patterns were loaded
    pub fn is_empty(&self) -> bool {
        self.any.is_empty()
    }
}
