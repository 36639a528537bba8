//! NDJSON diff reports
//!
//! One [`SyncDecision`] JSON object per line, in decision order. The file
//! is written through a temporary sibling and renamed into place, so a
//! half-written report is never observable at the target path.
//!
//! The report is a faithful transcript of the classification, not of the
//! mutations: dry runs and delete-disabled runs write the same lines a
//! full run would.

use crate::error::{Result, SyncError};
use crate::types::SyncDecision;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// Writer for one run's report file
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    /// Create a writer targeting `path`
    ///
    /// Nothing is touched on disk until [`write`](Self::write) is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Serialize the decision list and atomically persist it
    ///
    /// Parent directories are created as needed. Returns the final report
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Json`] on serialization failure and
    /// [`SyncError::Io`] on filesystem failure.
    pub fn write(&self, decisions: &[SyncDecision]) -> Result<PathBuf> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            std::fs::create_dir_all(parent)?;
        }

        let mut temp = match parent {
            Some(parent) => NamedTempFile::new_in(parent)?,
            None => NamedTempFile::new_in(".")?,
        };
        for decision in decisions {
            serde_json::to_writer(&mut temp, decision)?;
            temp.write_all(b"\n")?;
        }
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| SyncError::Io(e.error))?;

        info!(
            path = %self.path.display(),
            decisions = decisions.len(),
            "wrote diff report"
        );
        Ok(self.path.clone())
    }
}

/// Parse a previously written report back into decisions
///
/// Blank lines are tolerated; any other malformed line is an error.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be read and
/// [`SyncError::Json`] on a malformed line.
pub fn read_report(path: &Path) -> Result<Vec<SyncDecision>> {
    let reader = BufReader::new(File::open(path)?);
    let mut decisions = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        decisions.push(serde_json::from_str(&line)?);
    }
    Ok(decisions)
}
