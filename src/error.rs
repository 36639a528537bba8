//! Error types for the refsync library
//!
//! All fatal conditions surface as a single [`SyncError`] carrying the
//! offending path and root cause. Non-fatal conditions (structural
//! conflicts, policy-skipped invalid entries) never become errors; they are
//! surfaced as warnings on decisions instead.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the refsync library
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for all reconciliation operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization (report records)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Source tree traversal failure; aborts the run before any mutation
    #[error("Scan failed at {path:?}: {reason}")]
    Scan {
        /// Path where traversal broke
        path: PathBuf,
        /// Root cause description
        reason: String,
    },

    /// Symbolic link encountered in the source tree (never followed)
    #[error("Symbolic link not supported: {path:?}")]
    SymlinkNotSupported {
        /// Path of the offending link
        path: PathBuf,
    },

    /// Target store read/list failure; aborts before mutation
    #[error("Store error: {0}")]
    Store(String),

    /// Store entry not found
    #[error("Entry not found in store: {0}")]
    EntryNotFound(String),

    /// Apply failure on an individual decision; the remaining queue aborts,
    /// already-applied decisions remain applied
    #[error("Apply failed for {path}: {reason}")]
    Apply {
        /// Logical unit that failed to apply
        path: String,
        /// Root cause description
        reason: String,
    },

    /// Malformed structured-content entry on the source side
    #[error("Invalid definition {path}: {reason}")]
    InvalidDefinition {
        /// Source-relative path of the malformed entry
        path: String,
        /// Parse failure description
        reason: String,
    },

    /// Ignore-file or name-pattern parsing error
    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Non-UTF-8 path component
    #[error("Path conversion error: {0:?}")]
    PathConversion(std::ffi::OsString),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Create a store error with a custom message
    pub fn store(msg: impl Into<String>) -> Self {
        SyncError::Store(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        SyncError::Internal(msg.into())
    }

    /// Create a scan error for a specific path
    pub fn scan(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SyncError::Scan {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an apply error for a specific logical unit
    pub fn apply(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::Apply {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error occurred before any mutation could happen
    ///
    /// Scan and list failures are safe to retry; an apply failure leaves the
    /// target store partially updated.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            SyncError::Scan { .. }
                | SyncError::SymlinkNotSupported { .. }
                | SyncError::WalkDir(_)
                | SyncError::InvalidPattern(_)
                | SyncError::InvalidDefinition { .. }
        )
    }
}
