//! Error types for the provenance store

use std::path::PathBuf;

/// Store, gate and persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Token was skipped past before it reached the gate
    #[error("sequence token {token} is stale (gate already at {next})")]
    StaleToken { token: u64, next: u64 },

    /// IO error on the persisted document
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted document could not be encoded or decoded
    #[error("invalid persisted document: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted notebook is not a JSON object
    #[error("notebook document at {0} is not a JSON object")]
    NotANotebook(PathBuf),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the event that hit this error should simply be dropped
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StaleToken { .. })
    }
}
