//! Error types for the data model

/// Lookup and decoding failures on a provenance document
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Epoch index beyond the recorded epochs
    #[error("epoch {epoch} out of range ({len} epochs recorded)")]
    EpochOutOfRange { epoch: usize, len: usize },

    /// No execution with this count in the epoch
    #[error("no execution {execution_count} in epoch {epoch}")]
    ExecutionNotFound { epoch: usize, execution_count: u32 },

    /// Notebook carries no provenance metadata
    #[error("notebook has no provenance metadata")]
    MissingProvenance,

    /// Malformed document
    #[error("invalid provenance document: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Lookup misses are data inconsistencies, not corrupt documents
    #[inline]
    #[must_use]
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            Self::EpochOutOfRange { .. } | Self::ExecutionNotFound { .. }
        )
    }
}
