//! Error types for export, diff and info

use prov_model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Epoch or execution lookup failed
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to encode export: {0}")]
    Json(#[from] serde_json::Error),

    /// Variable has no recorded description in that execution
    #[error("execution {execution_count} has no description for {variable}")]
    UnknownVariable { variable: String, execution_count: u32 },

    /// Version index outside the history
    #[error("version {index} out of range for {len} versions")]
    VersionOutOfRange { index: usize, len: usize },
}

impl ExportError {
    /// Request named something that does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Model(e) => e.is_lookup_miss(),
            Self::UnknownVariable { .. } | Self::VersionOutOfRange { .. } => true,
            Self::Json(_) => false,
        }
    }
}
