//! Error types for the execution recorder

use prov_model::CellHandle;
use prov_store::StoreError;

/// Symbol-analysis service failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    /// Source could not be parsed
    #[error("source rejected by analyzer: {0}")]
    Rejected(String),

    /// Service did not answer
    #[error("analyzer unavailable: {0}")]
    Unavailable(String),
}

/// Symbol-inspection service failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum InspectionError {
    #[error("no inspection found for {0}")]
    NotFound(String),

    #[error("inspection failed: {0}")]
    Failed(String),
}

/// Notebook host failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("cell {0} no longer exists")]
    CellNotFound(CellHandle),

    #[error("host rejected metadata update: {0}")]
    MetadataRejected(String),
}

/// Why an execution reply did not produce a record
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Reply does not match any sent request
    #[error("no pending request for message {0}")]
    UnknownRequest(String),

    /// Reply for a message that was already handled
    #[error("duplicate reply for message {0}")]
    DuplicateReply(String),

    /// Kernel aborted the request
    #[error("request {0} was aborted")]
    Aborted(String),

    /// Cell was deleted before the reply arrived
    #[error("cell {0} not found in the notebook")]
    CellNotFound(CellHandle),

    /// Markdown and raw cells are not tracked
    #[error("cell {0} is not a code cell")]
    NotCode(CellHandle),

    /// No analysis result arrived in time
    #[error("no symbol analysis available for cell {0}")]
    AnalysisUnavailable(CellHandle),

    /// Preparation task did not finish
    #[error("preparation for message {msg_id} failed: {reason}")]
    Preparation { msg_id: String, reason: String },

    /// Event task panicked or was cancelled
    #[error("event task failed: {0}")]
    TaskFailed(String),

    /// Sequencing failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Inspection-section pattern failed to compile
    #[error("invalid inspection pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl RecorderError {
    /// Whether the recorder keeps working normally after this error
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Preparation { .. } | Self::TaskFailed(_) | Self::Pattern(_))
    }
}
