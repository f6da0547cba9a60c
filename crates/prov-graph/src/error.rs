//! Error types for resolution and graph construction

use prov_model::ModelError;

/// Dependency resolution failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A newer render superseded this one
    #[error("resolution cancelled")]
    Cancelled,

    /// Seed position outside the epoch
    #[error("seed position {position} out of range for {len} executions")]
    PositionOutOfRange { position: usize, len: usize },
}

/// Graph construction failures
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Execution added before its cell group
    #[error("cell group {0} not in graph")]
    MissingCellGroup(String),

    /// Edge endpoint not in graph
    #[error("execution {0} not in graph")]
    MissingExecution(String),
}

impl GraphError {
    /// Cancellation is expected whenever renders overlap
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Resolve(ResolveError::Cancelled))
    }
}
