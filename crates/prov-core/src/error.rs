//! Error types for sessions

use crate::config::ConfigError;
use prov_export::ExportError;
use prov_graph::GraphError;
use prov_recorder::RecorderError;
use prov_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("render failed: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// No session is open for this notebook
    #[error("no session for {0}")]
    UnknownSession(String),
}

impl SessionError {
    /// Whether the session can keep going after this error
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Graph(e) => e.is_cancelled(),
            Self::Export(e) => e.is_not_found(),
            Self::Recorder(e) => e.is_recoverable(),
            Self::UnknownSession(_) => true,
            Self::Config(_) | Self::Store(_) => false,
        }
    }
}
