//! Collaborators the recorder talks to
//!
//! - [`SymbolAnalyzer`]: source text to symbol lists
//! - [`SymbolInspector`]: symbol to description text
//! - [`NotebookHost`]: live cell lookup and durable cell-id metadata

use crate::analysis::AnalysisResult;
use crate::error::{AnalysisError, HostError, InspectionError};
use prov_model::{CellHandle, CellId};
use serde::{Deserialize, Serialize};

/// Kind of a notebook cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

/// Snapshot of a cell in the host document
#[derive(Debug, Clone, PartialEq)]
pub struct LiveCell {
    pub handle: CellHandle,
    pub cell_type: CellType,
    pub source: String,
    pub outputs: Vec<serde_json::Value>,
    /// Durable id from the cell's metadata, if one was assigned
    pub cell_id: Option<CellId>,
}

impl LiveCell {
    /// Code cell without outputs or durable id
    #[must_use]
    pub fn code(handle: impl Into<CellHandle>, source: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            cell_type: CellType::Code,
            source: source.into(),
            outputs: Vec::new(),
            cell_id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
    }
}

/// Extracts symbol information from source text
#[async_trait::async_trait]
pub trait SymbolAnalyzer: Send + Sync {
    async fn analyze(&self, source: &str) -> Result<AnalysisResult, AnalysisError>;
}

/// Describes the current value of a symbol
#[async_trait::async_trait]
pub trait SymbolInspector: Send + Sync {
    /// Raw inspection reply text, possibly with highlighted section headers
    async fn inspect(&self, symbol: &str) -> Result<String, InspectionError>;
}

/// Live notebook document
#[async_trait::async_trait]
pub trait NotebookHost: Send + Sync {
    /// Current state of a cell, `None` once it has been deleted
    async fn locate_cell(&self, handle: &CellHandle) -> Option<LiveCell>;

    /// Write the durable id into the cell's metadata
    async fn assign_cell_id(&self, handle: &CellHandle, cell_id: &CellId) -> Result<(), HostError>;
}
