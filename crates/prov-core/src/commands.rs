//! Graph command dispatch and the panels commands open

use crate::error::SessionError;
use prov_export::{compare_versions, ExecutionInfo, ExportError, SourceVersion, VersionDiff};
use prov_graph::{GraphCommand, Point};
use prov_model::CellId;
use serde::Serialize;

/// Source versions of one cell with the selected comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffPanel {
    pub cell_id: CellId,
    /// Oldest first, target last
    pub versions: Vec<SourceVersion>,
    pub selected: usize,
    pub diff: VersionDiff,
}

impl DiffPanel {
    /// Panel comparing the target with itself until another version is selected
    ///
    /// # Errors
    /// `ExportError::VersionOutOfRange` for an empty history
    pub fn new(cell_id: CellId, versions: Vec<SourceVersion>) -> Result<Self, ExportError> {
        let selected = versions.len().saturating_sub(1);
        let diff = compare_versions(&versions, selected)?;
        Ok(Self {
            cell_id,
            versions,
            selected,
            diff,
        })
    }

    /// Compare version `index` with the target
    ///
    /// # Errors
    /// `ExportError::VersionOutOfRange` past the last version
    pub fn select(&mut self, index: usize) -> Result<&VersionDiff, ExportError> {
        self.diff = compare_versions(&self.versions, index)?;
        self.selected = index;
        Ok(&self.diff)
    }
}

/// What a command opened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum Panel {
    Diff(DiffPanel),
    Info(ExecutionInfo),
    /// Cell to select in the notebook, and where to centre the graph
    Focus {
        cell_id: CellId,
        position: Option<Point>,
    },
}

/// Receiver of graph commands
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    async fn open_diff(&self, cell_id: &CellId, execution_count: u32, epoch: usize) -> Result<Panel, SessionError>;

    async fn open_info(
        &self,
        cell_id: &CellId,
        execution_count: u32,
        epoch: usize,
        variable: Option<&str>,
    ) -> Result<Panel, SessionError>;

    async fn focus_cell(&self, cell_id: &CellId) -> Result<Panel, SessionError>;
}

/// Route `command` to the matching handler method
///
/// # Errors
/// Whatever the handler returns
pub async fn dispatch(handler: &dyn CommandHandler, command: &GraphCommand) -> Result<Panel, SessionError> {
    tracing::debug!("Dispatching {:?}", command);
    match command {
        GraphCommand::OpenDiff {
            cell_id,
            execution_count,
            epoch,
        } => handler.open_diff(cell_id, *execution_count, *epoch).await,
        GraphCommand::OpenInfo {
            cell_id,
            execution_count,
            epoch,
            variable,
        } => {
            handler
                .open_info(cell_id, *execution_count, *epoch, variable.as_deref())
                .await
        }
        GraphCommand::FocusCell { cell_id } => handler.focus_cell(cell_id).await,
    }
}
