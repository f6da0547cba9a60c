//! Epochs and the provenance document root

use crate::cell::CellData;
use crate::error::ModelError;
use crate::ids::CellId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Kernel implementation and version
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KernelInfo {
    #[serde(default)]
    pub implementation: String,
    #[serde(default)]
    pub version: String,
}

/// Language metadata reported by the kernel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LanguageInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub mimetype: String,
}

/// Environment captured when an epoch opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(with = "crate::timestamp")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub kernel: KernelInfo,
    #[serde(default)]
    pub language_info: LanguageInfo,
}

impl Environment {
    /// Snapshot taken now
    #[must_use]
    pub fn capture(kernel: KernelInfo, language_info: LanguageInfo, user_agent: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            user_agent: user_agent.into(),
            kernel,
            language_info,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::capture(KernelInfo::default(), LanguageInfo::default(), String::new())
    }
}

/// One name brought in by a `from module import ...` statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImportEntry {
    Name(String),
    Aliased { name: String, alias: String },
}

/// Import metadata for one module
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Installed version, empty when unknown
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<ImportEntry>>,
}

/// Module name -> import metadata, in first-import order
pub type Modules = IndexMap<String, ModuleInfo>;

/// One continuous kernel lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    #[serde(default)]
    pub modules: Modules,
    #[serde(default)]
    pub data: Vec<CellData>,
    #[serde(default)]
    pub cells: Vec<CellId>,
    pub environment: Environment,
}

impl Epoch {
    /// Open an epoch seeded with its first execution
    #[must_use]
    pub fn open(first: CellData, modules: Modules, environment: Environment) -> Self {
        let mut epoch = Self {
            modules: Modules::new(),
            data: Vec::new(),
            cells: Vec::new(),
            environment,
        };
        epoch.push(first, modules);
        epoch
    }

    /// Append an execution and merge its modules (later wins)
    pub fn push(&mut self, record: CellData, modules: Modules) {
        if !self.cells.contains(&record.cell_id) {
            self.cells.push(record.cell_id.clone());
        }
        self.data.push(record);
        self.modules.extend(modules);
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Zero-based position of a cell in the epoch's cell list
    #[must_use]
    pub fn cell_ordinal(&self, cell_id: &CellId) -> Option<usize> {
        self.cells.iter().position(|c| c == cell_id)
    }

    /// Last position `<= upto` holding an execution of `cell_id`
    #[must_use]
    pub fn last_position_of(&self, cell_id: &CellId, upto: usize) -> Option<usize> {
        let end = upto.min(self.data.len().checked_sub(1)?);
        (0..=end).rev().find(|&pos| self.data[pos].cell_id == *cell_id)
    }

    /// Cells executed at or before `upto`, in epoch cell order
    #[must_use]
    pub fn executed_cells(&self, upto: usize) -> Vec<&CellId> {
        let Some(last) = self.data.len().checked_sub(1) else {
            return Vec::new();
        };
        let prefix = &self.data[..=upto.min(last)];
        self.cells
            .iter()
            .filter(|cell| prefix.iter().any(|record| record.cell_id == **cell))
            .collect()
    }

    /// First execution carrying `execution_count`
    #[must_use]
    pub fn find_execution(&self, execution_count: u32) -> Option<(usize, &CellData)> {
        self.data
            .iter()
            .enumerate()
            .find(|(_, record)| record.execution_count == execution_count)
    }
}

/// Document root persisted alongside the notebook
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProvenanceData {
    #[serde(default)]
    pub epochs: Vec<Epoch>,
    /// Every durable cell id ever recorded
    #[serde(default)]
    pub cells: Vec<CellId>,
}

impl ProvenanceData {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn epoch(&self, index: usize) -> Option<&Epoch> {
        self.epochs.get(index)
    }

    /// Epoch by index, or a typed error
    ///
    /// # Errors
    /// `ModelError::EpochOutOfRange` if `index` does not exist
    pub fn try_epoch(&self, index: usize) -> Result<&Epoch, ModelError> {
        self.epochs.get(index).ok_or(ModelError::EpochOutOfRange {
            epoch: index,
            len: self.epochs.len(),
        })
    }

    #[inline]
    #[must_use]
    pub fn latest_epoch(&self) -> Option<&Epoch> {
        self.epochs.last()
    }

    #[inline]
    pub fn latest_epoch_mut(&mut self) -> Option<&mut Epoch> {
        self.epochs.last_mut()
    }

    /// Add a cell id to the document-wide set if absent
    pub fn record_cell(&mut self, cell_id: &CellId) {
        if !self.cells.contains(cell_id) {
            self.cells.push(cell_id.clone());
        }
    }

    /// Execution identified by epoch and execution count
    ///
    /// # Errors
    /// `EpochOutOfRange` or `ExecutionNotFound`
    pub fn find_execution(&self, epoch: usize, execution_count: u32) -> Result<&CellData, ModelError> {
        self.try_epoch(epoch)?
            .find_execution(execution_count)
            .map(|(_, record)| record)
            .ok_or(ModelError::ExecutionNotFound {
                epoch,
                execution_count,
            })
    }

    /// Total number of recorded executions
    #[must_use]
    pub fn execution_total(&self) -> usize {
        self.epochs.iter().map(Epoch::len).sum()
    }

    /// Extract the document from a notebook's `metadata.provenance`
    ///
    /// # Errors
    /// `MissingProvenance` when the notebook carries none, `Json` when it is malformed
    pub fn from_notebook(notebook: &serde_json::Value) -> Result<Self, ModelError> {
        let provenance = notebook
            .get("metadata")
            .and_then(|m| m.get("provenance"))
            .ok_or(ModelError::MissingProvenance)?;
        Ok(serde_json::from_value(provenance.clone())?)
    }
}
