//! Testing utilities for the provlab workspace
//!
//! Shared fixtures and scripted collaborators.

#![allow(missing_docs)]

use indexmap::IndexMap;
use parking_lot::Mutex;
use prov_graph::DocumentView;
use prov_model::{CellData, CellHandle, CellId, Environment, Epoch, KernelInfo, LanguageInfo, Modules, ProvenanceData};
use prov_recorder::{
    AnalysisError, AnalysisResult, HostError, InspectionError, LiveCell, NotebookHost, SymbolAnalyzer,
    SymbolInspector,
};
use prov_store::{MemoryPersistence, ProvenanceStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub fn test_environment() -> Environment {
    Environment::capture(
        KernelInfo {
            implementation: "ipython".into(),
            version: "8.20.0".into(),
        },
        LanguageInfo {
            name: "python".into(),
            version: "3.11.6".into(),
            mimetype: "text/x-python".into(),
        },
        "provlab-test",
    )
}

/// Execution of `cell` with local and remote symbols
pub fn execution(cell: &str, count: u32, local: &[&str], remote: &[&str]) -> CellData {
    CellData::new(CellId::new(cell), count)
        .with_source(format!("# {cell}"))
        .with_local(local.iter().copied())
        .with_remote(remote.iter().copied())
}

/// Builds one epoch execution by execution
#[derive(Debug, Default)]
pub struct EpochBuilder {
    records: Vec<CellData>,
    modules: Modules,
}

impl EpochBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(mut self, cell: &str, count: u32, local: &[&str], remote: &[&str]) -> Self {
        self.records.push(execution(cell, count, local, remote));
        self
    }

    pub fn record(mut self, record: CellData) -> Self {
        self.records.push(record);
        self
    }

    pub fn module(mut self, name: &str, version: &str) -> Self {
        self.modules.insert(
            name.to_string(),
            prov_model::ModuleInfo {
                version: version.to_string(),
                ..Default::default()
            },
        );
        self
    }

    /// # Panics
    /// On an empty builder
    pub fn build(self) -> Epoch {
        let mut records = self.records.into_iter();
        let first = records.next().expect("epoch needs at least one execution");
        let mut epoch = Epoch::open(first, self.modules, test_environment());
        for record in records {
            epoch.push(record, Modules::new());
        }
        epoch
    }
}

/// Document from epochs, with the document-wide cell list filled in
pub fn document(epochs: Vec<Epoch>) -> ProvenanceData {
    let mut data = ProvenanceData::new();
    for epoch in epochs {
        for cell_id in &epoch.cells {
            data.record_cell(cell_id);
        }
        data.epochs.push(epoch);
    }
    data
}

/// Store over fresh in-memory persistence
pub async fn memory_store() -> Arc<ProvenanceStore> {
    let store = ProvenanceStore::open(Arc::new(MemoryPersistence::new()))
        .await
        .unwrap();
    Arc::new(store)
}

/// Analyzer answering from a table of source texts
///
/// Unknown sources are rejected. Optional per-source delays simulate a slow
/// service.
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    results: Mutex<HashMap<String, AnalysisResult>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, source: &str, local: &[&str], remote: &[&str]) -> Self {
        self.results.lock().insert(
            source.to_string(),
            AnalysisResult::symbols(local.iter().copied(), remote.iter().copied()),
        );
        self
    }

    pub fn with_result(self, source: &str, result: AnalysisResult) -> Self {
        self.results.lock().insert(source.to_string(), result);
        self
    }

    pub fn with_delay(self, source: &str, delay: Duration) -> Self {
        self.delays.lock().insert(source.to_string(), delay);
        self
    }

    /// Sources analyzed so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl SymbolAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, source: &str) -> Result<AnalysisResult, AnalysisError> {
        self.calls.lock().push(source.to_string());
        let delay = self.delays.lock().get(source).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .lock()
            .get(source)
            .cloned()
            .ok_or_else(|| AnalysisError::Rejected(source.to_string()))
    }
}

/// Inspector answering `Type: <type>` per symbol
#[derive(Debug, Default)]
pub struct ScriptedInspector {
    replies: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl ScriptedInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw reply text for `symbol`
    pub fn with(self, symbol: &str, reply: &str) -> Self {
        self.replies.lock().insert(symbol.to_string(), reply.to_string());
        self
    }

    pub fn with_delay(self, symbol: &str, delay: Duration) -> Self {
        self.delays.lock().insert(symbol.to_string(), delay);
        self
    }
}

#[async_trait::async_trait]
impl SymbolInspector for ScriptedInspector {
    async fn inspect(&self, symbol: &str) -> Result<String, InspectionError> {
        let delay = self.delays.lock().get(symbol).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .get(symbol)
            .cloned()
            .ok_or_else(|| InspectionError::NotFound(symbol.to_string()))
    }
}

/// In-memory notebook document
#[derive(Debug, Default)]
pub struct MemoryNotebook {
    cells: Mutex<IndexMap<CellHandle, LiveCell>>,
}

impl MemoryNotebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, cell: LiveCell) {
        self.cells.lock().insert(cell.handle.clone(), cell);
    }

    pub fn add_code(&self, handle: &str, source: &str) {
        self.add(LiveCell::code(handle, source));
    }

    pub fn set_source(&self, handle: &str, source: &str) {
        if let Some(cell) = self.cells.lock().get_mut(&CellHandle::new(handle)) {
            cell.source = source.to_string();
        }
    }

    pub fn remove(&self, handle: &str) {
        self.cells.lock().shift_remove(&CellHandle::new(handle));
    }

    pub fn cell(&self, handle: &str) -> Option<LiveCell> {
        self.cells.lock().get(&CellHandle::new(handle)).cloned()
    }
}

#[async_trait::async_trait]
impl NotebookHost for MemoryNotebook {
    async fn locate_cell(&self, handle: &CellHandle) -> Option<LiveCell> {
        self.cells.lock().get(handle).cloned()
    }

    async fn assign_cell_id(&self, handle: &CellHandle, cell_id: &CellId) -> Result<(), HostError> {
        let mut cells = self.cells.lock();
        let cell = cells
            .get_mut(handle)
            .ok_or_else(|| HostError::CellNotFound(handle.clone()))?;
        cell.cell_id = Some(cell_id.clone());
        Ok(())
    }
}

impl DocumentView for MemoryNotebook {
    fn contains_cell(&self, cell_id: &CellId) -> bool {
        self.cells.lock().values().any(|cell| cell.cell_id.as_ref() == Some(cell_id))
    }
}
