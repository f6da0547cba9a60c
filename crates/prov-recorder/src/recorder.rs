//! Execution recorder
//!
//! Lifecycle of one execution:
//! - request sent: take a send-order token, start preparation (wait for the
//!   analysis of the cell's current source, inspect its local symbols)
//! - reply received: finish preparation, wait for the token's turn, build the
//!   record from the live cell and append it
//!
//! Every reply takes its turn before deciding to drop, so a dropped reply
//! never holds back the ones sent after it.

use crate::analysis::{AnalysisCache, AnalysisResult};
use crate::error::RecorderError;
use crate::events::{LifecycleEvent, RecordOutcome, ReplyStatus};
use crate::inspect::InspectionFormatter;
use crate::services::{NotebookHost, SymbolAnalyzer, SymbolInspector};
use dashmap::{DashMap, DashSet};
use indexmap::IndexMap;
use parking_lot::Mutex;
use prov_model::{CellData, CellHandle, CellId, Environment, KernelInfo, LanguageInfo};
use prov_store::{AppendReceipt, EpochHint, KernelStart, ProvenanceStore, SequenceGate, SequenceToken};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Recorder tuning
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// How long an execution waits for its cell's analysis
    pub analysis_timeout: Duration,
    /// Bound on waiting for earlier executions; `None` waits forever
    pub sequence_timeout: Option<Duration>,
    /// Maximum number of cached analyses
    pub cache_capacity: u64,
    /// Recorded in each epoch's environment
    pub user_agent: String,
}

impl RecorderSettings {
    #[must_use]
    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sequence_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sequence_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(5),
            sequence_timeout: Some(Duration::from_secs(30)),
            cache_capacity: 10_000,
            user_agent: format!("provlab/{}", crate::VERSION),
        }
    }
}

#[derive(Debug, Default)]
struct Preparation {
    analysis: Option<Arc<AnalysisResult>>,
    local_info: IndexMap<String, String>,
}

#[derive(Debug)]
struct PendingExecution {
    token: SequenceToken,
    handle: CellHandle,
    preparation: JoinHandle<Preparation>,
}

#[derive(Debug, Default)]
struct KernelState {
    kernel: KernelInfo,
    language: LanguageInfo,
    generation: u64,
    /// An execution was recorded in this generation
    recorded: bool,
}

/// Turns lifecycle events into appended provenance records
pub struct ExecutionRecorder {
    store: Arc<ProvenanceStore>,
    gate: SequenceGate,
    analyzer: Arc<dyn SymbolAnalyzer>,
    inspector: Arc<dyn SymbolInspector>,
    host: Arc<dyn NotebookHost>,
    cache: AnalysisCache,
    formatter: InspectionFormatter,
    pending: DashMap<String, PendingExecution>,
    replied: DashSet<String>,
    kernel: Mutex<KernelState>,
    settings: RecorderSettings,
}

impl std::fmt::Debug for ExecutionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRecorder")
            .field("pending", &self.pending.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ExecutionRecorder {
    /// # Errors
    /// `RecorderError::Pattern` if the inspection formatter cannot be built
    pub fn new(
        store: Arc<ProvenanceStore>,
        analyzer: Arc<dyn SymbolAnalyzer>,
        inspector: Arc<dyn SymbolInspector>,
        host: Arc<dyn NotebookHost>,
        settings: RecorderSettings,
    ) -> Result<Self, RecorderError> {
        Ok(Self {
            store,
            gate: SequenceGate::new(),
            analyzer,
            inspector,
            host,
            cache: AnalysisCache::new(settings.cache_capacity),
            formatter: InspectionFormatter::new()?,
            pending: DashMap::new(),
            replied: DashSet::new(),
            kernel: Mutex::new(KernelState::default()),
            settings,
        })
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ProvenanceStore> {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    #[inline]
    #[must_use]
    pub fn gate(&self) -> &SequenceGate {
        &self.gate
    }

    /// Requests still waiting for their reply
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply an event's synchronous effects now and finish it in a task
    ///
    /// Events must be submitted in the order they occur: send-order tokens
    /// and analysis revisions are taken here, before anything is awaited.
    pub fn submit(self: &Arc<Self>, event: LifecycleEvent) -> JoinHandle<RecordOutcome> {
        tracing::debug!("Recorder event {}", event.name());
        match event {
            LifecycleEvent::CellSourceChanged { handle, source } => {
                let revision = self.cache.begin(&handle);
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.analyze(handle, revision, &source).await;
                    RecordOutcome::Observed
                })
            }
            LifecycleEvent::AnalysisAvailable { handle, result } => {
                let revision = self.cache.current_or_begin(&handle);
                let cache = self.cache.clone();
                tokio::spawn(async move {
                    cache.store(handle, revision, result).await;
                    RecordOutcome::Observed
                })
            }
            LifecycleEvent::AnalysisFailed { handle, reason } => {
                tracing::warn!("Analysis of cell {} failed: {}", handle, reason);
                let revision = self.cache.current_or_begin(&handle);
                let cache = self.cache.clone();
                tokio::spawn(async move {
                    cache.fail(handle, revision).await;
                    RecordOutcome::Observed
                })
            }
            LifecycleEvent::KernelInfo { kernel, language } => {
                let mut state = self.kernel.lock();
                state.kernel = kernel;
                state.language = language;
                drop(state);
                observed()
            }
            LifecycleEvent::KernelRestarted => {
                self.kernel_restarted();
                observed()
            }
            LifecycleEvent::ExecuteRequestSent { msg_id, handle } => {
                self.request_sent(msg_id, handle);
                observed()
            }
            LifecycleEvent::ExecuteReplyReceived {
                msg_id,
                status,
                execution_count,
            } => match self.take_pending(&msg_id) {
                Ok(pending) => {
                    let this = Arc::clone(self);
                    tokio::spawn(async move { this.complete(msg_id, pending, status, execution_count).await })
                }
                Err(e) => {
                    tracing::debug!("Ignoring execute reply: {}", e);
                    tokio::spawn(async move { RecordOutcome::Dropped(e) })
                }
            },
        }
    }

    /// Submit an event and wait for its outcome
    pub async fn handle(self: &Arc<Self>, event: LifecycleEvent) -> RecordOutcome {
        match self.submit(event).await {
            Ok(outcome) => outcome,
            Err(e) => RecordOutcome::Dropped(RecorderError::TaskFailed(e.to_string())),
        }
    }

    async fn analyze(&self, handle: CellHandle, revision: u64, source: &str) {
        match self.analyzer.analyze(source).await {
            Ok(result) => self.cache.store(handle, revision, result).await,
            Err(e) => {
                tracing::warn!("Analysis of cell {} failed: {}", handle, e);
                self.cache.fail(handle, revision).await;
            }
        }
    }

    fn request_sent(self: &Arc<Self>, msg_id: String, handle: CellHandle) {
        let token = self.gate.issue();
        let revision = self.cache.revision(&handle);

        let this = Arc::clone(self);
        let cell = handle.clone();
        let preparation = tokio::spawn(async move { this.prepare(cell, revision).await });

        tracing::debug!("Execute request {} for cell {} holds token {}", msg_id, handle, token);
        let pending = PendingExecution {
            token,
            handle,
            preparation,
        };
        if let Some(previous) = self.pending.insert(msg_id.clone(), pending) {
            tracing::warn!("Execute request id {} reused; abandoning token {}", msg_id, previous.token);
            previous.preparation.abort();
            self.gate.release(previous.token);
        }
    }

    async fn prepare(&self, handle: CellHandle, revision: u64) -> Preparation {
        let analysis = if revision == 0 {
            self.analyze_live(&handle).await
        } else {
            self.cache
                .wait_for(&handle, revision, self.settings.analysis_timeout)
                .await
        };

        let Some(analysis) = analysis else {
            return Preparation::default();
        };
        let local_info = self
            .formatter
            .inspect_all(self.inspector.as_ref(), &analysis.local)
            .await;
        Preparation {
            analysis: Some(analysis),
            local_info,
        }
    }

    /// Analyze a cell that never reported a source change
    async fn analyze_live(&self, handle: &CellHandle) -> Option<Arc<AnalysisResult>> {
        let cell = self.host.locate_cell(handle).await?;
        if !cell.is_code() {
            return None;
        }
        let revision = self.cache.current_or_begin(handle);
        self.analyze(handle.clone(), revision, &cell.source).await;
        self.cache.get(handle).await
    }

    fn take_pending(&self, msg_id: &str) -> Result<PendingExecution, RecorderError> {
        if let Some((_, pending)) = self.pending.remove(msg_id) {
            self.replied.insert(msg_id.to_string());
            return Ok(pending);
        }
        if self.replied.contains(msg_id) {
            Err(RecorderError::DuplicateReply(msg_id.to_string()))
        } else {
            Err(RecorderError::UnknownRequest(msg_id.to_string()))
        }
    }

    async fn complete(
        &self,
        msg_id: String,
        pending: PendingExecution,
        status: ReplyStatus,
        execution_count: u32,
    ) -> RecordOutcome {
        match self.record(&msg_id, pending, status, execution_count).await {
            Ok(receipt) => RecordOutcome::Appended(receipt),
            Err(e) => {
                if e.is_recoverable() {
                    tracing::info!("Dropped execute reply {}: {}", msg_id, e);
                } else {
                    tracing::error!("Dropped execute reply {}: {}", msg_id, e);
                }
                RecordOutcome::Dropped(e)
            }
        }
    }

    async fn record(
        &self,
        msg_id: &str,
        pending: PendingExecution,
        status: ReplyStatus,
        execution_count: u32,
    ) -> Result<AppendReceipt, RecorderError> {
        let PendingExecution {
            token,
            handle,
            preparation,
        } = pending;

        let prepared = preparation.await;
        let turn = self.gate.wait_turn(token, self.settings.sequence_timeout).await?;

        let prepared = prepared.map_err(|e| RecorderError::Preparation {
            msg_id: msg_id.to_string(),
            reason: e.to_string(),
        })?;
        let kind = status
            .execution_kind()
            .ok_or_else(|| RecorderError::Aborted(msg_id.to_string()))?;
        let cell = self
            .host
            .locate_cell(&handle)
            .await
            .ok_or_else(|| RecorderError::CellNotFound(handle.clone()))?;
        if !cell.is_code() {
            return Err(RecorderError::NotCode(handle));
        }
        let analysis = prepared
            .analysis
            .ok_or_else(|| RecorderError::AnalysisUnavailable(handle.clone()))?;

        let cell_id = match cell.cell_id {
            Some(cell_id) => cell_id,
            None => self.assign_cell_id(&handle).await,
        };

        let mut record = CellData::new(cell_id, execution_count)
            .with_source(cell.source)
            .with_outputs(cell.outputs)
            .with_kind(kind);
        record.definitions = analysis.definitions.clone();
        record.local = analysis.local.clone();
        record.remote = analysis.remote.clone();
        record.imports = analysis.imports.clone();
        record.data_vars = analysis.data_vars.clone();
        record.data_values = analysis.data_values.clone();
        record.local_info = prepared.local_info;

        let hint = self.epoch_hint(execution_count);
        let environment = self.environment();
        let receipt = self
            .store
            .append(record, analysis.modules.clone(), hint, environment)
            .await;
        drop(turn);
        Ok(receipt)
    }

    /// First execution of the cell: derive its durable id from the handle
    async fn assign_cell_id(&self, handle: &CellHandle) -> CellId {
        let cell_id = CellId::new(handle.as_str());
        if let Err(e) = self.host.assign_cell_id(handle, &cell_id).await {
            tracing::warn!("Could not store durable id for cell {}: {}", handle, e);
        }
        cell_id
    }

    /// Execution count 1 marks a kernel start
    ///
    /// Counts restart at 1 only when the kernel does, so a second count of 1
    /// within one generation means a restart the recorder was not told about.
    fn epoch_hint(&self, execution_count: u32) -> EpochHint {
        let mut state = self.kernel.lock();
        let hint = if execution_count == 1 {
            if state.recorded {
                state.generation += 1;
            }
            EpochHint::KernelStart(KernelStart(state.generation))
        } else {
            EpochHint::Continue
        };
        state.recorded = true;
        hint
    }

    fn environment(&self) -> Environment {
        let state = self.kernel.lock();
        Environment::capture(
            state.kernel.clone(),
            state.language.clone(),
            self.settings.user_agent.clone(),
        )
    }

    fn kernel_restarted(&self) {
        {
            let mut state = self.kernel.lock();
            state.generation += 1;
            state.recorded = false;
        }

        let abandoned: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        for msg_id in &abandoned {
            if let Some((_, pending)) = self.pending.remove(msg_id) {
                pending.preparation.abort();
                self.gate.release(pending.token);
            }
        }
        tracing::info!("Kernel restarted; released {} pending requests", abandoned.len());
    }
}

fn observed() -> JoinHandle<RecordOutcome> {
    tokio::spawn(async { RecordOutcome::Observed })
}
