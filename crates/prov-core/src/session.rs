//! Per-notebook session
//!
//! A session owns everything one open notebook needs:
//! - the provenance store and the recorder feeding it
//! - the live graph, written only by this session's renders
//! - the view cursor and display options
//! - the render generation counter
//!
//! Starting a render bumps the generation and cancels the render in flight.
//! A render publishes its graph only if no newer render started meanwhile, so
//! the published graph always belongs to the last requested cursor.

use crate::commands::{CommandHandler, DiffPanel, Panel};
use crate::config::ProvConfig;
use crate::error::SessionError;
use parking_lot::Mutex;
use prov_export::{epoch_report, execution_info, version_history, EpochReport};
use prov_graph::{
    CancelFlag, DocumentView, GraphBuilder, GraphSnapshot, NodeKey, Point, ProvenanceGraph, RenderMode, RenderOutcome,
    RenderRequest,
};
use prov_model::{CellId, Cursor};
use prov_recorder::{
    ExecutionRecorder, LifecycleEvent, NotebookHost, RecordOutcome, SymbolAnalyzer, SymbolInspector,
};
use prov_store::{ProvenancePersistence, ProvenanceStore};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// External collaborators of a session
#[derive(Clone)]
pub struct SessionServices {
    pub analyzer: Arc<dyn SymbolAnalyzer>,
    pub inspector: Arc<dyn SymbolInspector>,
    pub host: Arc<dyn NotebookHost>,
    /// Live-document view used to mark deleted cells
    pub document: Arc<dyn DocumentView>,
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices").finish_non_exhaustive()
    }
}

/// The four user-facing display options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ViewOptions {
    pub render_imports: bool,
    pub zoom_on_select: bool,
    pub show_last_execution: bool,
    pub render_on_update: bool,
}

impl From<&ProvConfig> for ViewOptions {
    fn from(config: &ProvConfig) -> Self {
        Self {
            render_imports: config.render_imports,
            zoom_on_select: config.zoom_on_select,
            show_last_execution: config.show_last_execution,
            render_on_update: config.render_on_update,
        }
    }
}

impl ViewOptions {
    #[inline]
    #[must_use]
    pub fn render_mode(self) -> RenderMode {
        if self.show_last_execution {
            RenderMode::LastExecution
        } else {
            RenderMode::Cumulative
        }
    }

    fn request(self, cursor: Cursor) -> RenderRequest {
        RenderRequest::new(cursor)
            .with_mode(self.render_mode())
            .with_imports(self.render_imports)
    }
}

/// Slider positions and their bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SliderState {
    pub epoch: usize,
    pub epochs: usize,
    pub cell: usize,
    /// Executions in the selected epoch
    pub cells: usize,
}

#[derive(Debug, Default)]
struct ViewState {
    /// `None` follows the latest execution
    cursor: Option<Cursor>,
    options: ViewOptions,
}

/// State and services of one open notebook
pub struct Session {
    key: String,
    store: Arc<ProvenanceStore>,
    recorder: Arc<ExecutionRecorder>,
    document: Arc<dyn DocumentView>,
    builder: GraphBuilder,
    graph: tokio::sync::Mutex<ProvenanceGraph>,
    view: Mutex<ViewState>,
    generation: AtomicU64,
    in_flight: Mutex<CancelFlag>,
    displayed: watch::Sender<Vec<u32>>,
    auto_render: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session over `persistence`
    ///
    /// When `render_on_update` is set the session re-renders after every
    /// store change.
    ///
    /// # Errors
    /// Store errors while loading the persisted document
    pub async fn open(
        key: impl Into<String>,
        config: &ProvConfig,
        persistence: Arc<dyn ProvenancePersistence>,
        services: SessionServices,
    ) -> Result<Arc<Self>, SessionError> {
        let store = Arc::new(ProvenanceStore::open(persistence).await?);
        let recorder = ExecutionRecorder::new(
            Arc::clone(&store),
            services.analyzer,
            services.inspector,
            services.host,
            config.recorder_settings(),
        )?;
        let (displayed, _) = watch::channel(Vec::new());

        let session = Arc::new(Self {
            key: key.into(),
            store,
            recorder: Arc::new(recorder),
            document: services.document,
            builder: GraphBuilder::new(),
            graph: tokio::sync::Mutex::new(ProvenanceGraph::new()),
            view: Mutex::new(ViewState {
                cursor: None,
                options: ViewOptions::from(config),
            }),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(CancelFlag::new()),
            displayed,
            auto_render: Mutex::new(None),
        });
        session.spawn_auto_render();
        tracing::info!("Opened session {}", session.key);
        Ok(session)
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ProvenanceStore> {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn recorder(&self) -> &Arc<ExecutionRecorder> {
        &self.recorder
    }

    /// Feed a lifecycle event to the recorder and wait for its outcome
    pub async fn record(&self, event: LifecycleEvent) -> RecordOutcome {
        self.recorder.handle(event).await
    }

    #[must_use]
    pub fn options(&self) -> ViewOptions {
        self.view.lock().options
    }

    /// Explicit cursor, `None` while following the latest execution
    #[must_use]
    pub fn cursor(&self) -> Option<Cursor> {
        self.view.lock().cursor
    }

    /// Execution counts shown by the last published render
    #[must_use]
    pub fn displayed_executions(&self) -> Vec<u32> {
        self.displayed.borrow().clone()
    }

    /// Notified whenever a render is published
    #[must_use]
    pub fn subscribe_displayed(&self) -> watch::Receiver<Vec<u32>> {
        self.displayed.subscribe()
    }

    /// Serializable copy of the live graph
    pub async fn snapshot(&self) -> GraphSnapshot {
        self.graph.lock().await.snapshot()
    }

    /// Current slider positions, `None` before anything was recorded
    pub async fn slider(&self) -> Option<SliderState> {
        let requested = self.cursor();
        self.store
            .read(|data| {
                let cursor = requested.and_then(|c| c.clamp(data)).or_else(|| Cursor::latest(data))?;
                Some(SliderState {
                    epoch: cursor.epoch,
                    epochs: data.epochs.len(),
                    cell: cursor.cell,
                    cells: data.epochs[cursor.epoch].len(),
                })
            })
            .await
    }

    /// Move the cursor and re-render
    ///
    /// # Errors
    /// Render failures other than being superseded
    pub async fn set_cursor(&self, cursor: Cursor) -> Result<Option<RenderOutcome>, SessionError> {
        self.view.lock().cursor = Some(cursor);
        self.render().await
    }

    /// Select an epoch, positioned on its last execution
    ///
    /// # Errors
    /// Render failures other than being superseded
    pub async fn set_epoch(&self, epoch: usize) -> Result<Option<RenderOutcome>, SessionError> {
        let target = self
            .store
            .read(|data| {
                let last = data.epochs.len().checked_sub(1)?;
                Cursor::end_of_epoch(data, epoch.min(last))
            })
            .await;
        match target {
            Some(cursor) => self.set_cursor(cursor).await,
            None => self.render().await,
        }
    }

    /// Follow the latest execution again
    ///
    /// # Errors
    /// Render failures other than being superseded
    pub async fn follow_latest(&self) -> Result<Option<RenderOutcome>, SessionError> {
        self.view.lock().cursor = None;
        self.render().await
    }

    /// Change display options, re-rendering if the graph is affected
    ///
    /// # Errors
    /// Render failures other than being superseded
    pub async fn update_options(
        &self,
        update: impl FnOnce(&mut ViewOptions),
    ) -> Result<Option<RenderOutcome>, SessionError> {
        let (before, after) = {
            let mut view = self.view.lock();
            let before = view.options;
            update(&mut view.options);
            (before, view.options)
        };
        let redraw = before.render_imports != after.render_imports
            || before.show_last_execution != after.show_last_execution
            || (!before.render_on_update && after.render_on_update);
        if redraw {
            self.render().await
        } else {
            Ok(None)
        }
    }

    /// Render the current cursor and publish the result
    ///
    /// Returns `Ok(None)` when a newer render superseded this one.
    ///
    /// # Errors
    /// Resolution failures other than cancellation
    pub async fn render(&self) -> Result<Option<RenderOutcome>, SessionError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelFlag::new();
        std::mem::replace(&mut *self.in_flight.lock(), cancel.clone()).cancel();

        let (cursor, options) = {
            let view = self.view.lock();
            (view.cursor, view.options)
        };
        let data = self.store.snapshot().await;
        let Some(cursor) = cursor.or_else(|| Cursor::latest(&data)) else {
            return Ok(self.publish(generation, ProvenanceGraph::new(), RenderOutcome::default()).await);
        };

        let builder = self.builder.clone();
        let document = Arc::clone(&self.document);
        let request = options.request(cursor);
        let worker_cancel = cancel.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            builder.render(&data, request, document.as_ref(), &worker_cancel)
        })
        .await;

        match rendered {
            Ok(Ok((graph, outcome))) => Ok(self.publish(generation, graph, outcome).await),
            Ok(Err(e)) if e.is_cancelled() => {
                tracing::debug!("Render {} of session {} cancelled", generation, self.key);
                Ok(None)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(e) => {
                tracing::error!("Render task of session {} failed: {}", self.key, e);
                Ok(None)
            }
        }
    }

    async fn publish(&self, generation: u64, graph: ProvenanceGraph, outcome: RenderOutcome) -> Option<RenderOutcome> {
        let mut live = self.graph.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding stale render {} of session {}", generation, self.key);
            return None;
        }
        *live = graph;
        self.displayed.send_replace(outcome.displayed_executions.clone());
        Some(outcome)
    }

    /// Graph position to centre on when `cell_id` is selected in the notebook
    ///
    /// `None` when zooming is disabled or the cell is not drawn.
    pub async fn select_cell(&self, cell_id: &CellId) -> Option<Point> {
        if !self.options().zoom_on_select {
            return None;
        }
        self.graph.lock().await.position(&NodeKey::cell(cell_id.clone()))
    }

    /// Environment, import usage and data sources of an epoch
    ///
    /// # Errors
    /// `SessionError::Export` for an unknown epoch
    pub async fn epoch_report(&self, epoch: usize) -> Result<EpochReport, SessionError> {
        Ok(self.store.read(|data| epoch_report(data, epoch)).await?)
    }

    fn spawn_auto_render(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut changes = self.store.subscribe();
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if !session.options().render_on_update {
                    continue;
                }
                if let Err(e) = session.render().await {
                    tracing::warn!("Automatic render of session {} failed: {}", session.key, e);
                }
            }
        });
        *self.auto_render.lock() = Some(task);
    }

    /// Stop background work
    pub fn close(&self) {
        if let Some(task) = self.auto_render.lock().take() {
            task.abort();
        }
        self.in_flight.lock().cancel();
        tracing::info!("Closed session {}", self.key);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.auto_render.get_mut().take() {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for Session {
    async fn open_diff(&self, cell_id: &CellId, execution_count: u32, epoch: usize) -> Result<Panel, SessionError> {
        let versions = self
            .store
            .read(|data| version_history(data, cell_id, epoch, execution_count))
            .await?;
        Ok(Panel::Diff(DiffPanel::new(cell_id.clone(), versions)?))
    }

    async fn open_info(
        &self,
        _cell_id: &CellId,
        execution_count: u32,
        epoch: usize,
        variable: Option<&str>,
    ) -> Result<Panel, SessionError> {
        let info = self
            .store
            .read(|data| execution_info(data, epoch, execution_count, variable))
            .await?;
        Ok(Panel::Info(info))
    }

    async fn focus_cell(&self, cell_id: &CellId) -> Result<Panel, SessionError> {
        Ok(Panel::Focus {
            cell_id: cell_id.clone(),
            position: self.select_cell(cell_id).await,
        })
    }
}
