//! Graph builder
//!
//! Turns a cursor position into a rendered graph:
//! 1. choose seed executions for the render mode
//! 2. resolve their dependency closure
//! 3. add cell groups, execution nodes and per-symbol edges
//! 4. lay the graph out

use crate::error::GraphError;
use crate::graph::{EdgeClass, EdgeKey, ExecutionClass, ProvenanceGraph};
use crate::layout::{LayeredLayout, LayoutEngine};
use crate::resolve::{resolve, CancelFlag, EdgeKind};
use prov_model::{CellId, Cursor, Epoch, ProvenanceData};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Live view of the notebook, used to mark deleted cells
pub trait DocumentView: Send + Sync {
    fn contains_cell(&self, cell_id: &CellId) -> bool;
}

/// Document view that treats every cell as live
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedDocument;

impl DocumentView for DetachedDocument {
    fn contains_cell(&self, _cell_id: &CellId) -> bool {
        true
    }
}

impl DocumentView for HashSet<CellId> {
    fn contains_cell(&self, cell_id: &CellId) -> bool {
        self.contains(cell_id)
    }
}

/// Which executions seed a render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Latest execution at or before the cursor of every cell executed so far
    #[default]
    Cumulative,
    /// Only the execution at the cursor
    LastExecution,
}

/// Parameters of one render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub cursor: Cursor,
    pub mode: RenderMode,
    pub include_imports: bool,
}

impl RenderRequest {
    #[must_use]
    pub fn new(cursor: Cursor) -> Self {
        Self {
            cursor,
            mode: RenderMode::Cumulative,
            include_imports: false,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_imports(mut self, include_imports: bool) -> Self {
        self.include_imports = include_imports;
        self
    }
}

/// Summary of a completed render
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RenderOutcome {
    /// Cursor after clamping, `None` when there was nothing to render
    pub cursor: Option<Cursor>,
    pub displayed_executions: Vec<u32>,
    pub nodes: usize,
    pub edges: usize,
}

/// Builds provenance graphs from the stored document
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder<L = LayeredLayout> {
    layout: L,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: LayoutEngine> GraphBuilder<L> {
    #[must_use]
    pub fn with_layout(layout: L) -> Self {
        Self { layout }
    }

    /// Render into a fresh graph
    ///
    /// # Errors
    /// `GraphError::Resolve(Cancelled)` when `cancel` is set mid-walk
    pub fn render(
        &self,
        data: &ProvenanceData,
        request: RenderRequest,
        document: &dyn DocumentView,
        cancel: &CancelFlag,
    ) -> Result<(ProvenanceGraph, RenderOutcome), GraphError> {
        let mut graph = ProvenanceGraph::new();
        let outcome = self.render_into(&mut graph, data, request, document, cancel)?;
        Ok((graph, outcome))
    }

    /// Clear `graph` and render into it
    ///
    /// Resolution runs before the graph is touched, so a cancelled render
    /// leaves `graph` as it was.
    ///
    /// # Errors
    /// `GraphError::Resolve(Cancelled)` when `cancel` is set mid-walk
    pub fn render_into(
        &self,
        graph: &mut ProvenanceGraph,
        data: &ProvenanceData,
        request: RenderRequest,
        document: &dyn DocumentView,
        cancel: &CancelFlag,
    ) -> Result<RenderOutcome, GraphError> {
        let Some(cursor) = request.cursor.clamp(data) else {
            graph.clear();
            return Ok(RenderOutcome::default());
        };
        let epoch = data.try_epoch(cursor.epoch)?;

        let seeds = seeds(epoch, cursor.cell, request.mode);
        let closure = resolve(&epoch.data, &seeds, request.include_imports, cancel)?;

        graph.clear();
        for &position in &closure.positions {
            let record = &epoch.data[position];
            let ordinal = epoch.cell_ordinal(&record.cell_id).unwrap_or(0);
            graph.add_cell_group(
                record.cell_id.clone(),
                format!("Cell: {}", ordinal + 1),
                !document.contains_cell(&record.cell_id),
            );
            let class = ExecutionClass {
                data_source: closure.is_data_source(position),
                output: record.has_outputs(),
                error: record.is_error(),
            };
            graph.add_execution(record.key(), cursor.epoch, position, class)?;
        }

        for edge in &closure.edges {
            let target = &epoch.data[edge.target];
            let source = &epoch.data[edge.source];
            if target.execution_count == source.execution_count {
                continue;
            }
            let class = EdgeClass {
                data_source: edge.data_source,
                import: edge.kind == EdgeKind::Import,
            };
            for symbol in &edge.symbols {
                let key = EdgeKey {
                    target: target.key(),
                    source: source.key(),
                    symbol: symbol.clone(),
                };
                graph.add_edge(key, cursor.epoch, class)?;
            }
        }

        self.layout.layout(graph);

        let outcome = RenderOutcome {
            cursor: Some(cursor),
            displayed_executions: graph.displayed_executions(),
            nodes: graph.node_count(),
            edges: graph.edge_count(),
        };
        tracing::debug!(
            "Rendered epoch {} up to {}: {} nodes, {} edges",
            cursor.epoch,
            cursor.cell,
            outcome.nodes,
            outcome.edges
        );
        Ok(outcome)
    }
}

/// Seed positions for a render at `upto`
fn seeds(epoch: &Epoch, upto: usize, mode: RenderMode) -> Vec<usize> {
    match mode {
        RenderMode::LastExecution => vec![upto],
        RenderMode::Cumulative => epoch
            .executed_cells(upto)
            .into_iter()
            .filter_map(|cell| epoch.last_position_of(cell, upto))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKey;
    use prov_model::{CellData, Environment, ExecutionKey, ExecutionKind, Modules};

    fn exec(cell: &str, count: u32, local: &[&str], remote: &[&str]) -> CellData {
        CellData::new(CellId::new(cell), count)
            .with_local(local.iter().copied())
            .with_remote(remote.iter().copied())
    }

    fn document(executions: Vec<CellData>) -> ProvenanceData {
        let mut iter = executions.into_iter();
        let mut data = ProvenanceData::new();
        let Some(first) = iter.next() else {
            return data;
        };
        let mut epoch = Epoch::open(first, Modules::new(), Environment::default());
        for record in iter {
            epoch.push(record, Modules::new());
        }
        data.epochs.push(epoch);
        data
    }

    fn key(cell: &str, count: u32) -> ExecutionKey {
        ExecutionKey::new(CellId::new(cell), count)
    }

    fn render(data: &ProvenanceData, request: RenderRequest) -> (ProvenanceGraph, RenderOutcome) {
        GraphBuilder::new()
            .render(data, request, &DetachedDocument, &CancelFlag::new())
            .unwrap()
    }

    #[test]
    fn cumulative_render_covers_every_executed_cell() {
        let data = document(vec![
            exec("a", 1, &["x"], &[]),
            exec("b", 2, &["y"], &[]),
            exec("c", 3, &["z"], &["x", "y"]),
        ]);
        let (graph, outcome) = render(&data, RenderRequest::new(Cursor::new(0, 2)));

        assert_eq!(outcome.displayed_executions, vec![1, 2, 3]);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.contains_edge(&EdgeKey {
            target: key("c", 3),
            source: key("a", 1),
            symbol: "x".into(),
        }));
    }

    #[test]
    fn last_execution_mode_shows_its_closure_only() {
        let data = document(vec![
            exec("a", 1, &["x"], &[]),
            exec("b", 2, &["unrelated"], &[]),
            exec("c", 3, &[], &["x"]),
        ]);
        let request = RenderRequest::new(Cursor::new(0, 2)).with_mode(RenderMode::LastExecution);
        let (graph, outcome) = render(&data, request);

        assert_eq!(outcome.displayed_executions, vec![1, 3]);
        assert!(!graph.contains_node(&NodeKey::cell(CellId::new("b"))));
    }

    #[test]
    fn cursor_limits_the_history() {
        let data = document(vec![
            exec("a", 1, &["x"], &[]),
            exec("a", 2, &["x"], &[]),
            exec("b", 3, &[], &["x"]),
        ]);
        let (_, outcome) = render(&data, RenderRequest::new(Cursor::new(0, 0)));
        assert_eq!(outcome.displayed_executions, vec![1]);
    }

    #[test]
    fn edges_between_equal_counts_are_skipped() {
        let data = document(vec![exec("a", 1, &["x"], &[]), exec("a", 2, &["x"], &["x"])]);
        let (graph, _) = render(&data, RenderRequest::new(Cursor::new(0, 1)));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn deleted_cells_and_classes_are_marked() {
        let data = document(vec![
            exec("a", 1, &["raw"], &[]).with_data_vars(["raw"]),
            exec("b", 2, &[], &["raw"])
                .with_outputs(vec![serde_json::json!({"output_type": "stream"})])
                .with_kind(ExecutionKind::Error),
        ]);
        let live: HashSet<CellId> = [CellId::new("b")].into_iter().collect();
        let (graph, _) = GraphBuilder::new()
            .render(&data, RenderRequest::new(Cursor::new(0, 1)), &live, &CancelFlag::new())
            .unwrap();

        let snapshot = graph.snapshot();
        let classes = |id: NodeKey| snapshot.nodes.iter().find(|n| n.id == id).unwrap().classes.clone();
        assert_eq!(classes(NodeKey::cell(CellId::new("a"))), vec!["Deleted"]);
        assert_eq!(classes(NodeKey::execution(key("b", 2))), vec!["DataSourceOutputError"]);
        assert_eq!(snapshot.edges[0].classes, vec!["DataSource"]);
    }

    #[test]
    fn cell_labels_use_epoch_ordinal() {
        let data = document(vec![exec("first", 1, &["x"], &[]), exec("second", 2, &[], &["x"])]);
        let (graph, _) = render(&data, RenderRequest::new(Cursor::new(0, 1)));
        let snapshot = graph.snapshot();
        let label = |cell: &str| {
            snapshot
                .nodes
                .iter()
                .find(|n| n.id == NodeKey::cell(CellId::new(cell)))
                .unwrap()
                .label
                .clone()
        };
        assert_eq!(label("first"), "Cell: 1");
        assert_eq!(label("second"), "Cell: 2");
    }

    #[test]
    fn empty_document_renders_nothing() {
        let mut graph = ProvenanceGraph::new();
        let outcome = GraphBuilder::new()
            .render_into(
                &mut graph,
                &ProvenanceData::new(),
                RenderRequest::new(Cursor::new(3, 3)),
                &DetachedDocument,
                &CancelFlag::new(),
            )
            .unwrap();
        assert!(outcome.cursor.is_none());
        assert!(graph.is_empty());
    }

    #[test]
    fn cancelled_render_keeps_previous_graph() {
        let data = document(vec![exec("a", 1, &["x"], &[]), exec("b", 2, &[], &["x"])]);
        let (mut graph, _) = render(&data, RenderRequest::new(Cursor::new(0, 1)));
        let before = graph.node_count();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = GraphBuilder::new()
            .render_into(&mut graph, &data, RenderRequest::new(Cursor::new(0, 0)), &DetachedDocument, &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(graph.node_count(), before);
    }
}
