//! Provenance graph
//!
//! Cell groups contain execution nodes; edges run from the execution that
//! provided a symbol to the one that read it, one edge per symbol. All adds
//! are idempotent on typed keys.

use crate::error::GraphError;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use prov_model::{CellId, ExecutionKey};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Identity of a graph node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKey {
    Cell { cell_id: CellId },
    Execution(ExecutionKey),
}

impl NodeKey {
    #[inline]
    #[must_use]
    pub fn cell(cell_id: CellId) -> Self {
        Self::Cell { cell_id }
    }

    #[inline]
    #[must_use]
    pub fn execution(key: ExecutionKey) -> Self {
        Self::Execution(key)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cell { cell_id } => write!(f, "{cell_id}"),
            Self::Execution(key) => write!(f, "{key}"),
        }
    }
}

/// Identity of a graph edge: one symbol between two executions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    pub target: ExecutionKey,
    pub source: ExecutionKey,
    pub symbol: String,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<-{}:{}", self.target, self.source, self.symbol)
    }
}

/// Execution node classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ExecutionClass {
    pub data_source: bool,
    pub output: bool,
    pub error: bool,
}

impl ExecutionClass {
    /// Style name combining the set flags, `None` when no flag is set
    #[must_use]
    pub fn class_name(self) -> Option<&'static str> {
        match (self.data_source, self.output, self.error) {
            (false, false, false) => None,
            (true, false, false) => Some("DataSource"),
            (false, true, false) => Some("Output"),
            (false, false, true) => Some("Error"),
            (true, true, false) => Some("DataSourceOutput"),
            (true, false, true) => Some("DataSourceError"),
            (false, true, true) => Some("OutputError"),
            (true, true, true) => Some("DataSourceOutputError"),
        }
    }
}

/// Edge classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct EdgeClass {
    pub data_source: bool,
    pub import: bool,
}

impl EdgeClass {
    #[must_use]
    pub fn class_names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.data_source {
            names.push("DataSource");
        }
        if self.import {
            names.push("Import");
        }
        names
    }
}

/// Node payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "group", rename_all = "snake_case")]
pub enum NodeData {
    CellGroup {
        cell_id: CellId,
        label: String,
        /// Cell no longer exists in the live document
        deleted: bool,
    },
    Execution {
        key: ExecutionKey,
        epoch: usize,
        /// Position within the epoch's executions
        position: usize,
        class: ExecutionClass,
    },
}

/// Edge payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeData {
    pub key: EdgeKey,
    pub epoch: usize,
    pub class: EdgeClass,
}

/// 2D position assigned by a layout engine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Serializable node for a drawing surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeKey,
    pub parent: Option<NodeKey>,
    pub label: String,
    pub classes: Vec<&'static str>,
    pub position: Option<Point>,
    pub data: NodeData,
}

/// Serializable edge for a drawing surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeView {
    pub id: EdgeKey,
    pub source: NodeKey,
    pub target: NodeKey,
    pub label: String,
    pub classes: Vec<&'static str>,
    pub epoch: usize,
    /// Execution count of the providing execution
    pub execution_count: u32,
}

/// Full element list of a graph
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

/// Compound dependency graph
#[derive(Debug, Default, Clone)]
pub struct ProvenanceGraph {
    inner: StableDiGraph<NodeData, EdgeData>,
    nodes: HashMap<NodeKey, NodeIndex>,
    edges: HashMap<EdgeKey, EdgeIndex>,
    positions: HashMap<NodeKey, Point>,
}

impl ProvenanceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every element
    pub fn clear(&mut self) {
        self.inner.clear();
        self.nodes.clear();
        self.edges.clear();
        self.positions.clear();
    }

    /// Add a cell group; returns false if it already exists
    pub fn add_cell_group(&mut self, cell_id: CellId, label: impl Into<String>, deleted: bool) -> bool {
        let key = NodeKey::cell(cell_id.clone());
        if self.nodes.contains_key(&key) {
            return false;
        }
        let index = self.inner.add_node(NodeData::CellGroup {
            cell_id,
            label: label.into(),
            deleted,
        });
        self.nodes.insert(key, index);
        true
    }

    /// Add an execution inside its cell group; returns false if it already exists
    ///
    /// # Errors
    /// `GraphError::MissingCellGroup` if the cell group was not added first
    pub fn add_execution(
        &mut self,
        key: ExecutionKey,
        epoch: usize,
        position: usize,
        class: ExecutionClass,
    ) -> Result<bool, GraphError> {
        let node = NodeKey::execution(key.clone());
        if self.nodes.contains_key(&node) {
            return Ok(false);
        }
        if !self.nodes.contains_key(&NodeKey::cell(key.cell_id.clone())) {
            return Err(GraphError::MissingCellGroup(key.cell_id.to_string()));
        }
        let index = self.inner.add_node(NodeData::Execution {
            key,
            epoch,
            position,
            class,
        });
        self.nodes.insert(node, index);
        Ok(true)
    }

    /// Add an edge; returns false if it already exists
    ///
    /// # Errors
    /// `GraphError::MissingExecution` if either endpoint is absent
    pub fn add_edge(&mut self, key: EdgeKey, epoch: usize, class: EdgeClass) -> Result<bool, GraphError> {
        if self.edges.contains_key(&key) {
            return Ok(false);
        }
        let source = self.execution_index(&key.source)?;
        let target = self.execution_index(&key.target)?;
        let index = self.inner.add_edge(
            source,
            target,
            EdgeData {
                key: key.clone(),
                epoch,
                class,
            },
        );
        self.edges.insert(key, index);
        Ok(true)
    }

    fn execution_index(&self, key: &ExecutionKey) -> Result<NodeIndex, GraphError> {
        self.nodes
            .get(&NodeKey::execution(key.clone()))
            .copied()
            .ok_or_else(|| GraphError::MissingExecution(key.to_string()))
    }

    #[inline]
    #[must_use]
    pub fn contains_node(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    #[inline]
    #[must_use]
    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    #[must_use]
    pub fn node(&self, key: &NodeKey) -> Option<&NodeData> {
        self.nodes.get(key).and_then(|&index| self.inner.node_weight(index))
    }

    #[must_use]
    pub fn edge(&self, key: &EdgeKey) -> Option<&EdgeData> {
        self.edges.get(key).and_then(|&index| self.inner.edge_weight(index))
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    /// Execution nodes with their data
    pub fn executions(&self) -> impl Iterator<Item = (&ExecutionKey, &NodeData)> + '_ {
        self.inner.node_indices().filter_map(|index| match self.inner.node_weight(index)? {
            data @ NodeData::Execution { key, .. } => Some((key, data)),
            NodeData::CellGroup { .. } => None,
        })
    }

    /// Sorted, de-duplicated execution counts of the execution nodes
    #[must_use]
    pub fn displayed_executions(&self) -> Vec<u32> {
        self.executions()
            .map(|(key, _)| key.execution_count)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Execution key providing symbols to `key`, per incoming edge
    #[must_use]
    pub fn sources_of(&self, key: &ExecutionKey) -> Vec<&EdgeKey> {
        let Ok(index) = self.execution_index(key) else {
            return Vec::new();
        };
        let mut sources: Vec<&EdgeKey> = self
            .inner
            .edges_directed(index, petgraph::Direction::Incoming)
            .map(|edge| &edge.weight().key)
            .collect();
        sources.sort();
        sources
    }

    pub fn set_position(&mut self, key: NodeKey, point: Point) {
        if self.nodes.contains_key(&key) {
            self.positions.insert(key, point);
        }
    }

    #[must_use]
    pub fn position(&self, key: &NodeKey) -> Option<Point> {
        self.positions.get(key).copied()
    }

    /// Underlying petgraph graph, for layout engines
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &StableDiGraph<NodeData, EdgeData> {
        &self.inner
    }

    /// Element list in deterministic key order
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut node_keys: Vec<&NodeKey> = self.nodes.keys().collect();
        node_keys.sort();
        let nodes = node_keys
            .into_iter()
            .filter_map(|key| {
                let data = self.node(key)?;
                let (parent, label, classes) = match data {
                    NodeData::CellGroup { label, deleted, .. } => {
                        let classes = if *deleted { vec!["Deleted"] } else { Vec::new() };
                        (None, label.clone(), classes)
                    }
                    NodeData::Execution { key, class, .. } => (
                        Some(NodeKey::cell(key.cell_id.clone())),
                        key.execution_count.to_string(),
                        class.class_name().into_iter().collect(),
                    ),
                };
                Some(NodeView {
                    id: key.clone(),
                    parent,
                    label,
                    classes,
                    position: self.position(key),
                    data: data.clone(),
                })
            })
            .collect();

        let mut edge_keys: Vec<&EdgeKey> = self.edges.keys().collect();
        edge_keys.sort();
        let edges = edge_keys
            .into_iter()
            .filter_map(|key| {
                let data = self.edge(key)?;
                Some(EdgeView {
                    id: key.clone(),
                    source: NodeKey::execution(key.source.clone()),
                    target: NodeKey::execution(key.target.clone()),
                    label: key.symbol.clone(),
                    classes: data.class.class_names(),
                    epoch: data.epoch,
                    execution_count: key.source.execution_count,
                })
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(cell: &str, count: u32) -> ExecutionKey {
        ExecutionKey::new(CellId::new(cell), count)
    }

    fn two_executions() -> ProvenanceGraph {
        let mut graph = ProvenanceGraph::new();
        graph.add_cell_group(CellId::new("a"), "Cell: 1", false);
        graph.add_cell_group(CellId::new("b"), "Cell: 2", false);
        graph.add_execution(key("a", 1), 0, 0, ExecutionClass::default()).unwrap();
        graph.add_execution(key("b", 2), 0, 1, ExecutionClass::default()).unwrap();
        graph
    }

    #[test]
    fn adds_are_idempotent() {
        let mut graph = two_executions();
        assert!(!graph.add_cell_group(CellId::new("a"), "Cell: 1", false));
        assert!(!graph.add_execution(key("a", 1), 0, 0, ExecutionClass::default()).unwrap());

        let edge = EdgeKey {
            target: key("b", 2),
            source: key("a", 1),
            symbol: "x".into(),
        };
        assert!(graph.add_edge(edge.clone(), 0, EdgeClass::default()).unwrap());
        assert!(!graph.add_edge(edge, 0, EdgeClass::default()).unwrap());
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn execution_requires_cell_group() {
        let mut graph = ProvenanceGraph::new();
        let err = graph
            .add_execution(key("ghost", 1), 0, 0, ExecutionClass::default())
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingCellGroup(_)));
    }

    #[test]
    fn edge_requires_both_endpoints() {
        let mut graph = two_executions();
        let edge = EdgeKey {
            target: key("b", 2),
            source: key("c", 9),
            symbol: "x".into(),
        };
        assert!(graph.add_edge(edge, 0, EdgeClass::default()).is_err());
    }

    #[test]
    fn class_names_combine_in_fixed_order() {
        let all = ExecutionClass {
            data_source: true,
            output: true,
            error: true,
        };
        assert_eq!(all.class_name(), Some("DataSourceOutputError"));
        let output_error = ExecutionClass {
            output: true,
            error: true,
            ..ExecutionClass::default()
        };
        assert_eq!(output_error.class_name(), Some("OutputError"));
        assert_eq!(ExecutionClass::default().class_name(), None);
    }

    #[test]
    fn displayed_executions_sorted_unique() {
        let mut graph = two_executions();
        graph.add_cell_group(CellId::new("c"), "Cell: 3", true);
        graph.add_execution(key("c", 2), 0, 2, ExecutionClass::default()).unwrap();
        assert_eq!(graph.displayed_executions(), vec![1, 2]);
    }

    #[test]
    fn snapshot_marks_deleted_groups_and_parents() {
        let mut graph = ProvenanceGraph::new();
        graph.add_cell_group(CellId::new("gone"), "Cell: 1", true);
        graph.add_execution(key("gone", 4), 0, 0, ExecutionClass::default()).unwrap();

        let snapshot = graph.snapshot();
        let group = snapshot.nodes.iter().find(|n| n.parent.is_none()).unwrap();
        assert_eq!(group.classes, vec!["Deleted"]);
        let execution = snapshot.nodes.iter().find(|n| n.parent.is_some()).unwrap();
        assert_eq!(execution.label, "4");
        assert_eq!(execution.parent, Some(NodeKey::cell(CellId::new("gone"))));
    }

    #[test]
    fn clear_empties_everything() {
        let mut graph = two_executions();
        graph.set_position(NodeKey::execution(key("a", 1)), Point { x: 1.0, y: 2.0 });
        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.position(&NodeKey::execution(key("a", 1))).is_none());
    }
}
