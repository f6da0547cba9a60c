//! Context commands offered on graph elements

use crate::graph::{EdgeKey, NodeData, NodeKey, ProvenanceGraph};
use prov_model::CellId;
use serde::{Deserialize, Serialize};

/// Action requested from the graph surface
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GraphCommand {
    /// Show earlier source versions of an execution's cell
    OpenDiff {
        cell_id: CellId,
        execution_count: u32,
        epoch: usize,
    },
    /// Show symbol descriptions and outputs of an execution
    OpenInfo {
        cell_id: CellId,
        execution_count: u32,
        epoch: usize,
        variable: Option<String>,
    },
    /// Select the cell in the live document
    FocusCell { cell_id: CellId },
}

/// Element a context menu was opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphElement<'a> {
    Node(&'a NodeKey),
    Edge(&'a EdgeKey),
}

/// Commands available on `element`
///
/// - execution node: diff and info
/// - cell group that still exists: focus
/// - data edge: info about the symbol at its providing execution
/// - import edges, deleted groups and unknown elements: nothing
#[must_use]
pub fn context_commands(graph: &ProvenanceGraph, element: GraphElement<'_>) -> Vec<GraphCommand> {
    match element {
        GraphElement::Node(key) => match graph.node(key) {
            Some(NodeData::Execution { key, epoch, .. }) => vec![
                GraphCommand::OpenDiff {
                    cell_id: key.cell_id.clone(),
                    execution_count: key.execution_count,
                    epoch: *epoch,
                },
                GraphCommand::OpenInfo {
                    cell_id: key.cell_id.clone(),
                    execution_count: key.execution_count,
                    epoch: *epoch,
                    variable: None,
                },
            ],
            Some(NodeData::CellGroup {
                cell_id,
                deleted: false,
                ..
            }) => vec![GraphCommand::FocusCell {
                cell_id: cell_id.clone(),
            }],
            Some(NodeData::CellGroup { deleted: true, .. }) | None => Vec::new(),
        },
        GraphElement::Edge(key) => match graph.edge(key) {
            Some(edge) if !edge.class.import => vec![GraphCommand::OpenInfo {
                cell_id: key.source.cell_id.clone(),
                execution_count: key.source.execution_count,
                epoch: edge.epoch,
                variable: Some(key.symbol.clone()),
            }],
            Some(_) | None => Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeClass, ExecutionClass};
    use prov_model::ExecutionKey;

    fn key(cell: &str, count: u32) -> ExecutionKey {
        ExecutionKey::new(CellId::new(cell), count)
    }

    fn graph() -> ProvenanceGraph {
        let mut graph = ProvenanceGraph::new();
        graph.add_cell_group(CellId::new("a"), "Cell: 1", false);
        graph.add_cell_group(CellId::new("b"), "Cell: 2", true);
        graph.add_execution(key("a", 1), 2, 0, ExecutionClass::default()).unwrap();
        graph.add_execution(key("b", 2), 2, 1, ExecutionClass::default()).unwrap();
        graph
    }

    fn edge(symbol: &str) -> EdgeKey {
        EdgeKey {
            target: key("b", 2),
            source: key("a", 1),
            symbol: symbol.into(),
        }
    }

    #[test]
    fn execution_offers_diff_and_info() {
        let graph = graph();
        let commands = context_commands(&graph, GraphElement::Node(&NodeKey::execution(key("a", 1))));
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], GraphCommand::OpenDiff { epoch: 2, execution_count: 1, .. }));
        assert!(matches!(commands[1], GraphCommand::OpenInfo { variable: None, .. }));
    }

    #[test]
    fn only_live_cell_groups_can_be_focused() {
        let graph = graph();
        assert_eq!(
            context_commands(&graph, GraphElement::Node(&NodeKey::cell(CellId::new("a")))),
            vec![GraphCommand::FocusCell { cell_id: CellId::new("a") }]
        );
        assert!(context_commands(&graph, GraphElement::Node(&NodeKey::cell(CellId::new("b")))).is_empty());
    }

    #[test]
    fn data_edge_opens_info_on_source() {
        let mut graph = graph();
        graph.add_edge(edge("df"), 2, EdgeClass::default()).unwrap();
        let import = EdgeClass {
            import: true,
            ..EdgeClass::default()
        };
        graph.add_edge(edge("pd"), 2, import).unwrap();

        assert_eq!(
            context_commands(&graph, GraphElement::Edge(&edge("df"))),
            vec![GraphCommand::OpenInfo {
                cell_id: CellId::new("a"),
                execution_count: 1,
                epoch: 2,
                variable: Some("df".into()),
            }]
        );
        assert!(context_commands(&graph, GraphElement::Edge(&edge("pd"))).is_empty());
    }

    #[test]
    fn commands_serialize_tagged() {
        let json = serde_json::to_value(GraphCommand::FocusCell { cell_id: CellId::new("a") }).unwrap();
        assert_eq!(json, serde_json::json!({"command": "focus_cell", "cell_id": "a"}));
    }
}
