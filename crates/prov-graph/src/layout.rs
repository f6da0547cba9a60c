//! Graph layout
//!
//! Positions are written back into the [`ProvenanceGraph`]; drawing surfaces
//! read them from [`ProvenanceGraph::snapshot`].

use crate::graph::{NodeData, NodeKey, Point, ProvenanceGraph};
use petgraph::algo::toposort;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

/// Assigns positions to graph nodes
pub trait LayoutEngine: Send + Sync {
    fn layout(&self, graph: &mut ProvenanceGraph);
}

/// Longest-path layering, data flowing top to bottom
///
/// Executions without incoming edges sit on the first layer; every other
/// execution sits one layer below its deepest provider. Cell groups are
/// centred on their executions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayeredLayout {
    pub ideal_edge_length: f64,
}

impl LayeredLayout {
    #[must_use]
    pub fn new(ideal_edge_length: f64) -> Self {
        Self { ideal_edge_length }
    }
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self::new(150.0)
    }
}

impl LayoutEngine for LayeredLayout {
    fn layout(&self, graph: &mut ProvenanceGraph) {
        let inner = graph.inner();
        let Ok(order) = toposort(inner, None) else {
            tracing::warn!("Provenance graph has a cycle; skipping layout");
            return;
        };

        let mut layer_of = HashMap::new();
        for &index in &order {
            let layer = inner
                .neighbors_directed(index, Direction::Incoming)
                .filter_map(|pred| layer_of.get(&pred).map(|l: &usize| l + 1))
                .max()
                .unwrap_or(0);
            layer_of.insert(index, layer);
        }

        // Within a layer, order by position in the epoch
        let mut layers: BTreeMap<usize, Vec<(usize, NodeKey)>> = BTreeMap::new();
        for (&index, &layer) in &layer_of {
            if let Some(NodeData::Execution { key, position, .. }) = inner.node_weight(index) {
                layers
                    .entry(layer)
                    .or_default()
                    .push((*position, NodeKey::execution(key.clone())));
            }
        }

        let mut placed = Vec::new();
        let mut groups: BTreeMap<NodeKey, Vec<Point>> = BTreeMap::new();
        for (layer, mut members) in layers {
            members.sort();
            for (column, (_, key)) in members.into_iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let point = Point {
                    x: column as f64 * self.ideal_edge_length,
                    y: layer as f64 * self.ideal_edge_length,
                };
                if let NodeKey::Execution(execution) = &key {
                    groups
                        .entry(NodeKey::cell(execution.cell_id.clone()))
                        .or_default()
                        .push(point);
                }
                placed.push((key, point));
            }
        }

        for (key, point) in placed {
            graph.set_position(key, point);
        }
        for (group, points) in groups {
            #[allow(clippy::cast_precision_loss)]
            let count = points.len() as f64;
            let centre = Point {
                x: points.iter().map(|p| p.x).sum::<f64>() / count,
                y: points.iter().map(|p| p.y).sum::<f64>() / count,
            };
            graph.set_position(group, centre);
        }
    }
}
