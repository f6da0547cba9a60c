//! Dependency Resolver and Graph Builder
//!
//! - [`resolve()`]: backward symbol resolution from seed executions
//! - [`ProvenanceGraph`]: compound graph of cell groups, executions and
//!   per-symbol edges
//! - [`GraphBuilder`]: cursor to rendered graph, with classification and layout
//! - [`context_commands`]: actions offered on graph elements
//!
//! Resolution works within a single epoch; executions of other epochs never
//! provide symbols.
//!
//! # Example
//!
//! ```rust,ignore
//! use prov_graph::{CancelFlag, DetachedDocument, GraphBuilder, RenderRequest};
//!
//! let cursor = Cursor::latest(&data).unwrap();
//! let (graph, outcome) = GraphBuilder::new().render(
//!     &data,
//!     RenderRequest::new(cursor),
//!     &DetachedDocument,
//!     &CancelFlag::new(),
//! )?;
//! println!("{}", serde_json::to_string(&graph.snapshot())?);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod builder;
mod commands;
mod error;
mod graph;
mod layout;
mod resolve;

pub use builder::{DetachedDocument, DocumentView, GraphBuilder, RenderMode, RenderOutcome, RenderRequest};
pub use commands::{context_commands, GraphCommand, GraphElement};
pub use error::{GraphError, ResolveError};
pub use graph::{
    EdgeClass, EdgeData, EdgeKey, EdgeView, ExecutionClass, GraphSnapshot, NodeData, NodeKey, NodeView, Point,
    ProvenanceGraph,
};
pub use layout::{LayeredLayout, LayoutEngine};
pub use resolve::{resolve, CancelFlag, Closure, EdgeKind, ResolvedEdge};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
