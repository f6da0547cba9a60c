//! Provenance data model
//!
//! The persisted shape of a notebook's execution history.
//!
//! # Core Concepts
//!
//! - [`ProvenanceData`]: document root, an ordered list of [`Epoch`]s
//! - [`Epoch`]: one kernel lifetime with its environment and executions
//! - [`CellData`]: one completed (or errored) run of a cell
//! - [`CellId`] vs [`CellHandle`]: durable identity vs transient host handle
//! - [`Cursor`]: clamped (epoch, cell) view position
//!
//! # Example
//!
//! ```rust,ignore
//! use prov_model::{ProvenanceData, Cursor};
//!
//! let data: ProvenanceData = serde_json::from_str(&json)?;
//! let cursor = Cursor::latest(&data).unwrap();
//! let epoch = data.epoch(cursor.epoch).unwrap();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cell;
mod cursor;
mod epoch;
mod error;
mod ids;
pub mod timestamp;

pub use cell::{CellData, Definition, ExecutionKind};
pub use cursor::Cursor;
pub use epoch::{Environment, Epoch, ImportEntry, KernelInfo, LanguageInfo, ModuleInfo, Modules, ProvenanceData};
pub use error::ModelError;
pub use ids::{CellHandle, CellId, ExecutionKey};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
