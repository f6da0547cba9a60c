//! Provenance Store
//!
//! Append-only record of executions organized into epochs (kernel lifetimes).
//!
//! - [`ProvenanceStore`]: epoch creation, append, module merge, change feed
//! - [`SequenceGate`]: send-order tokens so appends land in request order
//!   regardless of the order completions arrive in
//! - [`ProvenancePersistence`]: wholesale load/save of the document
//!
//! # Example
//!
//! ```rust,ignore
//! use prov_store::{EpochHint, MemoryPersistence, ProvenanceStore, SequenceGate};
//!
//! let store = ProvenanceStore::open(Arc::new(MemoryPersistence::new())).await?;
//! let gate = SequenceGate::new();
//!
//! let token = gate.issue();
//! // ... later, when the execution completes:
//! let _turn = gate.wait_turn(token, None).await?;
//! let receipt = store.append(record, modules, EpochHint::Continue, environment).await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod gate;
mod persistence;
mod store;

pub use error::StoreError;
pub use gate::{SequenceGate, SequenceToken, Turn};
pub use persistence::{DocumentFormat, JsonFilePersistence, MemoryPersistence, ProvenancePersistence};
pub use store::{AppendReceipt, EpochHint, KernelStart, ProvenanceStore, StoreStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
