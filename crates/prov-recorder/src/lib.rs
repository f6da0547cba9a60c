//! Execution Recorder
//!
//! Observes kernel and notebook lifecycle events and produces one provenance
//! record per completed execution.
//!
//! - [`ExecutionRecorder`]: event handling, sequencing and record construction
//! - [`AnalysisCache`]: latest symbol analysis per live cell
//! - [`InspectionFormatter`]: concurrent symbol inspection and reply cleanup
//! - [`SymbolAnalyzer`], [`SymbolInspector`], [`NotebookHost`]: external
//!   collaborators
//!
//! # Example
//!
//! ```rust,ignore
//! let recorder = Arc::new(ExecutionRecorder::new(store, analyzer, inspector, host, settings)?);
//!
//! recorder.submit(LifecycleEvent::ExecuteRequestSent { msg_id, handle });
//! // ...
//! let outcome = recorder.handle(LifecycleEvent::ExecuteReplyReceived {
//!     msg_id,
//!     status: ReplyStatus::Ok,
//!     execution_count: 1,
//! }).await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod analysis;
mod error;
mod events;
mod inspect;
mod recorder;
mod services;

pub use analysis::{AnalysisCache, AnalysisResult};
pub use error::{AnalysisError, HostError, InspectionError, RecorderError};
pub use events::{LifecycleEvent, RecordOutcome, ReplyStatus};
pub use inspect::InspectionFormatter;
pub use recorder::{ExecutionRecorder, RecorderSettings};
pub use services::{CellType, LiveCell, NotebookHost, SymbolAnalyzer, SymbolInspector};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
