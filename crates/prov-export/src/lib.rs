//! Export, version history and execution info
//!
//! Read-only projections of a [`prov_model::ProvenanceData`] document:
//!
//! - [`export_provenance`]: flattened JSON with renamed fields
//! - [`version_history`] / [`compare_versions`]: distinct source versions of a
//!   cell and their line diffs
//! - [`execution_info`]: recorded symbol descriptions and outputs
//! - [`epoch_report`]: environment, import usage and data sources of an epoch

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod diff;
mod error;
mod export;
mod history;
mod info;
mod report;

pub use diff::{line_diff, render_ndiff, DiffLine, DiffTag};
pub use error::ExportError;
pub use export::{
    export_provenance, export_provenance_pretty, to_export_document, ExportDocument, ExportEpoch, ExportExecution,
};
pub use history::{compare_versions, version_history, SourceVersion, VersionDiff};
pub use info::{execution_info, ExecutionInfo};
pub use report::{data_sources, epoch_report, import_usage, DataSourceUse, EpochReport, ImportUsage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
