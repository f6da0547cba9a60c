//! Lifecycle events delivered by the kernel connection and the host

use crate::analysis::AnalysisResult;
use prov_model::{CellHandle, ExecutionKind, KernelInfo, LanguageInfo};
use prov_store::AppendReceipt;
use serde::{Deserialize, Serialize};

use crate::error::RecorderError;

/// Status field of an execute reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
    Aborted,
}

impl ReplyStatus {
    /// Record kind for a completed execution, `None` for aborted requests
    #[must_use]
    pub fn execution_kind(self) -> Option<ExecutionKind> {
        match self {
            Self::Ok => Some(ExecutionKind::Execution),
            Self::Error => Some(ExecutionKind::Error),
            Self::Aborted => None,
        }
    }
}

/// Everything the recorder reacts to
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Cell text changed; triggers analysis
    CellSourceChanged { handle: CellHandle, source: String },
    /// Analysis computed elsewhere for the cell's current source
    AnalysisAvailable {
        handle: CellHandle,
        result: AnalysisResult,
    },
    /// Analysis of the cell's current source failed
    AnalysisFailed { handle: CellHandle, reason: String },
    /// Kernel info reply
    KernelInfo {
        kernel: KernelInfo,
        language: LanguageInfo,
    },
    /// Kernel restarted; the next first execution opens an epoch
    KernelRestarted,
    /// Execute request sent for a cell
    ExecuteRequestSent { msg_id: String, handle: CellHandle },
    /// Execute reply received for an earlier request
    ExecuteReplyReceived {
        msg_id: String,
        status: ReplyStatus,
        execution_count: u32,
    },
}

impl LifecycleEvent {
    /// Short name for log lines
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CellSourceChanged { .. } => "cell_source_changed",
            Self::AnalysisAvailable { .. } => "analysis_available",
            Self::AnalysisFailed { .. } => "analysis_failed",
            Self::KernelInfo { .. } => "kernel_info",
            Self::KernelRestarted => "kernel_restarted",
            Self::ExecuteRequestSent { .. } => "execute_request",
            Self::ExecuteReplyReceived { .. } => "execute_reply",
        }
    }
}

/// What handling an event produced
#[derive(Debug)]
pub enum RecordOutcome {
    /// Event updated recorder state only
    Observed,
    /// A record was appended to the store
    Appended(AppendReceipt),
    /// An execution reply was dropped
    Dropped(RecorderError),
}

impl RecordOutcome {
    #[inline]
    #[must_use]
    pub fn receipt(&self) -> Option<&AppendReceipt> {
        match self {
            Self::Appended(receipt) => Some(receipt),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}
