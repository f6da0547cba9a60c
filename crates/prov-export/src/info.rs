//! Symbol descriptions and outputs of one execution

use crate::error::ExportError;
use indexmap::IndexMap;
use prov_model::{CellId, ProvenanceData};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub cell_id: CellId,
    pub epoch: usize,
    pub execution_count: u32,
    /// Symbol name to recorded description
    pub symbols: IndexMap<String, String>,
    pub outputs: Vec<serde_json::Value>,
}

/// Descriptions of all local symbols, or only `variable`
///
/// # Errors
/// - `ExportError::Model` when the execution does not exist
/// - `ExportError::UnknownVariable` when `variable` has no description
pub fn execution_info(
    data: &ProvenanceData,
    epoch: usize,
    execution_count: u32,
    variable: Option<&str>,
) -> Result<ExecutionInfo, ExportError> {
    let record = data.find_execution(epoch, execution_count)?;

    let symbols = match variable {
        Some(name) => {
            let description = record
                .local_info
                .get(name)
                .ok_or_else(|| ExportError::UnknownVariable {
                    variable: name.to_string(),
                    execution_count,
                })?;
            IndexMap::from([(name.to_string(), description.clone())])
        }
        None => record.local_info.clone(),
    };

    Ok(ExecutionInfo {
        cell_id: record.cell_id.clone(),
        epoch,
        execution_count,
        symbols,
        outputs: record.cell_outputs.clone(),
    })
}
