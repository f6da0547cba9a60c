//! Flattened export document
//!
//! Renames the stored fields into the published shape and collects every data
//! source used across the whole history.

use crate::error::ExportError;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use prov_model::{CellData, CellId, Definition, Epoch, Modules, ProvenanceData};
use serde::{Deserialize, Serialize};

/// Published form of a provenance document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Every data source value, in first-seen order
    pub used_data: Vec<String>,
    pub epochs: Vec<ExportEpoch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEpoch {
    #[serde(with = "prov_model::timestamp")]
    pub kernel_start_time: DateTime<Utc>,
    pub language: String,
    pub language_version: String,
    pub language_mimetype: String,
    pub kernel: String,
    pub kernel_version: String,
    pub user_agent: String,
    pub modules: Modules,
    pub execution_data: Vec<ExportExecution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportExecution {
    pub execution_count: u32,
    /// Data source values
    pub used_data: Vec<String>,
    pub data_vars: Vec<String>,
    /// Definition tree
    pub execution_info: Vec<Definition>,
    pub code: String,
    pub cell_id: CellId,
    /// Remote symbols
    pub dependencies: Vec<String>,
    pub imports: Vec<String>,
    pub outputs: Vec<serde_json::Value>,
    /// Local symbols
    pub definitions: Vec<String>,
    /// Local symbol descriptions
    pub definition_info: IndexMap<String, String>,
    #[serde(with = "prov_model::timestamp")]
    pub time: DateTime<Utc>,
}

impl From<&CellData> for ExportExecution {
    fn from(record: &CellData) -> Self {
        Self {
            execution_count: record.execution_count,
            used_data: record.data_values.clone(),
            data_vars: record.data_vars.clone(),
            execution_info: record.definitions.clone(),
            code: record.cell_source.clone(),
            cell_id: record.cell_id.clone(),
            dependencies: record.remote.clone(),
            imports: record.imports.clone(),
            outputs: record.cell_outputs.clone(),
            definitions: record.local.clone(),
            definition_info: record.local_info.clone(),
            time: record.time,
        }
    }
}

impl From<&Epoch> for ExportEpoch {
    fn from(epoch: &Epoch) -> Self {
        let environment = &epoch.environment;
        Self {
            kernel_start_time: environment.time,
            language: environment.language_info.name.clone(),
            language_version: environment.language_info.version.clone(),
            language_mimetype: environment.language_info.mimetype.clone(),
            kernel: environment.kernel.implementation.clone(),
            kernel_version: environment.kernel.version.clone(),
            user_agent: environment.user_agent.clone(),
            modules: epoch.modules.clone(),
            execution_data: epoch.data.iter().map(ExportExecution::from).collect(),
        }
    }
}

/// Structured export of the whole document
#[must_use]
pub fn to_export_document(data: &ProvenanceData) -> ExportDocument {
    let used_data: IndexSet<&String> = data
        .epochs
        .iter()
        .flat_map(|epoch| &epoch.data)
        .flat_map(|record| &record.data_values)
        .collect();

    ExportDocument {
        used_data: used_data.into_iter().cloned().collect(),
        epochs: data.epochs.iter().map(ExportEpoch::from).collect(),
    }
}

/// Export as compact JSON
///
/// # Errors
/// `ExportError::Json` if an output value cannot be encoded
pub fn export_provenance(data: &ProvenanceData) -> Result<String, ExportError> {
    let document = to_export_document(data);
    tracing::debug!(
        "Exporting {} epochs, {} data sources",
        document.epochs.len(),
        document.used_data.len()
    );
    Ok(serde_json::to_string(&document)?)
}

/// Export as indented JSON
///
/// # Errors
/// `ExportError::Json` if an output value cannot be encoded
pub fn export_provenance_pretty(data: &ProvenanceData) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&to_export_document(data))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prov_model::{Environment, KernelInfo, LanguageInfo};

    fn sample() -> ProvenanceData {
        let environment = Environment::capture(
            KernelInfo {
                implementation: "ipython".into(),
                version: "8.20".into(),
            },
            LanguageInfo {
                name: "python".into(),
                version: "3.11".into(),
                mimetype: "text/x-python".into(),
            },
            "provlab-test",
        );
        let load = CellData::new(CellId::new("a"), 1)
            .with_source("df = load('a.csv')")
            .with_local(["df"])
            .with_data_vars(["df"])
            .with_data_values(["a.csv"]);
        let mut epoch = Epoch::open(load, Modules::new(), environment);
        epoch.push(
            CellData::new(CellId::new("b"), 2)
                .with_source("m = fit(df)")
                .with_remote(["df"])
                .with_data_values(["a.csv", "b.csv"]),
            Modules::new(),
        );

        let mut data = ProvenanceData::new();
        data.epochs.push(epoch);
        data
    }

    #[test]
    fn used_data_is_first_seen_union() {
        let document = to_export_document(&sample());
        assert_eq!(document.used_data, vec!["a.csv".to_string(), "b.csv".to_string()]);
    }

    #[test]
    fn fields_are_renamed() {
        let json: serde_json::Value = serde_json::from_str(&export_provenance(&sample()).unwrap()).unwrap();
        let epoch = &json["epochs"][0];
        assert_eq!(epoch["kernel"], "ipython");
        assert_eq!(epoch["language_mimetype"], "text/x-python");

        let second = &epoch["execution_data"][1];
        assert_eq!(second["code"], "m = fit(df)");
        assert_eq!(second["dependencies"], serde_json::json!(["df"]));
        assert_eq!(second["cell_id"], "b");
        assert_eq!(second["execution_count"], 2);
    }

    #[test]
    fn export_parses_back() {
        let text = export_provenance_pretty(&sample()).unwrap();
        let document: ExportDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(document, to_export_document(&sample()));
    }
}
