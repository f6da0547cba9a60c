//! Per-epoch summary: environment, import usage and data sources

use crate::error::ExportError;
use indexmap::IndexMap;
use prov_model::{CellData, Environment, Epoch, ImportEntry, ProvenanceData};
use serde::{Deserialize, Serialize};

/// How often an imported name was used within an epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportUsage {
    pub module: String,
    /// Name the import is bound to in the notebook
    pub name: String,
    pub alias: Option<String>,
    /// Empty when unknown
    pub version: String,
    pub uses: usize,
}

impl ImportUsage {
    #[inline]
    #[must_use]
    pub fn is_unused(&self) -> bool {
        self.uses == 0
    }
}

/// A data source value read by an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceUse {
    pub execution_count: u32,
    pub variable: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub environment: Environment,
    pub imports: Vec<ImportUsage>,
    pub data_sources: Vec<DataSourceUse>,
}

/// Summary of one epoch
///
/// # Errors
/// `ExportError::Model` when `epoch` does not exist
pub fn epoch_report(data: &ProvenanceData, epoch: usize) -> Result<EpochReport, ExportError> {
    let selected = data.try_epoch(epoch)?;
    Ok(EpochReport {
        epoch,
        environment: selected.environment.clone(),
        imports: import_usage(selected),
        data_sources: data_sources(selected),
    })
}

/// Uses of every imported name, in module order
///
/// A name imported by an execution starts with the number of times it
/// appears in that execution's definition tree; each later binding or
/// reference adds one.
#[must_use]
pub fn import_usage(epoch: &Epoch) -> Vec<ImportUsage> {
    let counts = usage_counts(&epoch.data);
    let count = |name: &str| counts.get(name).copied().unwrap_or(0);

    let mut usages = Vec::new();
    for (module, info) in &epoch.modules {
        let usage = |name: String, alias: Option<String>| ImportUsage {
            module: module.clone(),
            uses: count(&name),
            name,
            alias,
            version: info.version.clone(),
        };
        match (&info.alias, &info.imports) {
            (_, Some(entries)) => usages.extend(entries.iter().map(|entry| match entry {
                ImportEntry::Name(name) => usage(name.clone(), None),
                ImportEntry::Aliased { alias, .. } => usage(alias.clone(), Some(alias.clone())),
            })),
            (Some(alias), None) => usages.push(usage(alias.clone(), Some(alias.clone()))),
            (None, None) => usages.push(usage(module.clone(), None)),
        }
    }
    usages
}

fn usage_counts(executions: &[CellData]) -> IndexMap<String, usize> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for record in executions {
        if !record.imports.is_empty() {
            let tree = serde_json::to_string(&record.definitions).unwrap_or_default();
            for name in &record.imports {
                counts
                    .entry(name.clone())
                    .or_insert_with(|| tree.matches(&format!("\"{name}\"")).count());
            }
        }
        for symbol in record.local.iter().chain(&record.remote) {
            if let Some(uses) = counts.get_mut(symbol) {
                *uses += 1;
            }
        }
    }
    counts
}

/// Data source values in execution order
#[must_use]
pub fn data_sources(epoch: &Epoch) -> Vec<DataSourceUse> {
    epoch
        .data
        .iter()
        .flat_map(|record| {
            record
                .data_values
                .iter()
                .enumerate()
                .map(move |(index, value)| DataSourceUse {
                    execution_count: record.execution_count,
                    variable: record.data_vars.get(index).cloned(),
                    source: value.clone(),
                })
        })
        .collect()
}
