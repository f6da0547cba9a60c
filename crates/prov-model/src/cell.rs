//! Execution records
//!
//! A [`CellData`] captures the facts about one run of one cell: its source,
//! outputs, outcome and the symbols it defines, reads and imports.

use crate::ids::{CellId, ExecutionKey};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Outcome of an execution
///
/// An erroring cell is recorded data, not a failure of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    #[default]
    Execution,
    Error,
}

/// Definition extracted by the symbol analyzer
///
/// Opaque to dependency resolution; carried through to export.
/// Compound statements nest their definitions in `body` / `orelse`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub lineno: u32,
    #[serde(default)]
    pub col_offset: u32,
    #[serde(default)]
    pub end_lineno: u32,
    #[serde(default)]
    pub end_col_offset: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<Definition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orelse: Vec<Definition>,
}

/// One completed or errored run of a cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    /// Durable cell identity
    pub cell_id: CellId,

    /// Source text at execution time, always a single string
    #[serde(deserialize_with = "deserialize_source")]
    pub cell_source: String,

    /// Raw output objects, opaque to the tracker
    #[serde(default)]
    pub cell_outputs: Vec<serde_json::Value>,

    /// Kernel-assigned execution count
    pub execution_count: u32,

    #[serde(default)]
    pub definitions: Vec<Definition>,

    /// Symbols this execution binds
    #[serde(default)]
    pub local: Vec<String>,

    /// Symbols this execution reads without binding
    #[serde(default)]
    pub remote: Vec<String>,

    /// Symbols brought in by import statements
    #[serde(default)]
    pub imports: Vec<String>,

    /// Description of each local symbol, in `local` order
    #[serde(default)]
    pub local_info: IndexMap<String, String>,

    /// Symbols loaded from external data sources
    #[serde(default)]
    pub data_vars: Vec<String>,

    /// Textual form of the external data sources (paths, URLs)
    #[serde(default)]
    pub data_values: Vec<String>,

    #[serde(with = "crate::timestamp")]
    pub time: DateTime<Utc>,

    #[serde(rename = "type", default)]
    pub kind: ExecutionKind,
}

impl CellData {
    /// Create a bare record for a cell execution
    #[must_use]
    pub fn new(cell_id: CellId, execution_count: u32) -> Self {
        Self {
            cell_id,
            cell_source: String::new(),
            cell_outputs: Vec::new(),
            execution_count,
            definitions: Vec::new(),
            local: Vec::new(),
            remote: Vec::new(),
            imports: Vec::new(),
            local_info: IndexMap::new(),
            data_vars: Vec::new(),
            data_values: Vec::new(),
            time: Utc::now(),
            kind: ExecutionKind::Execution,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.cell_source = source.into();
        self
    }

    #[must_use]
    pub fn with_local<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local = symbols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_remote<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remote = symbols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_imports<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports = symbols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_data_vars<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_vars = symbols.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_data_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_outputs(mut self, outputs: Vec<serde_json::Value>) -> Self {
        self.cell_outputs = outputs;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ExecutionKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> ExecutionKey {
        ExecutionKey::new(self.cell_id.clone(), self.execution_count)
    }

    /// Whether this execution binds `symbol`
    #[inline]
    #[must_use]
    pub fn defines(&self, symbol: &str) -> bool {
        self.local.iter().any(|s| s == symbol)
    }

    /// Whether this execution imports `symbol`
    #[inline]
    #[must_use]
    pub fn imports_symbol(&self, symbol: &str) -> bool {
        self.imports.iter().any(|s| s == symbol)
    }

    /// Declares at least one data-source variable
    #[inline]
    #[must_use]
    pub fn is_data_source(&self) -> bool {
        !self.data_vars.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn has_outputs(&self) -> bool {
        !self.cell_outputs.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == ExecutionKind::Error
    }
}

/// Accept a source as a single string or as a list of lines
///
/// Notebook formats store multi-line text either way; lines already carry
/// their trailing newlines, so they are concatenated as-is.
fn deserialize_source<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        Single(String),
        Lines(Vec<String>),
    }

    Ok(match Multiline::deserialize(deserializer)? {
        Multiline::Single(text) => text,
        Multiline::Lines(lines) => lines.concat(),
    })
}
