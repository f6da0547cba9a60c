//! Cell and execution identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Durable cell identity
///
/// Assigned once, persisted in the cell's metadata and carried across moves
/// and edits. Every execution record of the same cell shares it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub String);

impl CellId {
    /// Create from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CellId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Transient handle of a live cell in the host document
///
/// Only valid for the lifetime of the document session; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellHandle(pub String);

impl CellHandle {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CellHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of one execution: durable cell plus execution count
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionKey {
    pub cell_id: CellId,
    pub execution_count: u32,
}

impl ExecutionKey {
    #[inline]
    #[must_use]
    pub fn new(cell_id: CellId, execution_count: u32) -> Self {
        Self {
            cell_id,
            execution_count,
        }
    }
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.cell_id, self.execution_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_id_is_transparent_in_json() {
        let id = CellId::new("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
    }

    #[test]
    fn execution_key_display() {
        let key = ExecutionKey::new(CellId::new("c1"), 7);
        assert_eq!(key.to_string(), "c1#7");
    }

    #[test]
    fn execution_keys_differ_where_concatenation_would_collide() {
        // "c1" + 12 and "c11" + 2 would both flatten to "c112"
        let a = ExecutionKey::new(CellId::new("c1"), 12);
        let b = ExecutionKey::new(CellId::new("c11"), 2);
        assert_ne!(a, b);
    }
}
