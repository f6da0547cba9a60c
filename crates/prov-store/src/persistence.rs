//! Persistence of the provenance document
//!
//! The document is read and written wholesale; there are no partial-field
//! updates.

use crate::error::StoreError;
use parking_lot::Mutex;
use prov_model::ProvenanceData;
use std::path::{Path, PathBuf};

/// Backend holding the persisted document
#[async_trait::async_trait]
pub trait ProvenancePersistence: Send + Sync {
    /// Read the stored document, if any
    async fn load(&self) -> Result<Option<ProvenanceData>, StoreError>;

    /// Replace the stored document
    async fn save(&self, data: &ProvenanceData) -> Result<(), StoreError>;
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    inner: Mutex<Option<ProvenanceData>>,
    saves: Mutex<u64>,
}

impl MemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document
    #[must_use]
    pub fn with_document(data: ProvenanceData) -> Self {
        Self {
            inner: Mutex::new(Some(data)),
            saves: Mutex::new(0),
        }
    }

    /// Last saved document
    #[must_use]
    pub fn document(&self) -> Option<ProvenanceData> {
        self.inner.lock().clone()
    }

    /// Number of saves performed
    #[must_use]
    pub fn save_count(&self) -> u64 {
        *self.saves.lock()
    }
}

#[async_trait::async_trait]
impl ProvenancePersistence for MemoryPersistence {
    async fn load(&self) -> Result<Option<ProvenanceData>, StoreError> {
        Ok(self.inner.lock().clone())
    }

    async fn save(&self, data: &ProvenanceData) -> Result<(), StoreError> {
        *self.inner.lock() = Some(data.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// How the document sits inside the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// The file is the provenance document itself
    Standalone,
    /// The file is a notebook; the document lives under `metadata.provenance`
    Notebook,
}

/// JSON file backend
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash never leaves a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
    format: DocumentFormat,
}

impl JsonFilePersistence {
    /// Standalone provenance document at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: DocumentFormat::Standalone,
        }
    }

    /// Provenance embedded in the notebook at `path`
    #[must_use]
    pub fn notebook(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: DocumentFormat::Notebook,
        }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_json(&self) -> Result<Option<serde_json::Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(&self.path, e)),
        }
    }

    async fn write_atomic(&self, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io_error(&self.path, e))
    }
}

#[async_trait::async_trait]
impl ProvenancePersistence for JsonFilePersistence {
    async fn load(&self) -> Result<Option<ProvenanceData>, StoreError> {
        let Some(value) = self.read_json().await? else {
            return Ok(None);
        };
        match self.format {
            DocumentFormat::Standalone => Ok(Some(serde_json::from_value(value)?)),
            DocumentFormat::Notebook => match value.pointer("/metadata/provenance") {
                Some(provenance) => Ok(Some(serde_json::from_value(provenance.clone())?)),
                None => Ok(None),
            },
        }
    }

    async fn save(&self, data: &ProvenanceData) -> Result<(), StoreError> {
        let document = match self.format {
            DocumentFormat::Standalone => serde_json::to_value(data)?,
            DocumentFormat::Notebook => {
                let mut notebook = self
                    .read_json()
                    .await?
                    .unwrap_or_else(|| serde_json::json!({ "cells": [], "metadata": {} }));
                let root = notebook
                    .as_object_mut()
                    .ok_or_else(|| StoreError::NotANotebook(self.path.clone()))?;
                let metadata = root
                    .entry("metadata")
                    .or_insert_with(|| serde_json::json!({}));
                let metadata = metadata
                    .as_object_mut()
                    .ok_or_else(|| StoreError::NotANotebook(self.path.clone()))?;
                metadata.insert("provenance".to_string(), serde_json::to_value(data)?);
                notebook
            }
        };
        self.write_atomic(serde_json::to_vec_pretty(&document)?).await
    }
}
