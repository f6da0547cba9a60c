//! Symbol analysis results and their per-cell cache
//!
//! Every source change bumps the cell's revision before analysis starts, so
//! an execution waits for the analysis of the source it actually ran rather
//! than picking up a result for an older edit.

use dashmap::DashMap;
use moka::future::Cache;
use prov_model::{CellHandle, Definition, Modules};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Output of the symbol-analysis service for one source text
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub local: Vec<String>,
    #[serde(default)]
    pub remote: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub modules: Modules,
    #[serde(default)]
    pub data_vars: Vec<String>,
    #[serde(default)]
    pub data_values: Vec<String>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

impl AnalysisResult {
    /// Result with only local and remote symbols
    #[must_use]
    pub fn symbols<L, R>(local: L, remote: R) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            local: local.into_iter().map(Into::into).collect(),
            remote: remote.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct CachedAnalysis {
    revision: u64,
    /// `None` when analysis of this revision failed
    result: Option<Arc<AnalysisResult>>,
}

/// Latest analysis per live cell
#[derive(Debug, Clone)]
pub struct AnalysisCache {
    entries: Cache<CellHandle, CachedAnalysis>,
    revisions: Arc<DashMap<CellHandle, u64>>,
    write: Arc<Mutex<()>>,
    updated: Arc<Notify>,
}

impl AnalysisCache {
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::new(max_capacity),
            revisions: Arc::new(DashMap::new()),
            write: Arc::new(Mutex::new(())),
            updated: Arc::new(Notify::new()),
        }
    }

    /// Record a source change; returns the new revision
    pub fn begin(&self, handle: &CellHandle) -> u64 {
        let mut revision = self.revisions.entry(handle.clone()).or_insert(0);
        *revision += 1;
        *revision
    }

    /// Latest announced revision, 0 if the cell was never analyzed
    #[must_use]
    pub fn revision(&self, handle: &CellHandle) -> u64 {
        self.revisions.get(handle).map_or(0, |r| *r)
    }

    /// Latest revision, announcing a first one if needed
    pub fn current_or_begin(&self, handle: &CellHandle) -> u64 {
        match self.revision(handle) {
            0 => self.begin(handle),
            revision => revision,
        }
    }

    /// Cache a successful analysis
    pub async fn store(&self, handle: CellHandle, revision: u64, result: AnalysisResult) {
        self.put(
            handle,
            CachedAnalysis {
                revision,
                result: Some(Arc::new(result)),
            },
        )
        .await;
    }

    /// Invalidate the cell's analysis for `revision`
    pub async fn fail(&self, handle: CellHandle, revision: u64) {
        self.put(handle, CachedAnalysis { revision, result: None }).await;
    }

    async fn put(&self, handle: CellHandle, entry: CachedAnalysis) {
        let _guard = self.write.lock().await;
        if let Some(existing) = self.entries.get(&handle).await {
            if existing.revision > entry.revision {
                tracing::debug!(
                    "Discarding analysis revision {} for cell {}; revision {} already cached",
                    entry.revision,
                    handle,
                    existing.revision
                );
                return;
            }
        }
        self.entries.insert(handle, entry).await;
        self.updated.notify_waiters();
    }

    /// Latest cached analysis, regardless of revision
    pub async fn get(&self, handle: &CellHandle) -> Option<Arc<AnalysisResult>> {
        self.entries.get(handle).await.and_then(|entry| entry.result)
    }

    /// Wait until `revision` (or a later one) has been analyzed
    ///
    /// Returns `None` if analysis failed or did not arrive within `timeout`.
    pub async fn wait_for(
        &self,
        handle: &CellHandle,
        revision: u64,
        timeout: Duration,
    ) -> Option<Arc<AnalysisResult>> {
        let wait = async {
            loop {
                let updated = self.updated.notified();
                tokio::pin!(updated);
                updated.as_mut().enable();

                if let Some(entry) = self.entries.get(handle).await {
                    if entry.revision >= revision {
                        return entry.result;
                    }
                }
                updated.await;
            }
        };

        if let Ok(result) = tokio::time::timeout(timeout, wait).await {
            result
        } else {
            tracing::warn!(
                "Analysis of cell {} (revision {}) did not arrive within {:?}",
                handle,
                revision,
                timeout
            );
            None
        }
    }

    /// Approximate number of cached cells
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> CellHandle {
        CellHandle::new("cell-1")
    }

    #[tokio::test]
    async fn stored_result_is_returned() {
        let cache = AnalysisCache::default();
        let revision = cache.begin(&handle());
        cache
            .store(handle(), revision, AnalysisResult::symbols(["x"], ["y"]))
            .await;

        let result = cache.wait_for(&handle(), revision, Duration::from_secs(1)).await;
        assert_eq!(result.unwrap().local, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn waiter_wakes_when_result_arrives() {
        let cache = AnalysisCache::default();
        let revision = cache.begin(&handle());

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.wait_for(&handle(), revision, Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        cache
            .store(handle(), revision, AnalysisResult::symbols(["df"], Vec::<String>::new()))
            .await;

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.local, vec!["df".to_string()]);
    }

    #[tokio::test]
    async fn older_revision_does_not_satisfy_newer_wait() {
        let cache = AnalysisCache::default();
        let first = cache.begin(&handle());
        cache.store(handle(), first, AnalysisResult::symbols(["old"], Vec::<String>::new())).await;
        let second = cache.begin(&handle());

        let result = cache.wait_for(&handle(), second, Duration::from_millis(20)).await;
        assert!(result.is_none());
        assert!(cache.get(&handle()).await.is_some());
    }

    #[tokio::test]
    async fn stale_result_does_not_overwrite_newer() {
        let cache = AnalysisCache::default();
        let first = cache.begin(&handle());
        let second = cache.begin(&handle());
        cache.store(handle(), second, AnalysisResult::symbols(["new"], Vec::<String>::new())).await;
        cache.store(handle(), first, AnalysisResult::symbols(["old"], Vec::<String>::new())).await;

        assert_eq!(cache.get(&handle()).await.unwrap().local, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn failure_invalidates_entry() {
        let cache = AnalysisCache::default();
        let first = cache.begin(&handle());
        cache.store(handle(), first, AnalysisResult::default()).await;
        let second = cache.begin(&handle());
        cache.fail(handle(), second).await;

        assert!(cache.get(&handle()).await.is_none());
        assert!(cache.wait_for(&handle(), second, Duration::from_secs(1)).await.is_none());
    }

    #[test]
    fn revisions_start_at_one() {
        let cache = AnalysisCache::default();
        assert_eq!(cache.revision(&handle()), 0);
        assert_eq!(cache.current_or_begin(&handle()), 1);
        assert_eq!(cache.current_or_begin(&handle()), 1);
        assert_eq!(cache.begin(&handle()), 2);
    }

    #[test]
    fn analyzer_payload_deserializes_with_defaults() {
        let result: AnalysisResult = serde_json::from_str(
            r#"{"local": ["df"], "remote": ["pd"], "modules": {"pandas": {"version": "2.2", "alias": "pd"}}}"#,
        )
        .unwrap();
        assert_eq!(result.modules["pandas"].alias.as_deref(), Some("pd"));
        assert!(result.data_vars.is_empty());
    }
}
