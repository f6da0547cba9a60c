//! Provenance store
//!
//! Holds the in-memory document, applies appends, writes the document back
//! through the persistence backend and publishes a change feed.

use crate::error::StoreError;
use crate::persistence::ProvenancePersistence;
use prov_model::{CellData, Environment, Epoch, Modules, ProvenanceData};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Identifies one kernel start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelStart(pub u64);

/// Whether an execution begins a new kernel lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochHint {
    /// Append to the current epoch
    Continue,
    /// First execution after this kernel start
    KernelStart(KernelStart),
}

/// Where an append landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReceipt {
    pub epoch: usize,
    pub position: usize,
    pub opened_epoch: bool,
    /// False when the backend write failed; the next append rewrites the
    /// whole document
    pub persisted: bool,
}

/// Change feed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStatus {
    pub version: u64,
    pub epochs: usize,
    pub executions: usize,
}

#[derive(Debug)]
struct StoreState {
    data: ProvenanceData,
    open_kernel: Option<KernelStart>,
    version: u64,
}

impl StoreState {
    fn status(&self) -> StoreStatus {
        StoreStatus {
            version: self.version,
            epochs: self.data.epochs.len(),
            executions: self.data.execution_total(),
        }
    }
}

/// Append-only provenance store
pub struct ProvenanceStore {
    state: RwLock<StoreState>,
    persistence: Arc<dyn ProvenancePersistence>,
    status: watch::Sender<StoreStatus>,
}

impl std::fmt::Debug for ProvenanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvenanceStore")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl ProvenanceStore {
    /// Open the store, restoring any previously persisted document
    ///
    /// # Errors
    /// Returns the backend's error if the existing document cannot be read
    pub async fn open(persistence: Arc<dyn ProvenancePersistence>) -> Result<Self, StoreError> {
        let data = persistence.load().await?.unwrap_or_default();
        tracing::debug!(
            "Opened provenance store with {} epochs, {} executions",
            data.epochs.len(),
            data.execution_total()
        );
        Ok(Self::with_document(data, persistence))
    }

    /// Store over an already loaded document
    #[must_use]
    pub fn with_document(data: ProvenanceData, persistence: Arc<dyn ProvenancePersistence>) -> Self {
        let state = StoreState {
            data,
            open_kernel: None,
            version: 0,
        };
        let (status, _) = watch::channel(state.status());
        Self {
            state: RwLock::new(state),
            persistence,
            status,
        }
    }

    /// Append one execution record
    ///
    /// Opens a new epoch when the store is empty or when `hint` names a kernel
    /// start that has not opened an epoch yet; otherwise appends to the latest
    /// epoch and merges `modules` into it. Callers serialize appends through
    /// the [`crate::SequenceGate`].
    pub async fn append(
        &self,
        record: CellData,
        modules: Modules,
        hint: EpochHint,
        environment: Environment,
    ) -> AppendReceipt {
        let mut state = self.state.write().await;

        let open_new = match hint {
            _ if state.data.epochs.is_empty() => true,
            EpochHint::KernelStart(kernel) => state.open_kernel != Some(kernel),
            EpochHint::Continue => false,
        };

        state.data.record_cell(&record.cell_id);
        let cell_id = record.cell_id.clone();
        let execution_count = record.execution_count;

        if open_new {
            if let EpochHint::KernelStart(kernel) = hint {
                state.open_kernel = Some(kernel);
            }
            state.data.epochs.push(Epoch::open(record, modules, environment));
        } else if let Some(epoch) = state.data.latest_epoch_mut() {
            epoch.push(record, modules);
        }

        let epoch = state.data.epochs.len() - 1;
        let position = state.data.epochs[epoch].data.len() - 1;
        state.version += 1;

        let persisted = match self.persistence.save(&state.data).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to persist provenance after append: {}", e);
                false
            }
        };

        if open_new {
            tracing::info!("Opened epoch {} with execution {} of cell {}", epoch, execution_count, cell_id);
        } else {
            tracing::debug!("Appended execution {} of cell {} at {}:{}", execution_count, cell_id, epoch, position);
        }

        self.status.send_replace(state.status());

        AppendReceipt {
            epoch,
            position,
            opened_epoch: open_new,
            persisted,
        }
    }

    /// Clone of the whole document
    pub async fn snapshot(&self) -> ProvenanceData {
        self.state.read().await.data.clone()
    }

    /// Run `f` against the document without cloning it
    pub async fn read<R>(&self, f: impl FnOnce(&ProvenanceData) -> R) -> R {
        f(&self.state.read().await.data)
    }

    pub async fn epoch_count(&self) -> usize {
        self.state.read().await.data.epochs.len()
    }

    /// Executions recorded in `epoch`, `None` if it does not exist
    pub async fn execution_count(&self, epoch: usize) -> Option<usize> {
        self.state.read().await.data.epoch(epoch).map(Epoch::len)
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> StoreStatus {
        *self.status.borrow()
    }

    /// Subscribe to store changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreStatus> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use prov_model::{CellId, ModuleInfo};

    fn record(cell: &str, count: u32) -> CellData {
        CellData::new(CellId::new(cell), count)
    }

    async fn empty_store() -> (ProvenanceStore, Arc<MemoryPersistence>) {
        let backend = Arc::new(MemoryPersistence::new());
        let store = ProvenanceStore::open(backend.clone()).await.unwrap();
        (store, backend)
    }

    #[tokio::test]
    async fn first_append_opens_epoch() {
        let (store, backend) = empty_store().await;
        let receipt = store
            .append(record("a", 3), Modules::new(), EpochHint::Continue, Environment::default())
            .await;
        assert!(receipt.opened_epoch);
        assert!(receipt.persisted);
        assert_eq!((receipt.epoch, receipt.position), (0, 0));
        assert_eq!(backend.save_count(), 1);
    }

    #[tokio::test]
    async fn kernel_start_opens_one_epoch_only() {
        let (store, _) = empty_store().await;
        let kernel = EpochHint::KernelStart(KernelStart(1));
        store.append(record("a", 1), Modules::new(), kernel, Environment::default()).await;
        let again = store.append(record("b", 1), Modules::new(), kernel, Environment::default()).await;
        assert!(!again.opened_epoch);
        assert_eq!(store.epoch_count().await, 1);

        let restart = EpochHint::KernelStart(KernelStart(2));
        let receipt = store.append(record("a", 1), Modules::new(), restart, Environment::default()).await;
        assert!(receipt.opened_epoch);
        assert_eq!(receipt.epoch, 1);
    }

    #[tokio::test]
    async fn append_merges_modules_and_cells() {
        let (store, _) = empty_store().await;
        store.append(record("a", 1), Modules::new(), EpochHint::Continue, Environment::default()).await;

        let mut modules = Modules::new();
        modules.insert("pandas".into(), ModuleInfo { version: "2.1".into(), ..Default::default() });
        store.append(record("b", 2), modules, EpochHint::Continue, Environment::default()).await;
        store.append(record("a", 3), Modules::new(), EpochHint::Continue, Environment::default()).await;

        let data = store.snapshot().await;
        assert_eq!(data.epochs[0].cells, vec![CellId::new("a"), CellId::new("b")]);
        assert_eq!(data.cells.len(), 2);
        assert_eq!(data.epochs[0].modules["pandas"].version, "2.1");
        assert_eq!(store.execution_count(0).await, Some(3));
    }

    #[tokio::test]
    async fn subscribers_see_each_append() {
        let (store, _) = empty_store().await;
        let mut rx = store.subscribe();
        store.append(record("a", 1), Modules::new(), EpochHint::Continue, Environment::default()).await;
        rx.changed().await.unwrap();
        let status = *rx.borrow();
        assert_eq!(status.version, 1);
        assert_eq!(status.executions, 1);
    }

    #[tokio::test]
    async fn reopen_restores_document() {
        let (store, backend) = empty_store().await;
        store.append(record("a", 1), Modules::new(), EpochHint::Continue, Environment::default()).await;

        let reopened = ProvenanceStore::open(backend).await.unwrap();
        assert_eq!(reopened.epoch_count().await, 1);
        assert_eq!(reopened.status().executions, 1);
    }
}
