use crate::domain_model::*;
use crate::domain_port::{StorageTx, TxManager};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryState {
    // Keyed by subject, so a subject can never hold two records.
    pub(super) refresh_records: HashMap<SubjectId, RefreshRecord>,
}

/// Shared in-process "database". Clones point at the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn state(&self) -> &Mutex<MemoryState> {
        &self.state
    }

    pub async fn record_count(&self) -> usize {
        self.state.lock().await.refresh_records.len()
    }
}

/// Transactions hold the store lock from `begin` until commit or rollback,
/// so they are fully serialized against each other and against
/// non-transactional calls.
pub struct MemoryTxManager {
    store: MemoryStore,
}

impl MemoryTxManager {
    pub fn new(store: MemoryStore) -> Self {
        MemoryTxManager { store }
    }
}

#[async_trait::async_trait]
impl TxManager for MemoryTxManager {
    async fn begin<'t>(&'t self) -> anyhow::Result<Box<dyn StorageTx<'t> + 't>> {
        let guard = self.store.state.lock().await;
        Ok(Box::new(MemoryTx::new(guard)))
    }
}

/// Writes are kept in `pending` and only reach the shared state on commit.
/// `None` marks a subject whose record the transaction removed.
pub struct MemoryTx<'t> {
    guard: MutexGuard<'t, MemoryState>,
    pending: HashMap<SubjectId, Option<RefreshRecord>>,
}

impl<'t> MemoryTx<'t> {
    fn new(guard: MutexGuard<'t, MemoryState>) -> Self {
        MemoryTx {
            guard,
            pending: HashMap::new(),
        }
    }

    pub fn refresh_record(&self, subject: &SubjectId) -> Option<&RefreshRecord> {
        match self.pending.get(subject) {
            Some(staged) => staged.as_ref(),
            None => self.guard.refresh_records.get(subject),
        }
    }

    pub fn put_refresh_record(&mut self, record: RefreshRecord) {
        self.pending.insert(record.subject, Some(record));
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Only valid for handles opened by `MemoryTxManager`.
    pub(super) fn downcast<'a>(tx: &'a mut dyn StorageTx<'t>) -> &'a mut MemoryTx<'t> {
        unsafe { &mut *(tx as *mut dyn StorageTx<'t> as *mut MemoryTx<'t>) }
    }
}

#[async_trait::async_trait]
impl<'t> StorageTx<'t> for MemoryTx<'t> {
    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let MemoryTx { mut guard, pending } = *self;
        for (subject, staged) in pending {
            match staged {
                Some(record) => {
                    guard.refresh_records.insert(subject, record);
                }
                None => {
                    guard.refresh_records.remove(&subject);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}
