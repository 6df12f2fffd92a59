use super::repo_tx_memory::{MemoryStore, MemoryTx};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};

pub struct MemoryRefreshRecordRepo {
    store: MemoryStore,
}

impl MemoryRefreshRecordRepo {
    pub fn new(store: MemoryStore) -> Self {
        MemoryRefreshRecordRepo { store }
    }
}

#[async_trait::async_trait]
impl RefreshRecordRepo for MemoryRefreshRecordRepo {
    async fn replace_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &RefreshRecord,
    ) -> Result<(), TokenError> {
        let tx = MemoryTx::downcast(tx);
        tx.put_refresh_record(record.clone());
        Ok(())
    }

    async fn find_active_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshRecord>, TokenError> {
        let tx = MemoryTx::downcast(tx);
        Ok(tx
            .refresh_record(&subject)
            .filter(|r| r.is_active_at(now))
            .cloned())
    }

    async fn find_active(
        &self,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshRecord>, TokenError> {
        let state = self.store.state().lock().await;
        Ok(state
            .refresh_records
            .get(&subject)
            .filter(|r| r.is_active_at(now))
            .cloned())
    }

    async fn delete_by_subject(&self, subject: SubjectId) -> Result<u64, TokenError> {
        let mut state = self.store.state().lock().await;
        Ok(state.refresh_records.remove(&subject).map_or(0, |_| 1))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, TokenError> {
        let mut state = self.store.state().lock().await;
        let before = state.refresh_records.len();
        state.refresh_records.retain(|_, r| r.is_active_at(now));
        Ok((before - state.refresh_records.len()) as u64)
    }
}
