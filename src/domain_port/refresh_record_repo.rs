use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::repo_tx::StorageTx;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait RefreshRecordRepo: Send + Sync {
    /// Delete every record of `record.subject`, then insert `record`.
    async fn replace_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &RefreshRecord,
    ) -> Result<(), TokenError>;

    /// Fetch the subject's record if it is still active at `now`. The row
    /// stays locked against other writers until `tx` ends.
    async fn find_active_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshRecord>, TokenError>;

    async fn find_active(
        &self,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshRecord>, TokenError>;

    async fn delete_by_subject(&self, subject: SubjectId) -> Result<u64, TokenError>;

    /// Delete records with `expires_at <= now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, TokenError>;
}
