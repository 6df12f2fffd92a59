use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_STORE_DEADLINE: Duration = Duration::from_secs(5);

/// Sole owner of refresh-token state.
///
/// Every storage call runs under `deadline`; an expired deadline surfaces as
/// `TokenError::Store` and any transaction open at the time is dropped,
/// which discards its writes.
pub struct CredentialStore {
    repo: Arc<dyn RefreshRecordRepo>,
    tx_manager: Arc<dyn TxManager>,
    hasher: Arc<dyn SecretHasher>,
    refresh_ttl: Duration,
    deadline: Duration,
}

impl CredentialStore {
    pub fn new(
        repo: Arc<dyn RefreshRecordRepo>,
        tx_manager: Arc<dyn TxManager>,
        hasher: Arc<dyn SecretHasher>,
    ) -> Self {
        Self {
            repo,
            tx_manager,
            hasher,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            deadline: DEFAULT_STORE_DEADLINE,
        }
    }

    pub fn with_refresh_ttl(mut self, refresh_ttl: Duration) -> Self {
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, TokenError>
    where
        F: Future<Output = Result<T, TokenError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, deadline_ms = self.deadline.as_millis() as u64, "store deadline exceeded");
                Err(TokenError::Store(format!("{op}: deadline exceeded")))
            }
        }
    }

    pub async fn begin<'t>(&'t self) -> Result<Box<dyn StorageTx<'t> + 't>, TokenError> {
        self.bounded("begin", async {
            self.tx_manager
                .begin()
                .await
                .map_err(|e| TokenError::Store(e.to_string()))
        })
        .await
    }

    pub async fn commit<'t>(&self, tx: Box<dyn StorageTx<'t> + 't>) -> Result<(), TokenError> {
        self.bounded("commit", async {
            tx.commit()
                .await
                .map_err(|e| TokenError::Store(e.to_string()))
        })
        .await
    }

    /// Roll back, logging instead of returning a failure: callers are already
    /// on an error path.
    pub async fn rollback<'t>(&self, tx: Box<dyn StorageTx<'t> + 't>) {
        let result = self
            .bounded("rollback", async {
                tx.rollback()
                    .await
                    .map_err(|e| TokenError::Store(e.to_string()))
            })
            .await;
        if let Err(e) = result {
            error!("rollback failed: {}", e);
        }
    }

    fn new_record(
        &self,
        subject: SubjectId,
        raw_secret: &RefreshToken,
        binding_ip: &BindingIp,
        now: DateTime<Utc>,
    ) -> Result<RefreshRecord, TokenError> {
        let secret_hash = self.hasher.hash_secret(&raw_secret.0)?;
        Ok(RefreshRecord {
            id: RefreshRecordId::new(),
            subject,
            secret_hash,
            binding_ip: binding_ip.clone(),
            created_at: now,
            expires_at: now + self.refresh_ttl,
        })
    }

    pub async fn persist_refresh_record(
        &self,
        subject: SubjectId,
        raw_secret: &RefreshToken,
        binding_ip: &BindingIp,
    ) -> Result<RefreshRecord, TokenError> {
        self.persist_refresh_record_at(subject, raw_secret, binding_ip, Utc::now())
            .await
    }

    /// Replace whatever the subject holds with a record for `raw_secret`, in
    /// one transaction.
    pub async fn persist_refresh_record_at(
        &self,
        subject: SubjectId,
        raw_secret: &RefreshToken,
        binding_ip: &BindingIp,
        now: DateTime<Utc>,
    ) -> Result<RefreshRecord, TokenError> {
        let record = self.new_record(subject, raw_secret, binding_ip, now)?;

        let mut tx = self.begin().await?;
        let replaced = self
            .bounded("replace", self.repo.replace_in_tx(tx.as_mut(), &record))
            .await;
        match replaced {
            Ok(()) => {
                self.commit(tx).await?;
                debug!(%subject, record_id = %record.id, "refresh record persisted");
                Ok(record)
            }
            Err(e) => {
                self.rollback(tx).await;
                Err(e)
            }
        }
    }

    pub async fn persist_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        subject: SubjectId,
        raw_secret: &RefreshToken,
        binding_ip: &BindingIp,
        now: DateTime<Utc>,
    ) -> Result<RefreshRecord, TokenError> {
        let record = self.new_record(subject, raw_secret, binding_ip, now)?;
        self.bounded("replace", self.repo.replace_in_tx(tx, &record))
            .await?;
        Ok(record)
    }

    pub async fn lookup_active(
        &self,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<RefreshRecord, TokenError> {
        self.bounded("find_active", self.repo.find_active(subject, now))
            .await?
            .ok_or(TokenError::NoActiveToken)
    }

    pub async fn lookup_active_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<RefreshRecord, TokenError> {
        self.bounded("find_active", self.repo.find_active_in_tx(tx, subject, now))
            .await?
            .ok_or(TokenError::NoActiveToken)
    }

    pub async fn revoke(&self, subject: SubjectId) -> Result<u64, TokenError> {
        self.bounded("delete_by_subject", self.repo.delete_by_subject(subject))
            .await
    }

    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, TokenError> {
        self.bounded("delete_expired", self.repo.delete_expired(now))
            .await
    }
}
