use super::repo_tx_mysql::MySqlTx;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

const ER_DUP_ENTRY: u16 = 1062;

pub struct MySqlRefreshRecordRepo {
    pool: MySqlPool,
}

impl MySqlRefreshRecordRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshRecordRepo { pool }
    }

    #[inline]
    fn uuid_from_bytes(id: &[u8]) -> Result<Uuid, TokenError> {
        Uuid::from_slice(id).map_err(|e| TokenError::Store(e.to_string()))
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshRecord, TokenError> {
        let id_bytes: Vec<u8> = row
            .try_get("id")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let user_id_bytes: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let secret_hash: String = row
            .try_get("token_hash")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let ip_address: String = row
            .try_get("ip_address")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| TokenError::Store(e.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| TokenError::Store(e.to_string()))?;

        Ok(RefreshRecord {
            id: RefreshRecordId(Self::uuid_from_bytes(&id_bytes)?),
            subject: SubjectId(Self::uuid_from_bytes(&user_id_bytes)?),
            secret_hash,
            binding_ip: BindingIp::new(ip_address),
            created_at,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl RefreshRecordRepo for MySqlRefreshRecordRepo {
    async fn replace_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &RefreshRecord,
    ) -> Result<(), TokenError> {
        let tx = MySqlTx::downcast(tx);

        sqlx::query("DELETE FROM refresh_token WHERE user_id = ?")
            .bind(record.subject.0.as_bytes() as &[u8])
            .execute(tx.conn())
            .await
            .map_err(|e| TokenError::Store(format!("delete refresh_token: {e}")))?;

        // uq_refresh_token_user turns a lost race with another writer into an
        // error instead of a second row.
        sqlx::query(
            r#"
INSERT INTO refresh_token (id, user_id, token_hash, ip_address, created_at, expires_at)
VALUES (?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(record.id.0.as_bytes() as &[u8])
        .bind(record.subject.0.as_bytes() as &[u8])
        .bind(record.secret_hash.as_str())
        .bind(record.binding_ip.as_str())
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(tx.conn())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db)
                if db
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .is_some_and(|m| m.number() == ER_DUP_ENTRY) =>
            {
                TokenError::Store(format!(
                    "concurrent refresh token write for subject {}",
                    record.subject
                ))
            }
            e => TokenError::Store(format!("insert refresh_token: {e}")),
        })?;

        Ok(())
    }

    async fn find_active_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshRecord>, TokenError> {
        let tx = MySqlTx::downcast(tx);

        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, user_id, token_hash, ip_address, created_at, expires_at
FROM refresh_token
WHERE user_id = ? AND expires_at > ?
FOR UPDATE
"#,
        )
        .bind(subject.0.as_bytes() as &[u8])
        .bind(now)
        .fetch_optional(tx.conn())
        .await
        .map_err(|e| TokenError::Store(format!("select refresh_token: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_active(
        &self,
        subject: SubjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshRecord>, TokenError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, user_id, token_hash, ip_address, created_at, expires_at
FROM refresh_token
WHERE user_id = ? AND expires_at > ?
"#,
        )
        .bind(subject.0.as_bytes() as &[u8])
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TokenError::Store(format!("select refresh_token: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn delete_by_subject(&self, subject: SubjectId) -> Result<u64, TokenError> {
        let result = sqlx::query("DELETE FROM refresh_token WHERE user_id = ?")
            .bind(subject.0.as_bytes() as &[u8])
            .execute(&self.pool)
            .await
            .map_err(|e| TokenError::Store(format!("delete refresh_token: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, TokenError> {
        let result = sqlx::query("DELETE FROM refresh_token WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| TokenError::Store(format!("delete expired refresh_token: {e}")))?;

        Ok(result.rows_affected())
    }
}
