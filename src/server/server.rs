use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::server::Sweeper;
use crate::settings::Settings;
use sqlx::MySqlPool;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything a token endpoint needs, built from settings. The HTTP layer
/// holds on to `token_service`.
pub struct Server {
    pub token_service: Arc<dyn TokenService>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;

        let (repo, tx_manager, pool): (
            Arc<dyn RefreshRecordRepo>,
            Arc<dyn TxManager>,
            Option<MySqlPool>,
        ) = match settings.store.backend.as_str() {
            "mysql" => {
                let dsn = settings
                    .store
                    .dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.dsn is required for mysql"))?;
                let pool =
                    connect(dsn, settings.store.max_connections, settings.store.timeout()).await?;
                run_migrations(&pool).await?;
                (
                    Arc::new(MySqlRefreshRecordRepo::new(pool.clone())),
                    Arc::new(MySqlTxManager::new(pool.clone())),
                    Some(pool),
                )
            }
            "memory" => {
                warn!("using in-memory refresh token store; records are lost on restart");
                let store = MemoryStore::new();
                (
                    Arc::new(MemoryRefreshRecordRepo::new(store.clone())),
                    Arc::new(MemoryTxManager::new(store)),
                    None,
                )
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let hasher: Arc<dyn SecretHasher> = match settings.auth.secret_hasher.as_str() {
            "argon2" => Arc::new(Argon2SecretHasher::new()),
            "hmac" => Arc::new(HmacSecretHasher::new(settings.auth.secret_hash_key()?)),
            other => return Err(anyhow::anyhow!("Unknown secret hasher: {}", other)),
        };

        let codec = Arc::new(JwtHs512Codec::new(JwtConfig {
            access_ttl: settings.auth.access_ttl(),
            signing_key: settings.auth.signing_key()?,
        }));

        let credential_store = Arc::new(
            CredentialStore::new(repo, tx_manager, hasher.clone())
                .with_refresh_ttl(settings.auth.refresh_ttl())
                .with_deadline(settings.store.timeout()),
        );
        let notifier: Arc<dyn AnomalyNotifier> = Arc::new(LogAnomalyNotifier::new());

        let token_service: Arc<dyn TokenService> = Arc::new(RealTokenService::new(
            codec.clone(),
            codec,
            hasher,
            credential_store,
            notifier,
        ));

        let cancel = CancellationToken::new();
        let sweeper = Sweeper::new(
            token_service.clone(),
            settings.sweeper.interval(),
            cancel.clone(),
        );
        let sweeper_handle = sweeper.spawn();

        info!(
            backend = %settings.store.backend,
            hasher = %settings.auth.secret_hasher,
            "server started"
        );

        Ok(Self {
            token_service,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self
            .sweeper_handle
            .lock()
            .ok()
            .and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
