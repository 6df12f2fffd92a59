use super::CredentialStore;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::StorageTx;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct RealTokenService {
    issuer: Arc<dyn TokenIssuer>,
    validator: Arc<dyn TokenValidator>,
    hasher: Arc<dyn SecretHasher>,
    store: Arc<CredentialStore>,
    notifier: Arc<dyn AnomalyNotifier>,
}

impl RealTokenService {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        validator: Arc<dyn TokenValidator>,
        hasher: Arc<dyn SecretHasher>,
        store: Arc<CredentialStore>,
        notifier: Arc<dyn AnomalyNotifier>,
    ) -> Self {
        Self {
            issuer,
            validator,
            hasher,
            store,
            notifier,
        }
    }

    /// Lookup, secret check, binding check and replacement, all inside `tx`.
    /// Any error leaves the caller to roll `tx` back.
    async fn rotate_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        subject: SubjectId,
        presented: &RefreshToken,
        request_ip: &BindingIp,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        let record = self
            .store
            .lookup_active_in_tx(&mut *tx, subject, now)
            .await?;

        if !self.hasher.compare_secret(&presented.0, &record.secret_hash) {
            return Err(TokenError::TokenMismatch);
        }

        if record.binding_ip != *request_ip {
            return Err(TokenError::IpMismatch {
                expected: record.binding_ip,
                actual: request_ip.clone(),
            });
        }

        let (access_token, access_exp) = self.issuer.issue_access_token(subject, request_ip)?;
        let refresh_token = self.issuer.issue_refresh_secret()?;
        let new_record = self
            .store
            .persist_in_tx(tx, subject, &refresh_token, request_ip, now)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: new_record.expires_at,
        })
    }

    async fn notify_anomaly(&self, subject: SubjectId, expected: &BindingIp, actual: &BindingIp) {
        if let Err(e) = self.notifier.notify(subject, expected, actual).await {
            error!(%subject, "anomaly notification failed: {:#}", e);
        }
    }
}

#[async_trait::async_trait]
impl TokenService for RealTokenService {
    async fn issue_pair(
        &self,
        subject: SubjectId,
        ip: &BindingIp,
    ) -> Result<TokenPair, TokenError> {
        let (access_token, access_exp) = self.issuer.issue_access_token(subject, ip)?;
        let refresh_token = self.issuer.issue_refresh_secret()?;

        let record = self
            .store
            .persist_refresh_record(subject, &refresh_token, ip)
            .await?;

        info!(%subject, %ip, "token pair issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: record.expires_at,
        })
    }

    async fn rotate(&self, request: RotateInput) -> Result<TokenPair, TokenError> {
        let RotateInput {
            access_token,
            refresh_token,
            ip,
        } = request;

        // The access token only names the subject here, so an expired one is
        // still good enough.
        let claims = self.validator.parse_access_token(&access_token)?;
        let subject = claims.subject;
        let now = Utc::now();

        let mut tx = self.store.begin().await?;
        let result = self
            .rotate_in_tx(tx.as_mut(), subject, &refresh_token, &ip, now)
            .await;

        match result {
            Ok(pair) => {
                self.store.commit(tx).await?;
                info!(%subject, %ip, "refresh token rotated");
                Ok(pair)
            }
            Err(err) => {
                self.store.rollback(tx).await;
                if let TokenError::IpMismatch { expected, actual } = &err {
                    self.notify_anomaly(subject, expected, actual).await;
                }
                debug!(%subject, %ip, "refresh rejected: {}", err);
                Err(err)
            }
        }
    }

    async fn verify(&self, access_token: &AccessToken) -> Result<AccessClaims, TokenError> {
        self.validator.verify_access_token(access_token)
    }

    async fn revoke(&self, subject: SubjectId) -> Result<u64, TokenError> {
        let removed = self.store.revoke(subject).await?;
        info!(%subject, removed, "refresh tokens revoked");
        Ok(removed)
    }

    async fn cleanup_expired(&self) -> Result<u64, TokenError> {
        self.store.cleanup_expired(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::*;
    use crate::infra_memory::*;
    use std::sync::Mutex;

    const KEY: &str = "test-secret-key";

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(SubjectId, BindingIp, BindingIp)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                calls: Mutex::default(),
                fail: true,
            }
        }

        fn calls(&self) -> Vec<(SubjectId, BindingIp, BindingIp)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AnomalyNotifier for RecordingNotifier {
        async fn notify(
            &self,
            subject: SubjectId,
            old_ip: &BindingIp,
            new_ip: &BindingIp,
        ) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((subject, old_ip.clone(), new_ip.clone()));
            if self.fail {
                anyhow::bail!("mail relay unavailable");
            }
            Ok(())
        }
    }

    struct Fixture {
        service: RealTokenService,
        store: Arc<CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture_with(notifier: RecordingNotifier) -> Fixture {
        let memory = MemoryStore::new();
        let hasher: Arc<dyn SecretHasher> =
            Arc::new(HmacSecretHasher::new(b"test-lookup-key".to_vec()));
        let store = Arc::new(CredentialStore::new(
            Arc::new(MemoryRefreshRecordRepo::new(memory.clone())),
            Arc::new(MemoryTxManager::new(memory)),
            hasher.clone(),
        ));
        let codec = Arc::new(JwtHs512Codec::new(JwtConfig {
            access_ttl: DEFAULT_ACCESS_TTL,
            signing_key: KEY.as_bytes().to_vec(),
        }));
        let notifier = Arc::new(notifier);
        let service = RealTokenService::new(
            codec.clone(),
            codec,
            hasher.clone(),
            store.clone(),
            notifier.clone(),
        );
        Fixture {
            service,
            store,
            hasher,
            notifier,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::default())
    }

    fn rotate_input(pair: &TokenPair, ip: &str) -> RotateInput {
        RotateInput {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            ip: BindingIp::new(ip),
        }
    }

    #[tokio::test]
    async fn issue_pair_binds_access_token_and_record_to_ip() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let ip = BindingIp::new("1.2.3.4");

        let pair = f.service.issue_pair(subject, &ip).await.unwrap();

        let claims = f.service.verify(&pair.access_token).await.unwrap();
        assert_eq!(claims.subject, subject);
        assert_eq!(claims.binding_ip, ip);

        let record = f.store.lookup_active(subject, Utc::now()).await.unwrap();
        assert_eq!(record.binding_ip, ip);
        assert_eq!(record.expires_at, pair.refresh_token_expires_at);
        assert!(f.hasher.compare_secret(&pair.refresh_token.0, &record.secret_hash));
        assert!(pair.refresh_token_expires_at > pair.access_token_expires_at);
    }

    #[tokio::test]
    async fn rotation_returns_new_pair_and_consumes_old_one() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let first = f
            .service
            .issue_pair(subject, &BindingIp::new("1.2.3.4"))
            .await
            .unwrap();

        let second = f
            .service
            .rotate(rotate_input(&first, "1.2.3.4"))
            .await
            .unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(
            f.service.verify(&second.access_token).await.unwrap().subject,
            subject
        );

        let replay = f.service.rotate(rotate_input(&first, "1.2.3.4")).await;
        assert!(matches!(
            replay,
            Err(TokenError::NoActiveToken | TokenError::TokenMismatch)
        ));

        // The pair issued by the rotation is the one that now works.
        assert!(f.service.rotate(rotate_input(&second, "1.2.3.4")).await.is_ok());
    }

    #[tokio::test]
    async fn ip_mismatch_notifies_once_and_keeps_record() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let pair = f
            .service
            .issue_pair(subject, &BindingIp::new("1.2.3.4"))
            .await
            .unwrap();
        let before = f.store.lookup_active(subject, Utc::now()).await.unwrap();

        let result = f.service.rotate(rotate_input(&pair, "5.6.7.8")).await;
        assert!(matches!(result, Err(TokenError::IpMismatch { .. })));

        let calls = f.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            (subject, BindingIp::new("1.2.3.4"), BindingIp::new("5.6.7.8"))
        );

        let after = f.store.lookup_active(subject, Utc::now()).await.unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.secret_hash, before.secret_hash);

        // Not consumed: the same pair still rotates from the bound address.
        assert!(f.service.rotate(rotate_input(&pair, "1.2.3.4")).await.is_ok());
        assert_eq!(f.notifier.calls().len(), 1);
    }

    #[tokio::test]
    async fn ip_mismatch_is_rejected_even_if_notification_fails() {
        let f = fixture_with(RecordingNotifier::failing());
        let subject = SubjectId::new_v4();
        let pair = f
            .service
            .issue_pair(subject, &BindingIp::new("1.2.3.4"))
            .await
            .unwrap();

        let result = f.service.rotate(rotate_input(&pair, "9.9.9.9")).await;
        assert!(matches!(result, Err(TokenError::IpMismatch { .. })));
        assert_eq!(f.notifier.calls().len(), 1);
    }

    #[tokio::test]
    async fn wrong_secret_is_token_mismatch_without_notification() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let pair = f
            .service
            .issue_pair(subject, &BindingIp::new("1.2.3.4"))
            .await
            .unwrap();

        let mut input = rotate_input(&pair, "5.6.7.8");
        input.refresh_token = RefreshToken("not-the-secret".to_string());
        let result = f.service.rotate(input).await;
        assert!(matches!(result, Err(TokenError::TokenMismatch)));
        assert!(f.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn forged_access_token_is_rejected_before_store_lookup() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let pair = f
            .service
            .issue_pair(subject, &BindingIp::new("1.2.3.4"))
            .await
            .unwrap();

        let mut input = rotate_input(&pair, "1.2.3.4");
        input.access_token = AccessToken(format!("{}x", pair.access_token.0));
        let result = f.service.rotate(input).await;
        assert!(matches!(result, Err(TokenError::InvalidAccessToken)));
    }

    #[tokio::test]
    async fn rotation_without_record_is_no_active_token() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let pair = f
            .service
            .issue_pair(subject, &BindingIp::new("1.2.3.4"))
            .await
            .unwrap();
        f.service.revoke(subject).await.unwrap();

        let result = f.service.rotate(rotate_input(&pair, "1.2.3.4")).await;
        assert!(matches!(result, Err(TokenError::NoActiveToken)));
    }

    #[tokio::test]
    async fn newer_login_invalidates_older_pair() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let ip = BindingIp::new("1.2.3.4");
        let older = f.service.issue_pair(subject, &ip).await.unwrap();
        let newer = f.service.issue_pair(subject, &ip).await.unwrap();

        let result = f.service.rotate(rotate_input(&older, "1.2.3.4")).await;
        assert!(matches!(result, Err(TokenError::TokenMismatch)));
        assert!(f.service.rotate(rotate_input(&newer, "1.2.3.4")).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_rotations_of_one_pair_succeed_at_most_once() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let pair = f
            .service
            .issue_pair(subject, &BindingIp::new("1.2.3.4"))
            .await
            .unwrap();
        let service = Arc::new(f.service);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = service.clone();
            let input = rotate_input(&pair, "1.2.3.4");
            handles.push(tokio::spawn(async move { service.rotate(input).await }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(TokenError::NoActiveToken | TokenError::TokenMismatch) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn cleanup_expired_uses_current_time() {
        let f = fixture();
        let subject = SubjectId::new_v4();
        let old = Utc::now() - chrono::Duration::days(31);
        f.store
            .persist_refresh_record_at(
                subject,
                &RefreshToken("old".to_string()),
                &BindingIp::new("1.2.3.4"),
                old,
            )
            .await
            .unwrap();

        assert_eq!(f.service.cleanup_expired().await.unwrap(), 1);
        assert!(matches!(
            f.store.lookup_active(subject, Utc::now()).await,
            Err(TokenError::NoActiveToken)
        ));
    }
}
