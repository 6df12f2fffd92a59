use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("signing error: {0}")]
    Signing(String),
    #[error("entropy error: {0}")]
    Entropy(String),
    #[error("access token invalid")]
    InvalidAccessToken,
    #[error("access token expired")]
    AccessTokenExpired,
    #[error("no active refresh token")]
    NoActiveToken,
    #[error("refresh token mismatch")]
    TokenMismatch,
    #[error("binding ip mismatch: expected {expected}, got {actual}")]
    IpMismatch {
        expected: BindingIp,
        actual: BindingIp,
    },
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Decoded, signature-checked access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub subject: SubjectId,
    pub binding_ip: BindingIp,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RotateInput {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub ip: BindingIp,
}

#[async_trait::async_trait]
pub trait TokenService: Send + Sync {
    /// Mint a pair for `subject` and make its refresh record the only active one.
    async fn issue_pair(&self, subject: SubjectId, ip: &BindingIp)
    -> Result<TokenPair, TokenError>;
    /// Consume the presented pair and return its replacement.
    async fn rotate(&self, request: RotateInput) -> Result<TokenPair, TokenError>;
    /// Validate an access token for resource authorization. Expired tokens are rejected.
    async fn verify(&self, access_token: &AccessToken) -> Result<AccessClaims, TokenError>;
    async fn revoke(&self, subject: SubjectId) -> Result<u64, TokenError>;
    async fn cleanup_expired(&self) -> Result<u64, TokenError>;
}
