use super::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

pub trait TokenIssuer: Send + Sync {
    fn issue_access_token(
        &self,
        subject: SubjectId,
        binding_ip: &BindingIp,
    ) -> Result<(AccessToken, DateTime<Utc>), TokenError>;
    fn issue_refresh_secret(&self) -> Result<RefreshToken, TokenError>;
}

pub trait TokenValidator: Send + Sync {
    /// Check algorithm and signature only; `exp` is not enforced.
    fn parse_access_token(&self, token: &AccessToken) -> Result<AccessClaims, TokenError>;
    /// Like `parse_access_token`, but also rejects expired tokens.
    fn verify_access_token(&self, token: &AccessToken) -> Result<AccessClaims, TokenError>;
}

/// One-way storage form of refresh secrets.
pub trait SecretHasher: Send + Sync {
    fn hash_secret(&self, raw_secret: &str) -> Result<String, TokenError>;
    /// Never fails: a malformed `stored_hash` simply does not match.
    fn compare_secret(&self, raw_secret: &str, stored_hash: &str) -> bool;
}
