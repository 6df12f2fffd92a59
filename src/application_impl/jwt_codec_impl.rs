use crate::application_port::*;
use crate::domain_model::*;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Raw refresh secrets are this many random bytes before base64.
pub const REFRESH_SECRET_LEN: usize = 32;

pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: String,
    ip: String,
    exp: i64,
    // Per-token id; keeps two tokens minted within the same second distinct.
    #[serde(default)]
    jti: String,
}

fn encode_access(
    subject: SubjectId,
    binding_ip: &BindingIp,
    issued_at: DateTime<Utc>,
    cfg: &JwtConfig,
) -> Result<(String, DateTime<Utc>), TokenError> {
    if cfg.signing_key.is_empty() {
        return Err(TokenError::Signing("empty signing key".to_string()));
    }
    let exp_dt = issued_at + cfg.access_ttl;
    let claims = Claims {
        user_id: subject.to_string(),
        ip: binding_ip.to_string(),
        exp: exp_dt.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };
    let token = encode(
        &Header::new(Algorithm::HS512),
        &claims,
        &EncodingKey::from_secret(&cfg.signing_key),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))?;
    Ok((token, exp_dt))
}

fn decode_access(token: &str, cfg: &JwtConfig, check_exp: bool) -> Result<Claims, TokenError> {
    if cfg.signing_key.is_empty() {
        return Err(TokenError::InvalidAccessToken);
    }
    // Only HS512 is accepted; a header naming any other algorithm fails here.
    let mut v = Validation::new(Algorithm::HS512);
    v.validate_exp = check_exp;
    v.leeway = 0;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(&cfg.signing_key), &v)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::AccessTokenExpired,
            _ => TokenError::InvalidAccessToken,
        })?;
    Ok(data.claims)
}

fn into_access_claims(claims: Claims) -> Result<AccessClaims, TokenError> {
    let subject = claims
        .user_id
        .parse::<SubjectId>()
        .map_err(|_| TokenError::InvalidAccessToken)?;
    let expires_at =
        DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::InvalidAccessToken)?;
    Ok(AccessClaims {
        subject,
        binding_ip: BindingIp::new(claims.ip),
        expires_at,
    })
}

pub struct JwtHs512Codec {
    cfg: JwtConfig,
}

impl JwtHs512Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs512Codec { cfg }
    }
}

impl TokenIssuer for JwtHs512Codec {
    fn issue_access_token(
        &self,
        subject: SubjectId,
        binding_ip: &BindingIp,
    ) -> Result<(AccessToken, DateTime<Utc>), TokenError> {
        let (token, exp_dt) = encode_access(subject, binding_ip, Utc::now(), &self.cfg)?;
        Ok((AccessToken(token), exp_dt))
    }

    fn issue_refresh_secret(&self) -> Result<RefreshToken, TokenError> {
        let mut bytes = [0u8; REFRESH_SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::Entropy(e.to_string()))?;
        Ok(RefreshToken(STANDARD.encode(bytes)))
    }
}

impl TokenValidator for JwtHs512Codec {
    fn parse_access_token(&self, token: &AccessToken) -> Result<AccessClaims, TokenError> {
        let claims = decode_access(&token.0, &self.cfg, false)?;
        into_access_claims(claims)
    }

    fn verify_access_token(&self, token: &AccessToken) -> Result<AccessClaims, TokenError> {
        let claims = decode_access(&token.0, &self.cfg, true)?;
        into_access_claims(claims)
    }
}
