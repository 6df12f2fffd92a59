use super::TokenError;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// What a caller is allowed to learn about a failed request.
///
/// Refresh failures collapse into `InvalidRefresh` so the response does not
/// reveal which check failed. A binding mismatch stays distinct because it
/// is shown to the user as a security warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum RejectionKind {
    #[error("invalid refresh token")]
    InvalidRefresh,
    #[error("IP address mismatch")]
    BindingMismatch,
    #[error("access token is not valid")]
    InvalidAccess,
    #[error("internal error")]
    Internal,
}

impl RejectionKind {
    pub fn internal<E: std::fmt::Display>(error: E) -> RejectionKind {
        warn!("Internal error: {}", error);
        RejectionKind::Internal
    }

    pub fn for_refresh(error: &TokenError) -> RejectionKind {
        match error {
            TokenError::InvalidAccessToken
            | TokenError::AccessTokenExpired
            | TokenError::NoActiveToken
            | TokenError::TokenMismatch => RejectionKind::InvalidRefresh,
            TokenError::IpMismatch { .. } => RejectionKind::BindingMismatch,
            e => RejectionKind::internal(e),
        }
    }

    pub fn for_access(error: &TokenError) -> RejectionKind {
        match error {
            TokenError::InvalidAccessToken | TokenError::AccessTokenExpired => {
                RejectionKind::InvalidAccess
            }
            e => RejectionKind::internal(e),
        }
    }
}
