use super::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Client address captured when a token pair is issued.
///
/// Compared by exact string equality; surrounding whitespace is dropped on
/// construction so `" 10.0.0.1"` and `"10.0.0.1"` bind the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingIp(String);

impl BindingIp {
    pub fn new(ip: impl AsRef<str>) -> Self {
        BindingIp(ip.as_ref().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BindingIp {
    fn from(ip: &str) -> Self {
        BindingIp::new(ip)
    }
}

impl From<String> for BindingIp {
    fn from(ip: String) -> Self {
        BindingIp::new(ip)
    }
}

impl From<IpAddr> for BindingIp {
    fn from(ip: IpAddr) -> Self {
        BindingIp(ip.to_string())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct RefreshRecordId(pub uuid::Uuid);

impl RefreshRecordId {
    pub fn new() -> Self {
        RefreshRecordId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for RefreshRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted refresh-token state. At most one exists per subject.
#[derive(Debug, Clone)]
pub struct RefreshRecord {
    pub id: RefreshRecordId,
    pub subject: SubjectId,
    pub secret_hash: String,
    pub binding_ip: BindingIp,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
