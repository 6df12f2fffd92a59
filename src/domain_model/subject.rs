use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the authenticated principal.
#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct SubjectId(pub uuid::Uuid);

impl SubjectId {
    pub fn new_v4() -> Self {
        SubjectId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(SubjectId)
    }
}
