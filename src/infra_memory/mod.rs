//! In-process storage backend. Used by tests and by `store.backend = "memory"`
//! for single-instance deployments; nothing survives a restart.

mod refresh_record_repo_memory;
mod repo_tx_memory;

pub use refresh_record_repo_memory::*;
pub use repo_tx_memory::*;
