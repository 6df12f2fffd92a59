// repo

mod refresh_record_repo;

mod repo_tx;

pub use refresh_record_repo::*;

pub use repo_tx::*;
