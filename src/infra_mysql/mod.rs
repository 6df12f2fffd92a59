mod pool;
mod refresh_record_repo_mysql;

pub use pool::*;
pub use refresh_record_repo_mysql::*;

mod repo_tx_mysql;

pub use repo_tx_mysql::*;
