//! Process-wide `tracing` setup. The subscriber starts at `info` and is
//! re-filtered from `[log] filter` once settings are parsed.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
