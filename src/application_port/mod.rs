mod anomaly_notifier;
mod rejection;
mod token_codec;
mod token_service;

pub use anomaly_notifier::*;
pub use rejection::*;
pub use token_codec::*;
pub use token_service::*;
