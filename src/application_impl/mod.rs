mod anomaly_notifier_impl;
mod credential_store;
mod jwt_codec_impl;
mod secret_hasher_impl;
mod token_service_impl;

pub use anomaly_notifier_impl::*;
pub use credential_store::*;
pub use jwt_codec_impl::*;
pub use secret_hasher_impl::*;
pub use token_service_impl::*;
