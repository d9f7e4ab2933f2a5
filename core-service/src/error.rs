use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Navidrome error: {0}")]
    Navidrome(#[from] provider_navidrome::NavidromeError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[source] BridgeError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
