//! Error types for the Navidrome provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Subsonic error code: wrong username or password
pub const SUBSONIC_WRONG_CREDENTIALS: u32 = 40;
/// Subsonic error code: user is not authorized for the operation
pub const SUBSONIC_NOT_AUTHORIZED: u32 = 50;
/// Subsonic error code: requested data was not found
pub const SUBSONIC_NOT_FOUND: u32 = 70;

/// Navidrome provider errors
#[derive(Error, Debug)]
pub enum NavidromeError {
    #[error("Navidrome configuration error: {0}")]
    Config(String),

    /// The server answered with `status: "failed"`
    #[error("Subsonic error {code}: {message}")]
    Subsonic { code: u32, message: String },

    #[error("Navidrome HTTP error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to parse Subsonic response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    /// No credentials are held for this user
    #[error("No Navidrome account configured for user {0}")]
    UserNotFound(String),
}

impl NavidromeError {
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, NavidromeError::Subsonic { code, .. } if *code == SUBSONIC_NOT_AUTHORIZED)
    }
}

/// Result type for Navidrome operations
pub type Result<T> = std::result::Result<T, NavidromeError>;

impl From<NavidromeError> for BridgeError {
    fn from(error: NavidromeError) -> Self {
        match error {
            NavidromeError::Config(msg) => BridgeError::NotAvailable(msg),
            NavidromeError::Subsonic { code, message } => match code {
                SUBSONIC_WRONG_CREDENTIALS | 41 | SUBSONIC_NOT_AUTHORIZED => {
                    BridgeError::Auth(format!("Subsonic error {}: {}", code, message))
                }
                SUBSONIC_NOT_FOUND => BridgeError::NotFound(message),
                _ => BridgeError::OperationFailed(format!("Subsonic error {}: {}", code, message)),
            },
            NavidromeError::ApiError {
                status_code,
                message,
            } => BridgeError::Remote {
                status: status_code,
                message,
            },
            NavidromeError::ParseError(msg) => BridgeError::Decode(msg),
            NavidromeError::NetworkError(msg) => {
                BridgeError::OperationFailed(format!("Network error: {}", msg))
            }
            NavidromeError::UserNotFound(user) => {
                BridgeError::NotFound(format!("Navidrome account for {}", user))
            }
        }
    }
}
