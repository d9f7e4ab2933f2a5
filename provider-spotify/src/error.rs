//! Error types for the Spotify provider

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

/// Spotify provider errors
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Token exchange failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Still throttled after the retry budget
    #[error("Spotify rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// API request returned an error
    #[error("Spotify API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A listing produced more pages than allowed
    #[error("Pagination exceeded {pages} pages")]
    PaginationLimitExceeded { pages: usize },

    /// Bridge error
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Spotify operations
pub type Result<T> = std::result::Result<T, SpotifyError>;

impl From<SpotifyError> for BridgeError {
    fn from(error: SpotifyError) -> Self {
        match error {
            SpotifyError::Auth(e) => e.into(),
            SpotifyError::RateLimited { attempts } => BridgeError::RateLimited { attempts },
            SpotifyError::ApiError {
                status_code,
                message,
            } => BridgeError::Remote {
                status: status_code,
                message,
            },
            SpotifyError::ParseError(msg) => BridgeError::Decode(msg),
            SpotifyError::NetworkError(msg) => {
                BridgeError::OperationFailed(format!("Network error: {}", msg))
            }
            e @ SpotifyError::PaginationLimitExceeded { .. } => {
                BridgeError::OperationFailed(e.to_string())
            }
            SpotifyError::Bridge(e) => e,
        }
    }
}
