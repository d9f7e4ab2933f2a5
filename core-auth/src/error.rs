use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Client id and client secret must both be configured")]
    InvalidClientCredentials,

    #[error("Refresh token is empty")]
    MissingRefreshToken,

    #[error("Token endpoint rate limited the exchange after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Token endpoint returned {status}: {message}")]
    TokenEndpoint { status: u16, message: String },

    #[error("Failed to decode token response: {0}")]
    Decode(String),

    #[error("Network error during token exchange: {0}")]
    Network(String),

    #[error("No refresh token stored for user {username}")]
    CredentialNotFound { username: String },

    #[error("Failed to persist refresh token for user {username}: {reason}")]
    PersistFailed { username: String, reason: String },

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),
}

impl From<AuthError> for BridgeError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::RateLimited { attempts } => BridgeError::RateLimited { attempts },
            AuthError::TokenEndpoint { status, message } => {
                BridgeError::Remote { status, message }
            }
            AuthError::Decode(message) => BridgeError::Decode(message),
            AuthError::Network(message) => BridgeError::OperationFailed(message),
            AuthError::SecureStorageUnavailable(message) => BridgeError::NotAvailable(message),
            other => BridgeError::Auth(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
