use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// A required setting is absent for the requested operation.
    pub fn missing_setting(key: &str, operation: &str) -> Self {
        Self::CapabilityMissing {
            capability: key.to_string(),
            message: format!("{} requires the '{}' setting", operation, key),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
