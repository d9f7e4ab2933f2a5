//! Per-User Credential Storage
//!
//! Persists each user's remote-service refresh token in the platform
//! [`SecureStore`] under `spotify_token:<username>`.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::CredentialStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = CredentialStore::new(secure_store);
//!
//! store.set("alice", "refresh-token").await?;
//! let credential = store.resolve("alice", None).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::storage::SecureStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Namespace prefix of per-user refresh-token keys.
pub const CREDENTIAL_KEY_PREFIX: &str = "spotify_token:";

/// Where a resolved refresh token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The user's own stored token
    User,
    /// The global `spotify_refresh_token` setting
    Global,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::User => write!(f, "user"),
            CredentialSource::Global => write!(f, "global"),
        }
    }
}

/// A refresh token resolved for one user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub refresh_token: String,
    pub source: CredentialSource,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("refresh_token", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Secure storage for per-user refresh tokens.
///
/// Reads happen once per user at the start of a pass, writes only after a
/// token exchange rotated the refresh token. Concurrent writers follow
/// last-writer-wins.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Storage key for a user's refresh token.
    pub fn storage_key(username: &str) -> String {
        format!("{}{}", CREDENTIAL_KEY_PREFIX, username)
    }

    /// The user's own refresh token, if one is stored.
    pub async fn get(&self, username: &str) -> Result<Option<String>> {
        let key = Self::storage_key(username);
        let bytes = self.secure_store.get_secret(&key).await.map_err(|e| {
            warn!(username, error = %e, "Failed to read refresh token");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        let token = String::from_utf8(bytes).map_err(|_| {
            warn!(username, "Stored refresh token is not valid UTF-8");
            AuthError::SecureStorageUnavailable(format!("Corrupt secret under {}", key))
        })?;

        Ok(Some(token).filter(|token| !token.trim().is_empty()))
    }

    /// Resolve the refresh token for a user, falling back to the global
    /// token when the user has none of their own.
    ///
    /// # Errors
    ///
    /// [`AuthError::CredentialNotFound`] when neither exists, or
    /// [`AuthError::SecureStorageUnavailable`] when the store fails.
    pub async fn resolve(
        &self,
        username: &str,
        global_fallback: Option<&str>,
    ) -> Result<Credential> {
        if let Some(refresh_token) = self.get(username).await? {
            debug!(username, "Using per-user refresh token");
            return Ok(Credential {
                refresh_token,
                source: CredentialSource::User,
            });
        }

        match global_fallback.filter(|token| !token.trim().is_empty()) {
            Some(token) => {
                debug!(username, "Using global refresh token");
                Ok(Credential {
                    refresh_token: token.to_string(),
                    source: CredentialSource::Global,
                })
            }
            None => Err(AuthError::CredentialNotFound {
                username: username.to_string(),
            }),
        }
    }

    /// Store (or overwrite) a user's refresh token.
    pub async fn set(&self, username: &str, refresh_token: &str) -> Result<()> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let key = Self::storage_key(username);
        self.secure_store
            .set_secret(&key, refresh_token.as_bytes())
            .await
            .map_err(|e| AuthError::PersistFailed {
                username: username.to_string(),
                reason: e.to_string(),
            })?;

        info!(username, "Refresh token stored");
        Ok(())
    }
}
