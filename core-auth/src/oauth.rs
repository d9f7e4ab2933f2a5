//! OAuth 2.0 Refresh-Token Exchange
//!
//! Implements the `refresh_token` grant of RFC 6749 §6 against a token
//! endpoint that authenticates the client with HTTP Basic credentials.
//!
//! # Overview
//!
//! The flow manager handles:
//! - Validating the client identity and refresh token before any request
//! - Building the form-encoded token request
//! - Retrying throttled (429) responses per a [`RateLimitPolicy`]
//! - Detecting refresh-token rotation
//!
//! # Security
//!
//! Tokens and client secrets are never logged. Error messages carry the
//! endpoint's status and error body only.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use bridge_traits::catalog::ClientCredentials;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let manager = OAuthFlowManager::new(OAuthConfig::default(), http_client);
//! let client = ClientCredentials::new("client-id", "client-secret");
//!
//! let grant = manager.refresh_access_token("stored-refresh-token", &client).await?;
//! if let Some(rotated) = grant.rotated_refresh_token() {
//!     // persist `rotated`
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use bridge_traits::catalog::{ClientCredentials, TokenGrant};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RateLimitPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Spotify accounts service token endpoint.
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Token endpoint configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Token endpoint URL
    pub token_url: String,
    /// Retry policy for throttled exchanges
    pub rate_limit: RateLimitPolicy,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

impl OAuthConfig {
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }
}

/// OAuth 2.0 flow manager.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Refresh an access token using a refresh token.
    ///
    /// # Returns
    ///
    /// A [`TokenGrant`] whose `refresh_token` is set only when the endpoint
    /// issued a new, non-empty refresh token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidClientCredentials`] / [`AuthError::MissingRefreshToken`]
    ///   before any request when inputs are empty
    /// - [`AuthError::RateLimited`] once the retry budget is spent
    /// - [`AuthError::TokenEndpoint`] for any other non-2xx status
    /// - [`AuthError::Decode`] when the body is not a token response
    /// - [`AuthError::Network`] when the transport fails
    #[instrument(skip(self, refresh_token, client), fields(token_url = %self.config.token_url))]
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        client: &ClientCredentials,
    ) -> Result<TokenGrant> {
        if !client.is_complete() {
            return Err(AuthError::InvalidClientCredentials);
        }
        if refresh_token.trim().is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .basic_auth(&client.client_id, &client.client_secret)
            .form(&params)
            .map_err(|e| AuthError::Network(format!("Failed to encode token request: {}", e)))?;

        debug!("Refreshing access token");

        let policy = &self.config.rate_limit;
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .http_client
                .execute(request.clone())
                .await
                .map_err(|e| AuthError::Network(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response
                    .json()
                    .map_err(|e| AuthError::Decode(e.to_string()))?;

                if token_response.access_token.is_empty() {
                    return Err(AuthError::Decode(
                        "Token response carried an empty access_token".to_string(),
                    ));
                }

                let rotated = token_response
                    .refresh_token
                    .filter(|token| !token.is_empty());

                debug!(
                    expires_in = token_response.expires_in,
                    rotated = rotated.is_some(),
                    "Refreshed access token"
                );

                return Ok(TokenGrant {
                    access_token: token_response.access_token,
                    refresh_token: rotated,
                    expires_in: token_response.expires_in,
                });
            }

            if response.is_rate_limited() {
                if attempts > policy.max_retries {
                    warn!(attempts, "Token endpoint still throttling, giving up");
                    return Err(AuthError::RateLimited { attempts });
                }

                let delay = policy.wait_for(&response);
                warn!(
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Token endpoint rate limited the exchange, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(status, error = %error_body, "Token refresh failed");

            return Err(AuthError::TokenEndpoint {
                status,
                message: error_body,
            });
        }
    }
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}
