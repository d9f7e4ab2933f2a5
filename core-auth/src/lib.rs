//! # Authentication Module
//!
//! Refresh-token exchange and per-user credential storage.
//!
//! ## Overview
//!
//! Sync passes never run an interactive authorization flow. Each user holds
//! a long-lived refresh token (entered out of band), which this crate trades
//! for a short-lived access token at the start of every pass. When the
//! token endpoint rotates the refresh token, the replacement is written back
//! through the [`CredentialStore`].
//!
//! ## Features
//!
//! - `grant_type=refresh_token` exchange with HTTP Basic client auth
//! - Bounded retry on HTTP 429 honouring `Retry-After`
//! - Per-user secrets over the platform `SecureStore` with a global fallback

pub mod credential_store;
pub mod error;
pub mod oauth;

pub use credential_store::{Credential, CredentialSource, CredentialStore};
pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlowManager, SPOTIFY_TOKEN_URL};
