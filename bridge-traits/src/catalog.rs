//! Catalog Abstractions
//!
//! Typed seams for the two catalogs a sync pass talks to: the remote
//! streaming service that owns the source playlists and the destination
//! media server whose playlists are reconciled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// A user account on the destination media server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogUser {
    pub username: String,
    pub is_admin: bool,
}

impl CatalogUser {
    pub fn new(username: impl Into<String>, is_admin: bool) -> Self {
        Self {
            username: username.into(),
            is_admin,
        }
    }
}

/// Client identity used for the refresh-token exchange.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Both halves of the identity are present.
    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Result of a successful refresh-token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// New refresh token when the service rotated it.
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

impl TokenGrant {
    pub fn rotated_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Playlist as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
}

/// Track entry of a remote playlist.
///
/// Fields the service omits are empty strings rather than errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub id: String,
    pub title: String,
    /// Primary artist only
    pub artist: String,
    pub album: String,
    /// ISRC, when the service provides one
    pub isrc: Option<String>,
}

/// Search hit from the destination catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub isrc: Option<String>,
}

/// Playlist owned by a destination user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationPlaylist {
    pub id: String,
    pub name: String,
}

/// Remote streaming catalog (the sync source).
///
/// Listing calls follow the service's pagination cursor to exhaustion and
/// return items in the order the service produced them.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Trade a refresh token for an access token.
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        client: &ClientCredentials,
    ) -> Result<TokenGrant>;

    /// List the playlists visible to the token's owner.
    async fn list_playlists(&self, access_token: &str) -> Result<Vec<RemotePlaylist>>;

    /// List the tracks of one playlist.
    async fn list_playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<Vec<RemoteTrack>>;
}

/// Destination media server catalog (the sync target).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::DestinationCatalog;
///
/// async fn playlist_names(catalog: &dyn DestinationCatalog, user: &str) -> Result<Vec<String>> {
///     let playlists = catalog.get_playlists(user).await?;
///     Ok(playlists.into_iter().map(|p| p.name).collect())
/// }
/// ```
#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Enumerate the users a sync pass should visit.
    async fn list_users(&self) -> Result<Vec<CatalogUser>>;

    /// Search the user's library.
    ///
    /// When `isrc` is given, only candidates carrying that identifier are
    /// returned.
    async fn search_tracks(
        &self,
        username: &str,
        query: &str,
        isrc: Option<&str>,
    ) -> Result<Vec<DestinationTrack>>;

    /// Playlists owned by the user.
    async fn get_playlists(&self, username: &str) -> Result<Vec<DestinationPlaylist>>;

    /// Create the playlist, or replace the membership of `existing_id`.
    async fn create_or_update_playlist(
        &self,
        username: &str,
        name: &str,
        existing_id: Option<&str>,
        track_ids: &[String],
    ) -> Result<()>;
}
