//! Spotify Web API connector implementation
//!
//! Implements the `RemoteCatalog` trait for the Spotify Web API.

use async_trait::async_trait;
use bridge_traits::catalog::{
    ClientCredentials, RemoteCatalog, RemotePlaylist, RemoteTrack, TokenGrant,
};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RateLimitPolicy};
use core_auth::{OAuthConfig, OAuthFlowManager};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::SpotifyError;
use crate::types::{Page, PlaylistTracksPage, PlaylistsPage, TrackObject};

/// Spotify Web API base URL
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Playlists per page (API maximum)
const PLAYLISTS_PAGE_SIZE: u32 = 50;

/// Playlist items per page (API maximum)
const TRACKS_PAGE_SIZE: u32 = 100;

/// Ceiling on pages fetched by one listing
const MAX_PAGES: usize = 10_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spotify Web API connector
///
/// # Features
///
/// - Refresh-token exchange delegated to [`OAuthFlowManager`]
/// - `next`-cursor pagination with a visited-URL guard
/// - One [`RateLimitPolicy`] shared by the token exchange and page fetches
///
/// # Example
///
/// ```ignore
/// use provider_spotify::SpotifyConnector;
/// use bridge_traits::catalog::RemoteCatalog;
///
/// let connector = SpotifyConnector::new(http_client);
/// let grant = connector.exchange_refresh_token(&refresh_token, &client).await?;
/// let playlists = connector.list_playlists(&grant.access_token).await?;
/// ```
pub struct SpotifyConnector {
    http_client: Arc<dyn HttpClient>,
    oauth_config: OAuthConfig,
    api_base: String,
    rate_limit: RateLimitPolicy,
    max_pages: usize,
}

impl SpotifyConnector {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            oauth_config: OAuthConfig::default(),
            api_base: SPOTIFY_API_BASE.to_string(),
            rate_limit: RateLimitPolicy::default(),
            max_pages: MAX_PAGES,
        }
    }

    /// Point API calls at another base URL (no trailing slash).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.oauth_config = self.oauth_config.with_token_url(token_url);
        self
    }

    /// Retry policy for throttled token exchanges and page fetches.
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.oauth_config = self.oauth_config.with_rate_limit(policy.clone());
        self.rate_limit = policy;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn playlists_url(&self) -> String {
        format!("{}/me/playlists?limit={}", self.api_base, PLAYLISTS_PAGE_SIZE)
    }

    fn playlist_tracks_url(&self, playlist_id: &str) -> String {
        format!(
            "{}/playlists/{}/tracks?limit={}",
            self.api_base,
            urlencoding::encode(playlist_id),
            TRACKS_PAGE_SIZE
        )
    }

    fn convert_track(track: TrackObject) -> RemoteTrack {
        RemoteTrack {
            id: track.id.unwrap_or_default(),
            title: track.name.unwrap_or_default(),
            artist: track
                .artists
                .into_iter()
                .next()
                .and_then(|artist| artist.name)
                .unwrap_or_default(),
            album: track
                .album
                .and_then(|album| album.name)
                .unwrap_or_default(),
            isrc: track
                .external_ids
                .and_then(|ids| ids.isrc)
                .filter(|isrc| !isrc.trim().is_empty()),
        }
    }

    /// GET a URL, retrying throttled responses per the rate-limit policy.
    #[instrument(skip(self, access_token))]
    async fn get_with_retry(
        &self,
        url: &str,
        access_token: &str,
    ) -> std::result::Result<HttpResponse, SpotifyError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = HttpRequest::new(HttpMethod::Get, url)
                .bearer_token(access_token)
                .header("Accept", "application/json")
                .timeout(REQUEST_TIMEOUT);

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|e| SpotifyError::NetworkError(e.to_string()))?;

            if response.is_success() {
                debug!(status = response.status, "API request succeeded");
                return Ok(response);
            }

            if response.is_rate_limited() {
                if attempts > self.rate_limit.max_retries {
                    warn!(attempts, "Spotify still rate limiting, giving up");
                    return Err(SpotifyError::RateLimited { attempts });
                }

                let delay = self.rate_limit.wait_for(&response);
                warn!(
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Spotify rate limit hit, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            warn!(status = response.status, "API request failed");
            return Err(SpotifyError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }
    }

    /// Follow `next` cursors from `first_url` and concatenate every page.
    ///
    /// A cursor pointing at an already fetched page ends the listing.
    async fn collect_pages<P>(
        &self,
        first_url: String,
        access_token: &str,
    ) -> std::result::Result<Vec<P::Item>, SpotifyError>
    where
        P: Page + DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first_url);

        while let Some(url) = next.take() {
            if visited.contains(&url) {
                warn!(url = %url, "Pagination cursor revisits a fetched page, stopping");
                break;
            }
            if visited.len() >= self.max_pages {
                return Err(SpotifyError::PaginationLimitExceeded {
                    pages: self.max_pages,
                });
            }

            let response = self.get_with_retry(&url, access_token).await?;
            let page: P = response
                .json()
                .map_err(|e| SpotifyError::ParseError(e.to_string()))?;
            visited.insert(url);

            let (page_items, next_url) = page.into_parts();
            items.extend(page_items);
            next = next_url.filter(|url| !url.is_empty());
        }

        debug!(pages = visited.len(), items = items.len(), "Listing complete");
        Ok(items)
    }

    fn oauth(&self) -> OAuthFlowManager {
        OAuthFlowManager::new(self.oauth_config.clone(), self.http_client.clone())
    }
}

#[async_trait]
impl RemoteCatalog for SpotifyConnector {
    #[instrument(skip(self, refresh_token, client))]
    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        client: &ClientCredentials,
    ) -> Result<TokenGrant> {
        let grant = self
            .oauth()
            .refresh_access_token(refresh_token, client)
            .await
            .map_err(SpotifyError::from)?;
        Ok(grant)
    }

    #[instrument(skip(self, access_token))]
    async fn list_playlists(&self, access_token: &str) -> Result<Vec<RemotePlaylist>> {
        let playlists = self
            .collect_pages::<PlaylistsPage>(self.playlists_url(), access_token)
            .await?;

        info!(count = playlists.len(), "Listed Spotify playlists");

        Ok(playlists
            .into_iter()
            .map(|playlist| RemotePlaylist {
                id: playlist.id,
                name: playlist.name.unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self, access_token))]
    async fn list_playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<Vec<RemoteTrack>> {
        let tracks = self
            .collect_pages::<PlaylistTracksPage>(
                self.playlist_tracks_url(playlist_id),
                access_token,
            )
            .await?;

        debug!(count = tracks.len(), "Listed playlist tracks");

        Ok(tracks.into_iter().map(Self::convert_track).collect())
    }
}
