//! Navidrome (Subsonic API) client
//!
//! Implements `DestinationCatalog` by issuing `GET /rest/<method>.view`
//! requests as the account that owns the data being read or written.

use async_trait::async_trait;
use bridge_traits::catalog::{
    CatalogUser, DestinationCatalog, DestinationPlaylist, DestinationTrack,
};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::config::NavidromeSettings;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{NavidromeError, Result};
use crate::types::{SubsonicEnvelope, SubsonicResponse};

const API_VERSION: &str = "1.16.1";
const CLIENT_NAME: &str = "navisync";

/// Candidates requested per search
const SEARCH_SONG_COUNT: u32 = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Subsonic API client acting on behalf of one or more server accounts.
///
/// The primary account enumerates users; every per-user call is
/// authenticated as that user, so playlists end up owned by them.
///
/// # Example
///
/// ```ignore
/// use provider_navidrome::NavidromeClient;
///
/// let client = NavidromeClient::new(http_client, "http://localhost:4533", "admin", "secret")
///     .with_account("alice", "alice-password");
/// client.ping().await?;
/// ```
pub struct NavidromeClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    primary_username: String,
    /// username -> password
    accounts: BTreeMap<String, String>,
}

impl fmt::Debug for NavidromeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavidromeClient")
            .field("base_url", &self.base_url)
            .field("primary_username", &self.primary_username)
            .field("accounts", &self.accounts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NavidromeClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        let mut accounts = BTreeMap::new();
        accounts.insert(username.clone(), password.into());

        Self {
            http_client,
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            primary_username: username,
            accounts,
        }
    }

    pub fn from_settings(http_client: Arc<dyn HttpClient>, settings: &NavidromeSettings) -> Self {
        settings.extra_accounts.iter().fold(
            Self::new(
                http_client,
                settings.url.clone(),
                settings.username.clone(),
                settings.password.clone(),
            ),
            |client, (user, password)| client.with_account(user.clone(), password.clone()),
        )
    }

    /// Add an account the client may act as.
    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.insert(username.into(), password.into());
        self
    }

    pub fn primary_username(&self) -> &str {
        &self.primary_username
    }

    /// Verify the server is reachable and the primary credentials work.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        self.request(&self.primary_username, "ping", &[]).await?;
        info!(server = %self.base_url, "Navidrome connection verified");
        Ok(())
    }

    fn make_salt() -> String {
        let bytes: [u8; 8] = rand::thread_rng().gen();
        bytes.iter().map(|value| format!("{value:02x}")).collect()
    }

    fn auth_params(username: &str, password: &str) -> Vec<(String, String)> {
        let salt = Self::make_salt();
        let token = format!("{:x}", md5::compute(format!("{}{}", password, salt)));
        vec![
            ("u".to_string(), username.to_string()),
            ("t".to_string(), token),
            ("s".to_string(), salt),
            ("f".to_string(), "json".to_string()),
            ("v".to_string(), API_VERSION.to_string()),
            ("c".to_string(), CLIENT_NAME.to_string()),
        ]
    }

    fn api_url(
        &self,
        username: &str,
        password: &str,
        method: &str,
        params: &[(String, String)],
    ) -> String {
        let query: Vec<String> = Self::auth_params(username, password)
            .iter()
            .chain(params.iter())
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect();
        format!("{}/rest/{}.view?{}", self.base_url, method, query.join("&"))
    }

    /// Issue one Subsonic call as `username`.
    async fn request(
        &self,
        username: &str,
        method: &str,
        params: &[(String, String)],
    ) -> Result<SubsonicResponse> {
        let password = self
            .accounts
            .get(username)
            .ok_or_else(|| NavidromeError::UserNotFound(username.to_string()))?;

        let request = HttpRequest::new(
            HttpMethod::Get,
            self.api_url(username, password, method, params),
        )
        .header("Accept", "application/json")
        .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| NavidromeError::NetworkError(format!("{} failed: {}", method, e)))?;

        if !response.is_success() {
            warn!(method, status = response.status, "Subsonic request failed");
            return Err(NavidromeError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            });
        }

        let envelope: SubsonicEnvelope = response
            .json()
            .map_err(|e| NavidromeError::ParseError(format!("{}: {}", method, e)))?;
        let body = envelope.response;

        if !body.is_ok() {
            let (code, message) = body
                .error
                .map(|error| (error.code, error.message))
                .unwrap_or((0, "Subsonic returned an error".to_string()));
            debug!(method, code, message = %message, "Subsonic call returned an error");
            return Err(NavidromeError::Subsonic { code, message });
        }

        Ok(body)
    }
}

#[async_trait]
impl DestinationCatalog for NavidromeClient {
    /// Users the client holds an account for.
    ///
    /// A non-admin primary account cannot call `getUsers`; only that account
    /// is returned in that case.
    #[instrument(skip(self))]
    async fn list_users(&self) -> bridge_traits::error::Result<Vec<CatalogUser>> {
        let body = match self.request(&self.primary_username, "getUsers", &[]).await {
            Ok(body) => body,
            Err(e) if e.is_not_authorized() => {
                warn!(
                    username = %self.primary_username,
                    "Primary account is not an admin, syncing it alone"
                );
                return Ok(vec![CatalogUser::new(self.primary_username.clone(), false)]);
            }
            Err(e) => return Err(e.into()),
        };

        let server_users = body.users.map(|users| users.user).unwrap_or_default();
        for username in self.accounts.keys() {
            if !server_users.iter().any(|user| &user.username == username) {
                warn!(username = %username, "Configured account not found on server");
            }
        }

        let users: Vec<CatalogUser> = server_users
            .into_iter()
            .filter(|user| self.accounts.contains_key(&user.username))
            .map(|user| CatalogUser::new(user.username, user.admin_role))
            .collect();

        debug!(count = users.len(), "Listed Navidrome users");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn search_tracks(
        &self,
        username: &str,
        query: &str,
        isrc: Option<&str>,
    ) -> bridge_traits::error::Result<Vec<DestinationTrack>> {
        let params = vec![
            ("query".to_string(), query.to_string()),
            ("songCount".to_string(), SEARCH_SONG_COUNT.to_string()),
            ("artistCount".to_string(), "0".to_string()),
            ("albumCount".to_string(), "0".to_string()),
        ];
        let body = self.request(username, "search3", &params).await?;

        let songs = body
            .search_result3
            .map(|result| result.song)
            .unwrap_or_default();

        Ok(songs
            .into_iter()
            .filter(|song| match isrc {
                Some(wanted) => song
                    .isrc
                    .iter()
                    .any(|code| code.trim().eq_ignore_ascii_case(wanted.trim())),
                None => true,
            })
            .map(|song| DestinationTrack {
                isrc: song.isrc.into_iter().next(),
                id: song.id,
                title: song.title,
                artist: song.artist,
                album: song.album,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_playlists(
        &self,
        username: &str,
    ) -> bridge_traits::error::Result<Vec<DestinationPlaylist>> {
        let body = self.request(username, "getPlaylists", &[]).await?;

        Ok(body
            .playlists
            .map(|playlists| playlists.playlist)
            .unwrap_or_default()
            .into_iter()
            .filter(|playlist| {
                playlist
                    .owner
                    .as_deref()
                    .map_or(true, |owner| owner == username)
            })
            .map(|playlist| DestinationPlaylist {
                id: playlist.id,
                name: playlist.name,
            })
            .collect())
    }

    /// `createPlaylist` creates when given a name, and replaces the whole
    /// membership when given a `playlistId`. The name is sent verbatim so a
    /// later `get_playlists` lookup finds it again.
    #[instrument(skip(self, track_ids), fields(tracks = track_ids.len()))]
    async fn create_or_update_playlist(
        &self,
        username: &str,
        name: &str,
        existing_id: Option<&str>,
        track_ids: &[String],
    ) -> bridge_traits::error::Result<()> {
        if existing_id.is_none() && name.trim().is_empty() {
            return Err(NavidromeError::Config("playlist name cannot be empty".to_string()).into());
        }

        let mut params = match existing_id {
            Some(id) => vec![("playlistId".to_string(), id.to_string())],
            None => vec![("name".to_string(), name.to_string())],
        };
        params.extend(
            track_ids
                .iter()
                .map(|id| ("songId".to_string(), id.clone())),
        );

        self.request(username, "createPlaylist", &params).await?;

        let action = if existing_id.is_some() {
            "updated"
        } else {
            "created"
        };
        info!(username, playlist = %name, action, "Navidrome playlist written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpResponse;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    fn ok_json(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: bytes::Bytes::from(body.to_string()),
        }
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        url.split_once('?')
            .map(|(_, query)| query)
            .unwrap_or_default()
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| {
                (
                    k.to_string(),
                    urlencoding::decode(v).unwrap().into_owned(),
                )
            })
            .collect()
    }

    fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn client(mock_http: MockHttpClient) -> NavidromeClient {
        NavidromeClient::new(Arc::new(mock_http), "http://nd.test/", "admin", "admin-pw")
            .with_account("alice", "alice-pw")
    }

    #[tokio::test]
    async fn test_request_uses_salted_token_auth() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.starts_with("http://nd.test/rest/ping.view?"));
            let pairs = query_pairs(&req.url);
            let salt = param(&pairs, "s").unwrap();
            let token = param(&pairs, "t").unwrap();
            assert_eq!(param(&pairs, "u"), Some("admin"));
            assert_eq!(param(&pairs, "f"), Some("json"));
            assert_eq!(param(&pairs, "v"), Some("1.16.1"));
            assert_eq!(param(&pairs, "c"), Some("navisync"));
            assert_eq!(
                token,
                format!("{:x}", md5::compute(format!("admin-pw{}", salt)))
            );
            assert!(!req.url.contains("admin-pw"));
            Ok(ok_json(r#"{"subsonic-response":{"status":"ok"}}"#))
        });

        client(mock_http).ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_users_keeps_configured_accounts() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.contains("/rest/getUsers.view"));
            Ok(ok_json(
                r#"{"subsonic-response":{"status":"ok","users":{"user":[
                    {"username":"admin","adminRole":true},
                    {"username":"alice","adminRole":false},
                    {"username":"bob","adminRole":false}]}}}"#,
            ))
        });

        let users = client(mock_http).list_users().await.unwrap();

        assert_eq!(
            users,
            vec![CatalogUser::new("admin", true), CatalogUser::new("alice", false)]
        );
    }

    #[tokio::test]
    async fn test_list_users_non_admin_primary() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(ok_json(
                r#"{"subsonic-response":{"status":"failed",
                    "error":{"code":50,"message":"not authorized"}}}"#,
            ))
        });

        let users = client(mock_http).list_users().await.unwrap();
        assert_eq!(users, vec![CatalogUser::new("admin", false)]);
    }

    #[tokio::test]
    async fn test_list_users_wrong_password_is_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(ok_json(
                r#"{"subsonic-response":{"status":"failed",
                    "error":{"code":40,"message":"Wrong username or password"}}}"#,
            ))
        });

        let err = client(mock_http).list_users().await.unwrap_err();
        assert!(matches!(err, BridgeError::Auth(_)));
    }

    #[tokio::test]
    async fn test_search_as_user_with_isrc_filter() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            let pairs = query_pairs(&req.url);
            assert!(req.url.contains("/rest/search3.view"));
            assert_eq!(param(&pairs, "u"), Some("alice"));
            assert_eq!(param(&pairs, "query"), Some("Song A"));
            assert_eq!(param(&pairs, "songCount"), Some("20"));
            Ok(ok_json(
                r#"{"subsonic-response":{"status":"ok","searchResult3":{"song":[
                    {"id":"s1","title":"Song A","artist":"X","album":"L","isrc":["OTHER"]},
                    {"id":"s2","title":"Song A","artist":"X","album":"L","isrc":["usrc1"]},
                    {"id":"s3","title":"Song A","artist":"X","album":"L"}]}}}"#,
            ))
        });

        let tracks = client(mock_http)
            .search_tracks("alice", "Song A", Some("USRC1"))
            .await
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "s2");
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected_without_request() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(0);

        let err = client(mock_http)
            .search_tracks("mallory", "x", None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_playlists_filters_by_owner() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(ok_json(
                r#"{"subsonic-response":{"status":"ok","playlists":{"playlist":[
                    {"id":"pl1","name":"Roadtrip","owner":"alice"},
                    {"id":"pl2","name":"Shared","owner":"admin"}]}}}"#,
            ))
        });

        let playlists = client(mock_http).get_playlists("alice").await.unwrap();
        assert_eq!(
            playlists,
            vec![DestinationPlaylist {
                id: "pl1".to_string(),
                name: "Roadtrip".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_create_and_replace_playlist() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(|req| {
            let pairs = query_pairs(&req.url);
            assert!(req.url.contains("/rest/createPlaylist.view"));
            let songs: Vec<&str> = pairs
                .iter()
                .filter(|(k, _)| k == "songId")
                .map(|(_, v)| v.as_str())
                .collect();
            assert_eq!(songs, vec!["s1", "s2"]);
            match param(&pairs, "playlistId") {
                Some(id) => {
                    assert_eq!(id, "pl1");
                    assert!(param(&pairs, "name").is_none());
                }
                None => assert_eq!(param(&pairs, "name"), Some("Roadtrip")),
            }
            Ok(ok_json(r#"{"subsonic-response":{"status":"ok"}}"#))
        });

        let client = client(mock_http);
        let ids = vec!["s1".to_string(), "s2".to_string()];
        client
            .create_or_update_playlist("alice", "Roadtrip", None, &ids)
            .await
            .unwrap();
        client
            .create_or_update_playlist("alice", "Roadtrip", Some("pl1"), &ids)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_keeps_surrounding_whitespace_in_name() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            let pairs = query_pairs(&req.url);
            assert_eq!(param(&pairs, "name"), Some("Roadtrip "));
            Ok(ok_json(r#"{"subsonic-response":{"status":"ok"}}"#))
        });

        client(mock_http)
            .create_or_update_playlist("alice", "Roadtrip ", None, &["s1".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(0);

        let err = client(mock_http)
            .create_or_update_playlist("alice", "   ", None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse {
                status: 502,
                headers: HashMap::new(),
                body: bytes::Bytes::from_static(b"bad gateway"),
            })
        });

        let err = client(mock_http).get_playlists("alice").await.unwrap_err();
        assert!(matches!(err, BridgeError::Remote { status: 502, .. }));
    }

    #[test]
    fn test_from_settings_registers_extra_accounts() {
        let settings = NavidromeSettings {
            url: "http://nd.test".to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            extra_accounts: vec![("bob".to_string(), "bob-pw".to_string())],
        };

        let client = NavidromeClient::from_settings(Arc::new(MockHttpClient::new()), &settings);
        assert_eq!(client.primary_username(), "admin");
        assert!(client.accounts.contains_key("bob"));
        assert!(!format!("{:?}", client).contains("bob-pw"));
    }
}
