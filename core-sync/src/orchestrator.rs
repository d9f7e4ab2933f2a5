//! # Sync Orchestrator
//!
//! Drives one sync pass over every destination user, one user at a time:
//!
//! ```text
//! CredentialLookup -> TokenRefresh -> PlaylistEnumeration
//!     -> { per playlist: TrackFetch -> TrackMatch -> Reconcile }
//!     -> Done | Skipped
//! ```
//!
//! Failures local to a user or a playlist are recorded in the
//! [`SyncReport`] and the pass continues. Failing to enumerate users is the
//! only error returned to the caller.

use bridge_traits::catalog::{
    ClientCredentials, DestinationCatalog, RemoteCatalog, RemotePlaylist,
};
use bridge_traits::time::Clock;
use core_auth::{Credential, CredentialSource, CredentialStore};
use core_runtime::config::SyncSettings;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::matcher::TrackMatcher;
use crate::reconcile::PlaylistReconciler;
use crate::report::{
    PlaylistOutcome, PlaylistStatus, RotationOutcome, SyncReport, UserOutcome,
};

/// Per-user state for the duration of one pass.
#[derive(Clone)]
pub struct SyncSession {
    pub username: String,
    pub access_token: String,
    pub client: ClientCredentials,
    pub credential_source: CredentialSource,
}

impl fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSession")
            .field("username", &self.username)
            .field("access_token", &"[REDACTED]")
            .field("client", &self.client)
            .field("credential_source", &self.credential_source)
            .finish()
    }
}

pub struct SyncOrchestrator {
    remote: Arc<dyn RemoteCatalog>,
    destination: Arc<dyn DestinationCatalog>,
    credentials: CredentialStore,
    matcher: TrackMatcher,
    reconciler: PlaylistReconciler,
    clock: Arc<dyn Clock>,
}

impl SyncOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteCatalog>,
        destination: Arc<dyn DestinationCatalog>,
        credentials: CredentialStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            matcher: TrackMatcher::new(destination.clone()),
            reconciler: PlaylistReconciler::new(destination.clone()),
            remote,
            destination,
            credentials,
            clock,
        }
    }

    /// Run one full pass.
    ///
    /// # Errors
    ///
    /// Only [`SyncError::UserEnumeration`]; every other failure is recorded
    /// in the returned report.
    #[instrument(skip(self, settings))]
    pub async fn run_pass(&self, settings: &SyncSettings) -> Result<SyncReport> {
        let mut report = SyncReport::new(self.clock.now());

        let users = self
            .destination
            .list_users()
            .await
            .map_err(SyncError::UserEnumeration)?;

        info!(
            run_id = %report.run_id,
            users = users.len(),
            filter = settings.playlist_filter.len(),
            "Starting sync pass"
        );

        for user in users {
            let outcome = self.sync_user(&user.username, settings).await;
            report.users.push(outcome);
        }

        report.finish(self.clock.now());
        Ok(report)
    }

    async fn sync_user(&self, username: &str, settings: &SyncSettings) -> UserOutcome {
        let mut outcome = UserOutcome::new(username);

        let session = match self.open_session(username, settings, &mut outcome).await {
            Ok(session) => session,
            Err(e) => {
                warn!(username, error = %e, "Skipping user");
                return outcome.skipped(e.to_string());
            }
        };

        let playlists = match self.remote.list_playlists(&session.access_token).await {
            Ok(playlists) => playlists,
            Err(source) => {
                let e = SyncError::PlaylistEnumeration {
                    username: username.to_string(),
                    source,
                };
                error!(username, error = %e, "Skipping user");
                return outcome.skipped(e.to_string());
            }
        };

        debug!(username, playlists = playlists.len(), "Remote playlists listed");

        let mut claimed_names = HashSet::new();
        for playlist in playlists {
            let status = if !settings.playlist_filter.allows(&playlist.name) {
                PlaylistStatus::Filtered
            } else if !claimed_names.insert(playlist.name.clone()) {
                PlaylistStatus::DuplicateName
            } else {
                self.sync_playlist(&session, &playlist).await
            };

            outcome.playlists.push(PlaylistOutcome {
                remote_id: playlist.id,
                name: playlist.name,
                status,
            });
        }

        outcome
    }

    /// Resolve the credential, exchange it and persist a rotated token.
    async fn open_session(
        &self,
        username: &str,
        settings: &SyncSettings,
        outcome: &mut UserOutcome,
    ) -> Result<SyncSession> {
        let Credential {
            refresh_token,
            source,
        } = self
            .credentials
            .resolve(username, settings.global_refresh_token.as_deref())
            .await
            .map_err(|source| SyncError::CredentialLookup {
                username: username.to_string(),
                source,
            })?;
        outcome.credential_source = Some(source);

        let grant = self
            .remote
            .exchange_refresh_token(&refresh_token, &settings.client)
            .await
            .map_err(|source| SyncError::TokenRefresh {
                username: username.to_string(),
                source,
            })?;

        debug!(username, credential = %source, "Access token obtained");

        if let Some(rotated) = grant
            .rotated_refresh_token()
            .filter(|rotated| *rotated != refresh_token)
        {
            outcome.rotation = match self.credentials.set(username, rotated).await {
                Ok(()) => RotationOutcome::Persisted,
                Err(source) => {
                    let e = SyncError::Persist {
                        username: username.to_string(),
                        source,
                    };
                    error!(username, error = %e, "Continuing with the current access token");
                    RotationOutcome::PersistFailed {
                        error: e.to_string(),
                    }
                }
            };
        }

        Ok(SyncSession {
            username: username.to_string(),
            access_token: grant.access_token,
            client: settings.client.clone(),
            credential_source: source,
        })
    }

    #[instrument(skip(self, session, playlist), fields(username = %session.username, playlist = %playlist.name))]
    async fn sync_playlist(&self, session: &SyncSession, playlist: &RemotePlaylist) -> PlaylistStatus {
        let tracks = match self
            .remote
            .list_playlist_tracks(&session.access_token, &playlist.id)
            .await
        {
            Ok(tracks) => tracks,
            Err(source) => {
                let e = SyncError::TrackFetch {
                    username: session.username.clone(),
                    playlist: playlist.name.clone(),
                    source,
                };
                return PlaylistStatus::FetchFailed {
                    error: e.to_string(),
                };
            }
        };

        let total = tracks.len();
        let mut track_ids = Vec::with_capacity(total);
        for track in &tracks {
            match self.matcher.resolve(&session.username, track).await {
                Ok(Some(hit)) => track_ids.push(hit.track_id),
                Ok(None) => debug!(
                    title = %track.title,
                    artist = %track.artist,
                    isrc = ?track.isrc,
                    "Unmatched track"
                ),
                Err(e) => warn!(error = %e, "Track treated as unmatched"),
            }
        }

        if track_ids.is_empty() {
            return PlaylistStatus::NothingMatched { total };
        }

        let matched = track_ids.len();
        match self
            .reconciler
            .reconcile(&session.username, &playlist.name, &track_ids)
            .await
        {
            Ok(action) => PlaylistStatus::Reconciled {
                action,
                matched,
                unmatched: total - matched,
            },
            Err(source) => {
                let e = SyncError::Reconcile {
                    username: session.username.clone(),
                    playlist: playlist.name.clone(),
                    source,
                };
                PlaylistStatus::ReconcileFailed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::catalog::{
        CatalogUser, DestinationPlaylist, DestinationTrack, RemoteTrack, TokenGrant,
    };
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::SecureStore;
    use bridge_traits::time::SystemClock;
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::Mutex;

    mock! {
        Remote {}

        #[async_trait]
        impl RemoteCatalog for Remote {
            async fn exchange_refresh_token(
                &self,
                refresh_token: &str,
                client: &ClientCredentials,
            ) -> BridgeResult<TokenGrant>;
            async fn list_playlists(&self, access_token: &str) -> BridgeResult<Vec<RemotePlaylist>>;
            async fn list_playlist_tracks(
                &self,
                access_token: &str,
                playlist_id: &str,
            ) -> BridgeResult<Vec<RemoteTrack>>;
        }
    }

    #[derive(Default)]
    struct MemorySecrets {
        data: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SecureStore for MemorySecrets {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }
    }

    /// Destination with fixed users and one searchable song per title.
    #[derive(Default)]
    struct FakeDestination {
        users: Vec<CatalogUser>,
        songs: Vec<DestinationTrack>,
        fail_users: bool,
        written: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    #[async_trait]
    impl DestinationCatalog for FakeDestination {
        async fn list_users(&self) -> BridgeResult<Vec<CatalogUser>> {
            if self.fail_users {
                return Err(BridgeError::Remote {
                    status: 503,
                    message: "down".to_string(),
                });
            }
            Ok(self.users.clone())
        }

        async fn search_tracks(
            &self,
            _username: &str,
            query: &str,
            isrc: Option<&str>,
        ) -> BridgeResult<Vec<DestinationTrack>> {
            Ok(self
                .songs
                .iter()
                .filter(|song| match isrc {
                    Some(isrc) => song.isrc.as_deref() == Some(isrc),
                    None => song.title == query,
                })
                .cloned()
                .collect())
        }

        async fn get_playlists(&self, _username: &str) -> BridgeResult<Vec<DestinationPlaylist>> {
            Ok(vec![])
        }

        async fn create_or_update_playlist(
            &self,
            username: &str,
            name: &str,
            _existing_id: Option<&str>,
            track_ids: &[String],
        ) -> BridgeResult<()> {
            self.written.lock().unwrap().push((
                username.to_string(),
                name.to_string(),
                track_ids.to_vec(),
            ));
            Ok(())
        }
    }

    fn grant(refresh_token: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: "access".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_in: 3600,
        }
    }

    fn playlist(id: &str, name: &str) -> RemotePlaylist {
        RemotePlaylist {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn song(id: &str, title: &str) -> DestinationTrack {
        DestinationTrack {
            id: id.to_string(),
            title: title.to_string(),
            artist: "Artist".to_string(),
            ..Default::default()
        }
    }

    fn track(title: &str) -> RemoteTrack {
        RemoteTrack {
            title: title.to_string(),
            artist: "Artist".to_string(),
            ..Default::default()
        }
    }

    fn orchestrator(
        remote: MockRemote,
        destination: Arc<FakeDestination>,
        secrets: Arc<MemorySecrets>,
    ) -> SyncOrchestrator {
        SyncOrchestrator::new(
            Arc::new(remote),
            destination,
            CredentialStore::new(secrets),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn test_user_enumeration_failure_is_fatal() {
        let destination = Arc::new(FakeDestination {
            fail_users: true,
            ..Default::default()
        });

        let result = orchestrator(MockRemote::new(), destination, Arc::default())
            .run_pass(&SyncSettings::default())
            .await;

        assert!(matches!(result, Err(SyncError::UserEnumeration(_))));
    }

    #[tokio::test]
    async fn test_token_failure_skips_only_that_user() {
        let destination = Arc::new(FakeDestination {
            users: vec![
                CatalogUser::new("alice", true),
                CatalogUser::new("bob", false),
            ],
            songs: vec![song("s1", "Song")],
            ..Default::default()
        });

        let mut remote = MockRemote::new();
        remote
            .expect_exchange_refresh_token()
            .withf(|token, _| token == "alice-token")
            .returning(|_, _| Err(BridgeError::Auth("invalid_grant".to_string())));
        remote
            .expect_exchange_refresh_token()
            .withf(|token, _| token == "global-token")
            .returning(|_, _| Ok(grant(None)));
        remote
            .expect_list_playlists()
            .returning(|_| Ok(vec![playlist("p1", "Mix")]));
        remote
            .expect_list_playlist_tracks()
            .withf(|token, playlist_id| token == "access" && playlist_id == "p1")
            .returning(|_, _| Ok(vec![track("Song")]));

        let secrets = Arc::new(MemorySecrets::default());
        secrets
            .set_secret(&CredentialStore::storage_key("alice"), b"alice-token")
            .await
            .unwrap();

        let settings = SyncSettings::default().with_global_refresh_token("global-token");
        let report = orchestrator(remote, destination.clone(), secrets)
            .run_pass(&settings)
            .await
            .unwrap();

        assert!(report.user("alice").unwrap().is_skipped());
        let bob = report.user("bob").unwrap();
        assert_eq!(bob.credential_source, Some(CredentialSource::Global));
        assert_eq!(report.playlists_reconciled(), 1);
        assert_eq!(
            *destination.written.lock().unwrap(),
            vec![("bob".to_string(), "Mix".to_string(), vec!["s1".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_playlist_enumeration_failure_skips_user() {
        let destination = Arc::new(FakeDestination {
            users: vec![CatalogUser::new("alice", true)],
            ..Default::default()
        });

        let mut remote = MockRemote::new();
        remote
            .expect_exchange_refresh_token()
            .returning(|_, _| Ok(grant(None)));
        remote.expect_list_playlists().returning(|_| {
            Err(BridgeError::Remote {
                status: 500,
                message: "oops".to_string(),
            })
        });
        remote.expect_list_playlist_tracks().never();

        let settings = SyncSettings::default().with_global_refresh_token("global-token");
        let report = orchestrator(remote, destination, Arc::default())
            .run_pass(&settings)
            .await
            .unwrap();

        assert_eq!(report.users_skipped(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_only_that_playlist() {
        let destination = Arc::new(FakeDestination {
            users: vec![CatalogUser::new("alice", true)],
            songs: vec![song("s1", "Song")],
            ..Default::default()
        });

        let mut remote = MockRemote::new();
        remote
            .expect_exchange_refresh_token()
            .returning(|_, _| Ok(grant(None)));
        remote
            .expect_list_playlists()
            .returning(|_| Ok(vec![playlist("p1", "Broken"), playlist("p2", "Fine")]));
        remote
            .expect_list_playlist_tracks()
            .withf(|token, playlist_id| token == "access" && playlist_id == "p1")
            .returning(|_, _| Err(BridgeError::Decode("bad json".to_string())));
        remote
            .expect_list_playlist_tracks()
            .withf(|token, playlist_id| token == "access" && playlist_id == "p2")
            .returning(|_, _| Ok(vec![track("Song")]));

        let settings = SyncSettings::default().with_global_refresh_token("global-token");
        let report = orchestrator(remote, destination, Arc::default())
            .run_pass(&settings)
            .await
            .unwrap();

        let alice = report.user("alice").unwrap();
        assert!(matches!(
            alice.playlists[0].status,
            PlaylistStatus::FetchFailed { .. }
        ));
        assert!(matches!(
            alice.playlists[1].status,
            PlaylistStatus::Reconciled { matched: 1, .. }
        ));
        assert!(report.has_failures());
    }

    #[tokio::test]
    async fn test_duplicate_name_reconciled_once() {
        let destination = Arc::new(FakeDestination {
            users: vec![CatalogUser::new("alice", true)],
            songs: vec![song("s1", "Song")],
            ..Default::default()
        });

        let mut remote = MockRemote::new();
        remote
            .expect_exchange_refresh_token()
            .returning(|_, _| Ok(grant(None)));
        remote
            .expect_list_playlists()
            .returning(|_| Ok(vec![playlist("p1", "Mix"), playlist("p2", "Mix")]));
        remote
            .expect_list_playlist_tracks()
            .withf(|token, playlist_id| token == "access" && playlist_id == "p1")
            .times(1)
            .returning(|_, _| Ok(vec![track("Song")]));

        let settings = SyncSettings::default().with_global_refresh_token("global-token");
        let report = orchestrator(remote, destination.clone(), Arc::default())
            .run_pass(&settings)
            .await
            .unwrap();

        let alice = report.user("alice").unwrap();
        assert_eq!(alice.playlists[1].status, PlaylistStatus::DuplicateName);
        assert_eq!(destination.written.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_matched_leaves_destination_untouched() {
        let destination = Arc::new(FakeDestination {
            users: vec![CatalogUser::new("alice", true)],
            ..Default::default()
        });

        let mut remote = MockRemote::new();
        remote
            .expect_exchange_refresh_token()
            .returning(|_, _| Ok(grant(None)));
        remote
            .expect_list_playlists()
            .returning(|_| Ok(vec![playlist("p1", "Obscure")]));
        remote
            .expect_list_playlist_tracks()
            .returning(|_, _| Ok(vec![track("Nowhere"), track("Nothing")]));

        let settings = SyncSettings::default().with_global_refresh_token("global-token");
        let report = orchestrator(remote, destination.clone(), Arc::default())
            .run_pass(&settings)
            .await
            .unwrap();

        assert_eq!(
            report.user("alice").unwrap().playlists[0].status,
            PlaylistStatus::NothingMatched { total: 2 }
        );
        assert!(destination.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_refresh_token_is_not_rewritten() {
        let destination = Arc::new(FakeDestination {
            users: vec![CatalogUser::new("alice", true)],
            ..Default::default()
        });

        let mut remote = MockRemote::new();
        remote
            .expect_exchange_refresh_token()
            .returning(|_, _| Ok(grant(Some("global-token"))));
        remote.expect_list_playlists().returning(|_| Ok(vec![]));

        let secrets = Arc::new(MemorySecrets::default());
        let settings = SyncSettings::default().with_global_refresh_token("global-token");
        let report = orchestrator(remote, destination, secrets.clone())
            .run_pass(&settings)
            .await
            .unwrap();

        assert_eq!(
            report.user("alice").unwrap().rotation,
            RotationOutcome::NotRotated
        );
        assert!(secrets.data.lock().unwrap().is_empty());
    }

    #[test]
    fn test_session_debug_redacts_access_token() {
        let session = SyncSession {
            username: "alice".to_string(),
            access_token: "very-secret".to_string(),
            client: ClientCredentials::new("id", "secret"),
            credential_source: CredentialSource::User,
        };

        let debug = format!("{:?}", session);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("very-secret"));
    }
}
