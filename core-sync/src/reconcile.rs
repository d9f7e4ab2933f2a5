//! # Playlist Reconciler
//!
//! Writes a resolved track list into the destination playlist with the same
//! name, creating it when the user has none. Membership is replaced in full,
//! so reconciling an unchanged list twice leaves the playlist as it was.

use bridge_traits::catalog::DestinationCatalog;
use bridge_traits::error::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// What the reconciler did to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileAction::Created => write!(f, "created"),
            ReconcileAction::Updated => write!(f, "updated"),
        }
    }
}

#[derive(Clone)]
pub struct PlaylistReconciler {
    destination: Arc<dyn DestinationCatalog>,
}

impl PlaylistReconciler {
    pub fn new(destination: Arc<dyn DestinationCatalog>) -> Self {
        Self { destination }
    }

    /// Create-if-absent by name, otherwise replace the membership in place.
    ///
    /// Names compare exactly; the first playlist with the name wins when the
    /// user already owns several.
    #[instrument(skip(self, track_ids), fields(tracks = track_ids.len()))]
    pub async fn reconcile(
        &self,
        username: &str,
        name: &str,
        track_ids: &[String],
    ) -> Result<ReconcileAction> {
        let existing = self
            .destination
            .get_playlists(username)
            .await?
            .into_iter()
            .find(|playlist| playlist.name == name);

        let existing_id = existing.as_ref().map(|playlist| playlist.id.as_str());
        self.destination
            .create_or_update_playlist(username, name, existing_id, track_ids)
            .await?;

        let action = match existing_id {
            Some(_) => ReconcileAction::Updated,
            None => ReconcileAction::Created,
        };
        debug!(%action, "Playlist reconciled");
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::catalog::{CatalogUser, DestinationPlaylist, DestinationTrack};
    use bridge_traits::error::Result as BridgeResult;
    use std::sync::Mutex;

    /// In-memory destination holding playlists for a single user.
    #[derive(Default)]
    struct MemoryDestination {
        playlists: Mutex<Vec<(DestinationPlaylist, Vec<String>)>>,
    }

    #[async_trait]
    impl DestinationCatalog for MemoryDestination {
        async fn list_users(&self) -> BridgeResult<Vec<CatalogUser>> {
            Ok(vec![])
        }

        async fn search_tracks(
            &self,
            _username: &str,
            _query: &str,
            _isrc: Option<&str>,
        ) -> BridgeResult<Vec<DestinationTrack>> {
            Ok(vec![])
        }

        async fn get_playlists(&self, _username: &str) -> BridgeResult<Vec<DestinationPlaylist>> {
            Ok(self
                .playlists
                .lock()
                .unwrap()
                .iter()
                .map(|(playlist, _)| playlist.clone())
                .collect())
        }

        async fn create_or_update_playlist(
            &self,
            _username: &str,
            name: &str,
            existing_id: Option<&str>,
            track_ids: &[String],
        ) -> BridgeResult<()> {
            let mut playlists = self.playlists.lock().unwrap();
            match existing_id {
                Some(id) => {
                    if let Some(entry) = playlists.iter_mut().find(|(p, _)| p.id == id) {
                        entry.1 = track_ids.to_vec();
                    }
                }
                None => {
                    let id = format!("pl{}", playlists.len() + 1);
                    playlists.push((
                        DestinationPlaylist {
                            id,
                            name: name.to_string(),
                        },
                        track_ids.to_vec(),
                    ));
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_create_then_update_is_idempotent() {
        let destination = Arc::new(MemoryDestination::default());
        let reconciler = PlaylistReconciler::new(destination.clone());
        let ids = vec!["s1".to_string(), "s2".to_string()];

        let first = reconciler.reconcile("alice", "Roadtrip", &ids).await.unwrap();
        let second = reconciler.reconcile("alice", "Roadtrip", &ids).await.unwrap();

        assert_eq!(first, ReconcileAction::Created);
        assert_eq!(second, ReconcileAction::Updated);

        let playlists = destination.playlists.lock().unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].1, ids);
    }

    #[tokio::test]
    async fn test_update_replaces_membership() {
        let destination = Arc::new(MemoryDestination::default());
        let reconciler = PlaylistReconciler::new(destination.clone());

        reconciler
            .reconcile("alice", "Chill", &["old".to_string()])
            .await
            .unwrap();
        reconciler
            .reconcile("alice", "Chill", &["new".to_string()])
            .await
            .unwrap();

        assert_eq!(
            destination.playlists.lock().unwrap()[0].1,
            vec!["new".to_string()]
        );
    }

    #[tokio::test]
    async fn test_name_match_is_exact() {
        let destination = Arc::new(MemoryDestination::default());
        let reconciler = PlaylistReconciler::new(destination.clone());

        reconciler
            .reconcile("alice", "Chill", &["a".to_string()])
            .await
            .unwrap();
        let action = reconciler
            .reconcile("alice", "chill", &["b".to_string()])
            .await
            .unwrap();

        assert_eq!(action, ReconcileAction::Created);
        assert_eq!(destination.playlists.lock().unwrap().len(), 2);
    }
}
