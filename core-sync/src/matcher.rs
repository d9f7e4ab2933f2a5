//! # Track Matcher
//!
//! Resolves a remote track to a track id in the destination library.
//!
//! Priority, first hit wins:
//! 1. ISRC-constrained search, first result
//! 2. Title search, exact title and artist (case-insensitive, trimmed)
//! 3. Title search, substring containment either way on both fields
//! 4. No match

use bridge_traits::catalog::{DestinationCatalog, DestinationTrack, RemoteTrack};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, SyncError};

/// How a track was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Isrc,
    Exact,
    Substring,
}

/// A resolved destination track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMatch {
    pub track_id: String,
    pub kind: MatchKind,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn loosely_equal(a: &str, b: &str) -> bool {
    a == b || (!a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a)))
}

/// Pick the best title-search candidate for `remote`.
///
/// An exact title and artist match anywhere in `candidates` beats an
/// earlier substring match. Empty fields only ever match by equality.
pub fn select_candidate<'a>(
    remote: &RemoteTrack,
    candidates: &'a [DestinationTrack],
) -> Option<(&'a DestinationTrack, MatchKind)> {
    let title = normalize(&remote.title);
    let artist = normalize(&remote.artist);

    let normalized: Vec<(String, String)> = candidates
        .iter()
        .map(|c| (normalize(&c.title), normalize(&c.artist)))
        .collect();

    if let Some(index) = normalized
        .iter()
        .position(|(t, a)| *t == title && *a == artist)
    {
        return Some((&candidates[index], MatchKind::Exact));
    }

    normalized
        .iter()
        .position(|(t, a)| loosely_equal(t, &title) && loosely_equal(a, &artist))
        .map(|index| (&candidates[index], MatchKind::Substring))
}

/// Searches the destination catalog on behalf of one user.
#[derive(Clone)]
pub struct TrackMatcher {
    destination: Arc<dyn DestinationCatalog>,
}

impl TrackMatcher {
    pub fn new(destination: Arc<dyn DestinationCatalog>) -> Self {
        Self { destination }
    }

    /// Resolve one remote track. `Ok(None)` means no candidate qualified.
    pub async fn resolve(&self, username: &str, track: &RemoteTrack) -> Result<Option<TrackMatch>> {
        let search_error = |source| SyncError::TrackSearch {
            title: track.title.clone(),
            artist: track.artist.clone(),
            source,
        };

        if let Some(isrc) = track.isrc.as_deref().filter(|isrc| !isrc.trim().is_empty()) {
            let hits = self
                .destination
                .search_tracks(username, &track.title, Some(isrc))
                .await
                .map_err(search_error)?;

            if let Some(hit) = hits.into_iter().next() {
                debug!(isrc, track_id = %hit.id, "Matched by ISRC");
                return Ok(Some(TrackMatch {
                    track_id: hit.id,
                    kind: MatchKind::Isrc,
                }));
            }
        }

        if track.title.trim().is_empty() {
            return Ok(None);
        }

        let candidates = self
            .destination
            .search_tracks(username, &track.title, None)
            .await
            .map_err(search_error)?;

        Ok(select_candidate(track, &candidates).map(|(hit, kind)| TrackMatch {
            track_id: hit.id.clone(),
            kind,
        }))
    }
}
