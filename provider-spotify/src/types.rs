//! Spotify Web API response types
//!
//! Only the fields a sync pass reads are modelled; everything else in the
//! payloads is ignored. Names are optional because Spotify sends explicit
//! `null` for some unavailable items.

use serde::Deserialize;

/// One page of a paginated listing.
pub trait Page {
    type Item;

    /// Items of this page and the absolute URL of the next one.
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

/// `GET /v1/me/playlists` page
///
/// See: https://developer.spotify.com/documentation/web-api/reference/get-a-list-of-current-users-playlists
#[derive(Debug, Deserialize)]
pub struct PlaylistsPage {
    #[serde(default)]
    pub items: Vec<Option<SimplifiedPlaylist>>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedPlaylist {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Page for PlaylistsPage {
    type Item = SimplifiedPlaylist;

    fn into_parts(self) -> (Vec<SimplifiedPlaylist>, Option<String>) {
        (self.items.into_iter().flatten().collect(), self.next)
    }
}

/// `GET /v1/playlists/{id}/tracks` page
#[derive(Debug, Deserialize)]
pub struct PlaylistTracksPage {
    #[serde(default)]
    pub items: Vec<PlaylistTrackItem>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistTrackItem {
    /// Null for removed or unavailable items
    #[serde(default)]
    pub track: Option<TrackObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackObject {
    /// Null for local files
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub album: Option<AlbumObject>,
    #[serde(default)]
    pub external_ids: Option<ExternalIds>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub isrc: Option<String>,
}

impl Page for PlaylistTracksPage {
    type Item = TrackObject;

    fn into_parts(self) -> (Vec<TrackObject>, Option<String>) {
        (
            self.items.into_iter().filter_map(|item| item.track).collect(),
            self.next,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_page_skips_null_tracks() {
        let json = r#"{
            "items": [
                {"track": {"id": "t1", "name": "Song", "artists": [{"name": "A"}, {"name": "B"}],
                           "album": {"name": "LP"}, "external_ids": {"isrc": "USRC1"}}},
                {"track": null},
                {"track": {"id": null, "name": "Local file"}}
            ],
            "next": null
        }"#;

        let page: PlaylistTracksPage = serde_json::from_str(json).unwrap();
        let (tracks, next) = page.into_parts();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artists[0].name.as_deref(), Some("A"));
        assert!(tracks[1].id.is_none());
        assert!(tracks[1].artists.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_playlists_page_with_next() {
        let json = r#"{
            "items": [{"id": "p1", "name": "Roadtrip", "public": true}, null],
            "next": "https://api.spotify.com/v1/me/playlists?offset=50&limit=50"
        }"#;

        let page: PlaylistsPage = serde_json::from_str(json).unwrap();
        let (playlists, next) = page.into_parts();

        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].name.as_deref(), Some("Roadtrip"));
        assert!(next.unwrap().contains("offset=50"));
    }

    #[test]
    fn test_null_names_decode_as_missing() {
        let json = r#"{
            "items": [
                {"track": {"id": "t1", "name": null, "artists": [{"name": null}],
                           "album": {"name": null}}},
                {"track": {"id": "t2", "name": "Song"}}
            ],
            "next": null
        }"#;

        let page: PlaylistTracksPage = serde_json::from_str(json).unwrap();
        let (tracks, _) = page.into_parts();

        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].name.is_none());
        assert!(tracks[0].artists[0].name.is_none());
        assert_eq!(tracks[1].name.as_deref(), Some("Song"));

        let playlists: PlaylistsPage =
            serde_json::from_str(r#"{"items": [{"id": "p1", "name": null}]}"#).unwrap();
        assert!(playlists.into_parts().0[0].name.is_none());
    }
}
