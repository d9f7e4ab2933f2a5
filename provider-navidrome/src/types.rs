//! Subsonic API response types
//!
//! Every JSON response is wrapped in a `subsonic-response` object carrying
//! `status` and, on failure, an `error { code, message }`.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
pub struct SubsonicEnvelope {
    #[serde(rename = "subsonic-response")]
    pub response: SubsonicResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicResponse {
    pub status: String,
    #[serde(default)]
    pub error: Option<SubsonicErrorBody>,
    #[serde(default)]
    pub users: Option<UsersBody>,
    #[serde(default)]
    pub search_result3: Option<SearchResult3>,
    #[serde(default)]
    pub playlists: Option<PlaylistsBody>,
    #[serde(default)]
    pub playlist: Option<PlaylistEntry>,
}

impl SubsonicResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Deserialize)]
pub struct SubsonicErrorBody {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersBody {
    #[serde(default, deserialize_with = "one_or_many")]
    pub user: Vec<SubsonicUser>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicUser {
    pub username: String,
    #[serde(default)]
    pub admin_role: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResult3 {
    #[serde(default, deserialize_with = "one_or_many")]
    pub song: Vec<Song>,
}

/// Song child entry.
///
/// `isrc` is an OpenSubsonic extension: a list of codes, absent on plain
/// Subsonic servers.
#[derive(Debug, Clone, Deserialize)]
pub struct Song {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub isrc: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistsBody {
    #[serde(default, deserialize_with = "one_or_many")]
    pub playlist: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Accept a JSON array, a single object, or null/absent.
fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}
