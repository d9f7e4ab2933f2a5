use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to enumerate users: {0}")]
    UserEnumeration(#[source] BridgeError),

    #[error("No usable credential for {username}: {source}")]
    CredentialLookup {
        username: String,
        #[source]
        source: AuthError,
    },

    #[error("Token refresh failed for {username}: {source}")]
    TokenRefresh {
        username: String,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to list playlists for {username}: {source}")]
    PlaylistEnumeration {
        username: String,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to fetch tracks of '{playlist}' for {username}: {source}")]
    TrackFetch {
        username: String,
        playlist: String,
        #[source]
        source: BridgeError,
    },

    #[error("Search for '{title}' by '{artist}' failed: {source}")]
    TrackSearch {
        title: String,
        artist: String,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to reconcile '{playlist}' for {username}: {source}")]
    Reconcile {
        username: String,
        playlist: String,
        #[source]
        source: BridgeError,
    },

    #[error("Failed to persist rotated token for {username}: {source}")]
    Persist {
        username: String,
        #[source]
        source: AuthError,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
