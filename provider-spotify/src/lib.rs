//! # Spotify Provider
//!
//! Implements the `RemoteCatalog` trait for the Spotify Web API.
//!
//! ## Overview
//!
//! This module provides:
//! - Refresh-token exchange against the Spotify accounts service
//! - Paginated listing of the current user's playlists
//! - Paginated listing of playlist tracks with ISRC and primary artist
//! - Bounded retry on rate limiting (HTTP 429)

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{SpotifyConnector, SPOTIFY_API_BASE};
pub use error::{Result, SpotifyError};
