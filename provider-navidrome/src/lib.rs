//! # Navidrome Provider
//!
//! Implements the `DestinationCatalog` trait over the Subsonic REST API
//! exposed by Navidrome.
//!
//! ## Overview
//!
//! - Token authentication (`t = md5(password + salt)`) per request
//! - Acting as several server accounts: the configured primary account plus
//!   any extra `user:password` accounts
//! - Library search with optional ISRC narrowing (OpenSubsonic `isrc` field)
//! - Playlist creation and in-place membership replacement

pub mod client;
pub mod error;
pub mod types;

pub use client::NavidromeClient;
pub use error::{NavidromeError, Result};
