//! # Host Bridge Traits
//!
//! Abstraction traits between the NaviSync core and the host it runs in.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync engine and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that a host provides (a desktop daemon, or a media
//! server plugin runtime).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with transport retry
//!
//! ### Catalogs
//! - [`RemoteCatalog`](catalog::RemoteCatalog) - Source streaming service (token exchange, paginated listings)
//! - [`DestinationCatalog`](catalog::DestinationCatalog) - Target media server (users, search, playlists)
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Per-user refresh token persistence
//! - [`SettingsStore`](storage::SettingsStore) - Key-value configuration storage
//!
//! ### Platform Integration
//! - [`BackgroundExecutor`](background::BackgroundExecutor) - Recurring sync scheduling
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should convert their own errors into it, keeping the distinction between
//! authentication, throttling, remote and decode failures.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support usage across
//! async tasks.

pub mod background;
pub mod catalog;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{BackgroundExecutor, TaskId, TaskStatus};
pub use catalog::{
    CatalogUser, ClientCredentials, DestinationCatalog, DestinationPlaylist, DestinationTrack,
    RemoteCatalog, RemotePlaylist, RemoteTrack, TokenGrant,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RateLimitPolicy, RetryPolicy};
pub use storage::{SecureStore, SettingsStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
