//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the `keyring` crate
//! - `SettingsStore` using a SQLite-backed key-value store
//! - `BackgroundExecutor` using Tokio timers
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let settings = SqliteSettingsStore::new("navisync.db".into()).await?;
//!     // Hand both to the sync service
//!     Ok(())
//! }
//! ```

mod background;
mod http;
mod settings;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use background::TokioBackgroundExecutor;
pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;

/// Default location of the settings database.
///
/// Resolves to the platform data directory (for example
/// `~/.local/share/navisync/settings.db` on Linux), falling back to the
/// working directory when none is known.
pub fn default_settings_path() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("navisync"))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("settings.db")
}
