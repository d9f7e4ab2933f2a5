//! Settings resolution against a real settings store

use bridge_desktop::SqliteSettingsStore;
use bridge_traits::storage::SettingsStore;
use core_runtime::config::{self, SyncSettings};
use std::time::Duration;

#[tokio::test]
async fn test_resolve_from_empty_store_uses_defaults() {
    let store = SqliteSettingsStore::in_memory().await.unwrap();

    let settings = SyncSettings::resolve(&store).await.unwrap();

    assert_eq!(settings.schedule.expression(), config::DEFAULT_SYNC_INTERVAL);
    assert!(settings.playlist_filter.is_empty());
    assert!(settings.navidrome.is_none());
    assert!(!settings.manual_sync);
}

#[tokio::test]
async fn test_resolve_reads_stored_values() {
    let store = SqliteSettingsStore::in_memory().await.unwrap();
    store
        .set_string(config::KEY_SYNC_INTERVAL, "@every 2h")
        .await
        .unwrap();
    store
        .set_string(config::KEY_PLAYLISTS_FILTER, "Roadtrip, Chill")
        .await
        .unwrap();
    store
        .set_string(config::KEY_CLIENT_ID, "client")
        .await
        .unwrap();
    store
        .set_string(config::KEY_CLIENT_SECRET, "secret")
        .await
        .unwrap();
    store
        .set_string("unrelated_key", "ignored")
        .await
        .unwrap();

    let settings = SyncSettings::resolve(&store).await.unwrap();

    assert_eq!(settings.schedule.interval(), Duration::from_secs(7200));
    assert!(settings.client.is_complete());
    assert!(settings.playlist_filter.allows("Chill"));
    assert!(!settings.playlist_filter.allows("Workout"));
}

#[tokio::test]
async fn test_resolve_rejects_malformed_flag() {
    let store = SqliteSettingsStore::in_memory().await.unwrap();
    store
        .set_string(config::KEY_TEST_CONNECTION, "sometimes")
        .await
        .unwrap();

    let err = SyncSettings::resolve(&store).await.unwrap_err();
    assert!(err.to_string().contains(config::KEY_TEST_CONNECTION));
}
