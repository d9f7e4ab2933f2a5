//! Reconciling through the Subsonic client against an in-memory server.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_sync::{PlaylistReconciler, ReconcileAction};
use provider_navidrome::NavidromeClient;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Answers `getPlaylists` and `createPlaylist` from a playlist table,
/// storing names exactly as they arrive.
#[derive(Default)]
struct MemorySubsonic {
    /// (id, name, song ids)
    playlists: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl MemorySubsonic {
    fn names(&self) -> Vec<String> {
        self.playlists
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }

    fn ok(body: serde_json::Value) -> HttpResponse {
        let mut response = json!({ "status": "ok" });
        if let (Some(target), Some(extra)) = (response.as_object_mut(), body.as_object()) {
            target.extend(extra.clone());
        }
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: json!({ "subsonic-response": response }).to_string().into(),
        }
    }
}

#[async_trait]
impl HttpClient for MemorySubsonic {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let (path, query) = request
            .url
            .split_once('?')
            .ok_or_else(|| BridgeError::OperationFailed("missing query".to_string()))?;
        let params: Vec<(String, String)> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), urlencoding::decode(v).unwrap().into_owned()))
            .collect();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        let songs: Vec<String> = params
            .iter()
            .filter(|(k, _)| k == "songId")
            .map(|(_, v)| v.clone())
            .collect();

        let mut playlists = self.playlists.lock().unwrap();
        if path.ends_with("/getPlaylists.view") {
            let entries: Vec<_> = playlists
                .iter()
                .map(|(id, name, _)| json!({ "id": id, "name": name, "owner": "admin" }))
                .collect();
            return Ok(Self::ok(json!({ "playlists": { "playlist": entries } })));
        }

        if path.ends_with("/createPlaylist.view") {
            match get("playlistId") {
                Some(id) => {
                    let entry = playlists
                        .iter_mut()
                        .find(|(existing, _, _)| *existing == id)
                        .ok_or_else(|| BridgeError::NotFound(id.clone()))?;
                    entry.2 = songs;
                }
                None => {
                    let id = format!("pl{}", playlists.len() + 1);
                    let name = get("name").unwrap_or_default();
                    playlists.push((id, name, songs));
                }
            }
            return Ok(Self::ok(json!({})));
        }

        Err(BridgeError::NotFound(path.to_string()))
    }
}

#[tokio::test]
async fn test_name_with_trailing_space_is_updated_on_second_pass() {
    let server = Arc::new(MemorySubsonic::default());
    let client = NavidromeClient::new(server.clone(), "http://nd.test", "admin", "pw");
    let reconciler = PlaylistReconciler::new(Arc::new(client));
    let ids = vec!["s1".to_string(), "s2".to_string()];

    let first = reconciler.reconcile("admin", "Roadtrip ", &ids).await.unwrap();
    let second = reconciler.reconcile("admin", "Roadtrip ", &ids).await.unwrap();

    assert_eq!(first, ReconcileAction::Created);
    assert_eq!(second, ReconcileAction::Updated);
    assert_eq!(server.names(), vec!["Roadtrip ".to_string()]);
}

#[tokio::test]
async fn test_second_reconcile_replaces_membership() {
    let server = Arc::new(MemorySubsonic::default());
    let client = NavidromeClient::new(server.clone(), "http://nd.test", "admin", "pw");
    let reconciler = PlaylistReconciler::new(Arc::new(client));

    reconciler
        .reconcile("admin", "Chill", &["s1".to_string()])
        .await
        .unwrap();
    reconciler
        .reconcile("admin", "Chill", &["s2".to_string(), "s3".to_string()])
        .await
        .unwrap();

    let playlists = server.playlists.lock().unwrap();
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists[0].2, vec!["s2".to_string(), "s3".to_string()]);
}
