//! Sync service façade and lifecycle entry points.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage, settings, scheduling) into the sync engine and exposes the
//! lifecycle a host drives:
//!
//! - [`NaviSyncService::on_init`] registers the recurring sync task and
//!   evaluates the one-shot trigger flags
//! - [`NaviSyncService::on_callback`] handles a scheduler invocation
//! - [`NaviSyncService::run_sync_pass`] and
//!   [`NaviSyncService::test_connection`] back the CLI commands
//!
//! Settings are resolved fresh for every entry point, so changes made
//! between runs take effect without a restart. Desktop hosts enable the
//! `desktop-shims` feature for the `navisync` binary.

pub mod error;

pub use error::{Result, ServiceError};

use std::sync::Arc;

use bridge_traits::{
    background::{BackgroundExecutor, TaskId},
    catalog::{DestinationCatalog, RemoteCatalog},
    http::HttpClient,
    storage::{SecureStore, SettingsStore},
    time::{Clock, SystemClock},
};
use core_auth::{AuthError, CredentialStore};
use core_runtime::config::{SyncSettings, KEY_NAVIDROME_URL};
use core_sync::{SchedulerCallback, SyncOrchestrator, SyncReport, SYNC_CALLBACK_TAG};
use provider_navidrome::NavidromeClient;
use provider_spotify::SpotifyConnector;
use tracing::{debug, error, info, instrument, warn};

/// Aggregated handle to all bridge dependencies the service requires.
///
/// Catalog overrides replace the Spotify and Navidrome clients that are
/// otherwise built from the resolved settings.
pub struct ServiceDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub background_executor: Arc<dyn BackgroundExecutor>,
    pub clock: Arc<dyn Clock>,
    pub remote_catalog: Option<Arc<dyn RemoteCatalog>>,
    pub destination_catalog: Option<Arc<dyn DestinationCatalog>>,
    /// Apply `NAVISYNC_<KEY>` environment overrides when resolving settings
    pub env_overrides: bool,
}

impl ServiceDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        settings_store: Arc<dyn SettingsStore>,
        background_executor: Arc<dyn BackgroundExecutor>,
    ) -> Self {
        Self {
            http_client,
            secure_store,
            settings_store,
            background_executor,
            clock: Arc::new(SystemClock),
            remote_catalog: None,
            destination_catalog: None,
            env_overrides: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_remote_catalog(mut self, catalog: Arc<dyn RemoteCatalog>) -> Self {
        self.remote_catalog = Some(catalog);
        self
    }

    pub fn with_destination_catalog(mut self, catalog: Arc<dyn DestinationCatalog>) -> Self {
        self.destination_catalog = Some(catalog);
        self
    }

    pub fn with_env_overrides(mut self, enabled: bool) -> Self {
        self.env_overrides = enabled;
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct NaviSyncService {
    deps: Arc<ServiceDependencies>,
}

impl NaviSyncService {
    /// Create a new service from the provided dependencies.
    pub fn new(deps: ServiceDependencies) -> Self {
        Self {
            deps: Arc::new(deps),
        }
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<ServiceDependencies> {
        Arc::clone(&self.deps)
    }

    /// Resolve the current settings.
    pub async fn settings(&self) -> Result<SyncSettings> {
        let store = self.deps.settings_store.as_ref();
        let settings = if self.deps.env_overrides {
            SyncSettings::resolve_with_env(store).await?
        } else {
            SyncSettings::resolve(store).await?
        };
        Ok(settings)
    }

    /// Register the recurring sync task, then run any one-shot triggers.
    ///
    /// Trigger failures are logged and do not fail initialization.
    #[instrument(skip(self))]
    pub async fn on_init(&self) -> Result<TaskId> {
        let settings = self.settings().await?;

        info!(
            schedule = %settings.schedule.expression(),
            interval_secs = settings.schedule.interval().as_secs(),
            "Scheduling Spotify sync"
        );
        let task_id = self
            .deps
            .background_executor
            .schedule_task(SYNC_CALLBACK_TAG, settings.schedule.interval())
            .await
            .map_err(ServiceError::Scheduler)?;

        self.run_triggers(&settings).await;
        Ok(task_id)
    }

    /// Handle a scheduler invocation carrying `payload`.
    ///
    /// Unknown payloads are logged and acknowledged.
    #[instrument(skip(self))]
    pub async fn on_callback(&self, payload: &str) -> Result<()> {
        match SchedulerCallback::parse(payload) {
            SchedulerCallback::Sync => {
                self.run_sync_pass().await?;
                Ok(())
            }
            SchedulerCallback::Unknown(tag) => {
                warn!(payload = %tag, "Ignoring unknown scheduler callback");
                Ok(())
            }
        }
    }

    /// Run one full sync pass with freshly resolved settings.
    pub async fn run_sync_pass(&self) -> Result<SyncReport> {
        let settings = self.settings().await?;
        self.sync_with(&settings).await
    }

    /// Exchange the global refresh token and, when configured, ping the
    /// destination server. Nothing is written.
    pub async fn test_connection(&self) -> Result<()> {
        let settings = self.settings().await?;
        self.test_connection_with(&settings).await
    }

    /// Store a user's refresh token in secure storage.
    pub async fn store_refresh_token(&self, username: &str, refresh_token: &str) -> Result<()> {
        self.credentials()
            .set(username, refresh_token)
            .await
            .map_err(ServiceError::from)
    }

    fn credentials(&self) -> CredentialStore {
        CredentialStore::new(Arc::clone(&self.deps.secure_store))
    }

    async fn run_triggers(&self, settings: &SyncSettings) {
        if settings.test_connection {
            info!("Testing Spotify connection");
            match self.test_connection_with(settings).await {
                Ok(()) => info!("Connection test succeeded"),
                Err(e) => error!(error = %e, "Connection test failed"),
            }
        }

        if settings.manual_sync {
            info!("Triggering manual sync");
            match self.sync_with(settings).await {
                Ok(_) => info!("Manual sync finished"),
                Err(e) => error!(error = %e, "Manual sync failed"),
            }
        }
    }

    async fn sync_with(&self, settings: &SyncSettings) -> Result<SyncReport> {
        let orchestrator = SyncOrchestrator::new(
            self.remote_catalog(settings),
            self.destination_catalog(settings)?,
            self.credentials(),
            Arc::clone(&self.deps.clock),
        );

        let report = orchestrator.run_pass(settings).await?;
        report.log_summary();
        Ok(report)
    }

    async fn test_connection_with(&self, settings: &SyncSettings) -> Result<()> {
        let refresh_token = settings
            .global_refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;

        self.remote_catalog(settings)
            .exchange_refresh_token(refresh_token, &settings.client)
            .await?;
        info!("Obtained Spotify access token");

        if let Some(destination) = &self.deps.destination_catalog {
            destination.list_users().await?;
        } else if let Some(navidrome) = &settings.navidrome {
            NavidromeClient::from_settings(Arc::clone(&self.deps.http_client), navidrome)
                .ping()
                .await?;
            info!(url = %navidrome.url, "Navidrome reachable");
        } else {
            debug!("Navidrome not configured, skipping ping");
        }

        Ok(())
    }

    fn remote_catalog(&self, settings: &SyncSettings) -> Arc<dyn RemoteCatalog> {
        match &self.deps.remote_catalog {
            Some(catalog) => Arc::clone(catalog),
            None => Arc::new(
                SpotifyConnector::new(Arc::clone(&self.deps.http_client))
                    .with_rate_limit(settings.rate_limit.clone()),
            ),
        }
    }

    fn destination_catalog(&self, settings: &SyncSettings) -> Result<Arc<dyn DestinationCatalog>> {
        if let Some(catalog) = &self.deps.destination_catalog {
            return Ok(Arc::clone(catalog));
        }

        let navidrome = settings
            .navidrome
            .as_ref()
            .ok_or_else(|| core_runtime::Error::missing_setting(KEY_NAVIDROME_URL, "Sync"))?;
        Ok(Arc::new(NavidromeClient::from_settings(
            Arc::clone(&self.deps.http_client),
            navidrome,
        )))
    }
}
