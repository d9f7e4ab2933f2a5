//! NaviSync CLI - mirrors Spotify playlists into Navidrome.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use bridge_desktop::{
    default_settings_path, KeyringSecureStore, ReqwestHttpClient, SqliteSettingsStore,
    TokioBackgroundExecutor,
};
use bridge_traits::{
    background::BackgroundExecutor, error::BridgeError, storage::SettingsStore,
};
use clap::{Parser, Subcommand};
use core_runtime::config::{load_raw, SETTING_KEYS};
use core_runtime::logging::{init_logging, parse_log_level, redact_if_sensitive, LoggingConfig};
use core_service::{NaviSyncService, ServiceDependencies};
use core_sync::{PlaylistStatus, SyncReport, UserStatus, SYNC_CALLBACK_TAG};
use tracing::info;

#[derive(Parser)]
#[command(name = "navisync")]
#[command(version)]
#[command(about = "Mirror Spotify playlists into Navidrome")]
#[command(after_long_help = r#"CONFIGURATION
    Settings live in a SQLite database (see --db) and are edited with
    `navisync config set`. Every setting can be overridden with a
    NAVISYNC_<KEY> environment variable, e.g. NAVISYNC_PLAYLISTS_FILTER.

    Per-user refresh tokens are kept in the OS keychain:
        $ navisync credentials set alice <refresh-token>
"#)]
struct Cli {
    /// Settings database path
    #[arg(long, global = true, env = "NAVISYNC_DB")]
    db: Option<PathBuf>,

    /// Log output format: pretty, json or compact
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    /// Minimum log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule recurring syncs and run until interrupted
    Run,
    /// Run one sync pass and print a summary
    Sync,
    /// Exchange the global refresh token and ping Navidrome
    TestConnection,
    /// Inspect or edit settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage per-user Spotify refresh tokens
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Store a setting
    Set { key: String, value: String },
    /// Remove a setting
    Unset { key: String },
    /// Print every setting, secrets redacted
    Show,
}

#[derive(Subcommand)]
enum CredentialsAction {
    /// Store a user's refresh token
    Set {
        username: String,
        refresh_token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(
        LoggingConfig::default()
            .with_format(cli.log_format.parse()?)
            .with_level(parse_log_level(&cli.log_level)?),
    )?;

    let db_path = cli.db.clone().unwrap_or_else(default_settings_path);
    let settings_store: Arc<dyn SettingsStore> = Arc::new(
        SqliteSettingsStore::new(db_path.clone())
            .await
            .with_context(|| format!("opening settings database {}", db_path.display()))?,
    );

    if let Commands::Config { action } = &cli.command {
        return run_config(settings_store.as_ref(), action).await;
    }

    let executor = Arc::new(TokioBackgroundExecutor::new());
    let deps = ServiceDependencies::new(
        Arc::new(ReqwestHttpClient::new()?),
        Arc::new(KeyringSecureStore::new()),
        settings_store,
        executor.clone(),
    )
    .with_env_overrides(true);
    let service = NaviSyncService::new(deps);

    match cli.command {
        Commands::Run => run_daemon(service, executor).await,
        Commands::Sync => {
            let report = service.run_sync_pass().await?;
            print_report(&report);
            if report.has_failures() {
                bail!("sync pass finished with failures");
            }
            Ok(())
        }
        Commands::TestConnection => {
            service.test_connection().await?;
            println!("Connection OK");
            Ok(())
        }
        Commands::Credentials {
            action:
                CredentialsAction::Set {
                    username,
                    refresh_token,
                },
        } => {
            service.store_refresh_token(&username, &refresh_token).await?;
            println!("Stored refresh token for {}", username);
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

async fn run_daemon(
    service: NaviSyncService,
    executor: Arc<TokioBackgroundExecutor>,
) -> anyhow::Result<()> {
    let handler_service = service.clone();
    executor
        .register_task_handler(SYNC_CALLBACK_TAG, move || {
            let service = handler_service.clone();
            async move {
                service
                    .on_callback(SYNC_CALLBACK_TAG)
                    .await
                    .map_err(|e| BridgeError::OperationFailed(e.to_string()))
            }
        })
        .await?;

    let task_id = service.on_init().await?;
    info!(task_id = %task_id.as_str(), "NaviSync running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    executor.cancel_task(&task_id).await?;
    info!("Shutting down");
    Ok(())
}

async fn run_config(store: &dyn SettingsStore, action: &ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            ensure_known_key(key)?;
            store.set_string(key, value).await?;
            println!("{} = {}", key, redact_if_sensitive(key, value));
        }
        ConfigAction::Unset { key } => {
            ensure_known_key(key)?;
            store.delete(key).await?;
            println!("{} removed", key);
        }
        ConfigAction::Show => {
            let raw = load_raw(store).await?;
            for key in SETTING_KEYS {
                let value = raw.get(*key).map(String::as_str).unwrap_or_default();
                println!("{} = {}", key, redact_if_sensitive(key, value));
            }
        }
    }
    Ok(())
}

fn ensure_known_key(key: &str) -> anyhow::Result<()> {
    if !SETTING_KEYS.contains(&key) {
        bail!(
            "unknown setting '{}' (expected one of: {})",
            key,
            SETTING_KEYS.join(", ")
        );
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    for user in &report.users {
        match &user.status {
            UserStatus::Completed => println!("{}", user.username),
            UserStatus::Skipped { reason } => {
                println!("{} (skipped: {})", user.username, reason);
                continue;
            }
        }

        for playlist in &user.playlists {
            let detail = match &playlist.status {
                PlaylistStatus::Reconciled {
                    action,
                    matched,
                    unmatched,
                } => format!("{}, {} matched, {} unmatched", action, matched, unmatched),
                PlaylistStatus::NothingMatched { total } => {
                    format!("no match among {} tracks", total)
                }
                PlaylistStatus::Filtered => "filtered".to_string(),
                PlaylistStatus::DuplicateName => "duplicate name".to_string(),
                PlaylistStatus::FetchFailed { error } => format!("fetch failed: {}", error),
                PlaylistStatus::ReconcileFailed { error } => format!("write failed: {}", error),
            };
            println!("  {}: {}", playlist.name, detail);
        }
    }

    println!(
        "{} users, {} completed, {} skipped, {} playlists synced",
        report.users_attempted(),
        report.users_completed(),
        report.users_skipped(),
        report.playlists_reconciled()
    );
}
