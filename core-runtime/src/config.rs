//! # Sync Configuration Module
//!
//! Resolves the NaviSync settings into a typed [`SyncSettings`] value.
//!
//! ## Overview
//!
//! Settings live as string key/value pairs in a host
//! [`SettingsStore`](bridge_traits::storage::SettingsStore). They are read
//! once at the start of a pass, validated fail-fast and handed to the
//! orchestrator and clients by reference; nothing below this module reads a
//! setting by name.
//!
//! ## Keys
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `sync_interval` | Schedule expression | `0 */6 * * *` |
//! | `spotify_client_id` / `spotify_client_secret` | Client identity for the token exchange | empty |
//! | `spotify_refresh_token` | Global fallback refresh token | none |
//! | `playlists_filter` | Comma-separated allow-list of playlist names | all playlists |
//! | `test_connection` / `manual_sync` | One-shot trigger flags | `false` |
//! | `navidrome_url`, `navidrome_username`, `navidrome_password` | Destination server | none |
//! | `navidrome_accounts` | Extra destination accounts, `user:password,...` | none |
//! | `rate_limit_max_retries` / `rate_limit_backoff_secs` | 429 retry policy | `5` / `5` |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SyncSettings;
//!
//! let settings = SyncSettings::resolve(settings_store.as_ref()).await?;
//! if settings.playlist_filter.allows("Roadtrip") {
//!     // ...
//! }
//! ```

use crate::error::{Error, Result};
use bridge_traits::{catalog::ClientCredentials, http::RateLimitPolicy, storage::SettingsStore};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

pub const KEY_SYNC_INTERVAL: &str = "sync_interval";
pub const KEY_CLIENT_ID: &str = "spotify_client_id";
pub const KEY_CLIENT_SECRET: &str = "spotify_client_secret";
pub const KEY_REFRESH_TOKEN: &str = "spotify_refresh_token";
pub const KEY_PLAYLISTS_FILTER: &str = "playlists_filter";
pub const KEY_TEST_CONNECTION: &str = "test_connection";
pub const KEY_MANUAL_SYNC: &str = "manual_sync";
pub const KEY_NAVIDROME_URL: &str = "navidrome_url";
pub const KEY_NAVIDROME_USERNAME: &str = "navidrome_username";
pub const KEY_NAVIDROME_PASSWORD: &str = "navidrome_password";
pub const KEY_NAVIDROME_ACCOUNTS: &str = "navidrome_accounts";
pub const KEY_RATE_LIMIT_MAX_RETRIES: &str = "rate_limit_max_retries";
pub const KEY_RATE_LIMIT_BACKOFF_SECS: &str = "rate_limit_backoff_secs";

/// Every key [`SyncSettings`] understands, in display order.
pub const SETTING_KEYS: &[&str] = &[
    KEY_SYNC_INTERVAL,
    KEY_CLIENT_ID,
    KEY_CLIENT_SECRET,
    KEY_REFRESH_TOKEN,
    KEY_PLAYLISTS_FILTER,
    KEY_TEST_CONNECTION,
    KEY_MANUAL_SYNC,
    KEY_NAVIDROME_URL,
    KEY_NAVIDROME_USERNAME,
    KEY_NAVIDROME_PASSWORD,
    KEY_NAVIDROME_ACCOUNTS,
    KEY_RATE_LIMIT_MAX_RETRIES,
    KEY_RATE_LIMIT_BACKOFF_SECS,
];

/// Six-hour cadence.
pub const DEFAULT_SYNC_INTERVAL: &str = "0 */6 * * *";

/// Prefix of environment variables that override stored settings.
pub const ENV_PREFIX: &str = "NAVISYNC_";

// ============================================================================
// Schedule
// ============================================================================

/// A schedule expression resolved to a fixed interval.
///
/// Accepted forms:
/// - `@hourly`, `@daily` / `@midnight`
/// - `@every <n><s|m|h|d>`
/// - five-field cron whose cadence is a single step or fixed field:
///   `*/N * * * *`, `* * * * *`, `M */N * * *`, `M * * * *`,
///   `M H */N * *`, `M H * * *` (month and weekday must be `*`)
///
/// The fixed minute/hour fields set the phase in cron; only the cadence is
/// kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSchedule {
    expression: String,
    interval: Duration,
}

impl SyncSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let expression = if expression.is_empty() {
            DEFAULT_SYNC_INTERVAL
        } else {
            expression
        };

        let interval = if let Some(macro_name) = expression.strip_prefix('@') {
            Self::parse_macro(macro_name)?
        } else {
            Self::parse_cron(expression)?
        };

        Ok(Self {
            expression: expression.to_string(),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn parse_macro(name: &str) -> Result<Duration> {
        match name.trim() {
            "hourly" => Ok(Duration::from_secs(3600)),
            "daily" | "midnight" => Ok(Duration::from_secs(86_400)),
            other => match other.strip_prefix("every") {
                Some(rest) => Self::parse_every(rest.trim()),
                None => Err(unsupported_schedule(name)),
            },
        }
    }

    fn parse_every(expr: &str) -> Result<Duration> {
        let split = expr
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| unsupported_schedule(expr))?;
        let (amount, unit) = expr.split_at(split);
        let amount: u64 = amount.parse().map_err(|_| unsupported_schedule(expr))?;
        if amount == 0 {
            return Err(Error::Config(format!(
                "Schedule interval must be positive: @every {}",
                expr
            )));
        }

        let unit_secs = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86_400,
            _ => return Err(unsupported_schedule(expr)),
        };

        Ok(Duration::from_secs(amount.saturating_mul(unit_secs)))
    }

    fn parse_cron(expression: &str) -> Result<Duration> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(Error::Config(format!(
                "Cron expression must have five fields: {}",
                expression
            )));
        };

        if *month != "*" || *weekday != "*" {
            return Err(unsupported_schedule(expression));
        }

        let minutes = match (*minute, *hour, *day) {
            (m, "*", "*") if m == "*" => 1,
            (m, "*", "*") if m.starts_with("*/") => step(m, 59, expression)?,
            (m, "*", "*") => {
                fixed(m, 59, expression)?;
                60
            }
            (m, h, "*") if h.starts_with("*/") => {
                fixed(m, 59, expression)?;
                step(h, 23, expression)? * 60
            }
            (m, h, "*") => {
                fixed(m, 59, expression)?;
                fixed(h, 23, expression)?;
                24 * 60
            }
            (m, h, d) if d.starts_with("*/") => {
                fixed(m, 59, expression)?;
                fixed(h, 23, expression)?;
                step(d, 31, expression)? * 24 * 60
            }
            _ => return Err(unsupported_schedule(expression)),
        };

        Ok(Duration::from_secs(minutes * 60))
    }
}

impl Default for SyncSchedule {
    fn default() -> Self {
        Self {
            expression: DEFAULT_SYNC_INTERVAL.to_string(),
            interval: Duration::from_secs(6 * 3600),
        }
    }
}

fn step(field: &str, max: u64, expression: &str) -> Result<u64> {
    let value = field
        .strip_prefix("*/")
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| unsupported_schedule(expression))?;
    if value == 0 || value > max {
        return Err(Error::Config(format!(
            "Step {} out of range 1..={} in {}",
            field, max, expression
        )));
    }
    Ok(value)
}

fn fixed(field: &str, max: u64, expression: &str) -> Result<u64> {
    match field.parse::<u64>() {
        Ok(value) if value <= max => Ok(value),
        _ => Err(unsupported_schedule(expression)),
    }
}

fn unsupported_schedule(expression: &str) -> Error {
    Error::Config(format!(
        "Unsupported schedule expression '{}': use @hourly, @daily, @every <n><s|m|h|d> \
         or a cron expression with a single step field",
        expression
    ))
}

// ============================================================================
// Playlist allow-list
// ============================================================================

/// Allow-list of playlist names.
///
/// Entries and playlist names are both trimmed before comparing; matching
/// is otherwise exact and case-sensitive. An empty filter allows every
/// playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistFilter {
    names: BTreeSet<String>,
}

impl PlaylistFilter {
    /// Parse a comma-separated list, ignoring blank entries.
    pub fn parse(raw: &str) -> Self {
        Self {
            names: raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn allows(&self, playlist_name: &str) -> bool {
        self.names.is_empty() || self.names.contains(playlist_name.trim())
    }
}

// ============================================================================
// Destination server
// ============================================================================

/// Connection settings for the destination media server.
#[derive(Clone, PartialEq, Eq)]
pub struct NavidromeSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Additional `(username, password)` accounts the client may act as.
    pub extra_accounts: Vec<(String, String)>,
}

impl fmt::Debug for NavidromeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accounts: Vec<&str> = self
            .extra_accounts
            .iter()
            .map(|(user, _)| user.as_str())
            .collect();
        f.debug_struct("NavidromeSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("extra_accounts", &accounts)
            .finish()
    }
}

fn parse_accounts(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (user, password) = entry.split_once(':').ok_or_else(|| {
                Error::Config(format!(
                    "{} entries must look like user:password",
                    KEY_NAVIDROME_ACCOUNTS
                ))
            })?;
            let user = user.trim();
            if user.is_empty() {
                return Err(Error::Config(format!(
                    "{} contains an entry without a username",
                    KEY_NAVIDROME_ACCOUNTS
                )));
            }
            Ok((user.to_string(), password.to_string()))
        })
        .collect()
}

// ============================================================================
// Settings
// ============================================================================

/// Resolved sync configuration.
#[derive(Clone)]
pub struct SyncSettings {
    pub schedule: SyncSchedule,
    pub client: ClientCredentials,
    /// Refresh token used for users without one of their own.
    pub global_refresh_token: Option<String>,
    pub playlist_filter: PlaylistFilter,
    pub test_connection: bool,
    pub manual_sync: bool,
    pub navidrome: Option<NavidromeSettings>,
    pub rate_limit: RateLimitPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            schedule: SyncSchedule::default(),
            client: ClientCredentials::default(),
            global_refresh_token: None,
            playlist_filter: PlaylistFilter::default(),
            test_connection: false,
            manual_sync: false,
            navidrome: None,
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("schedule", &self.schedule)
            .field("client", &self.client)
            .field(
                "global_refresh_token",
                &self.global_refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("playlist_filter", &self.playlist_filter)
            .field("test_connection", &self.test_connection)
            .field("manual_sync", &self.manual_sync)
            .field("navidrome", &self.navidrome)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl SyncSettings {
    /// Read every known key from the store and resolve them.
    pub async fn resolve(store: &dyn SettingsStore) -> Result<Self> {
        Self::from_pairs(load_raw(store).await?)
    }

    /// Like [`resolve`](Self::resolve), with `NAVISYNC_<KEY>` environment
    /// variables taking precedence over stored values.
    pub async fn resolve_with_env(store: &dyn SettingsStore) -> Result<Self> {
        let mut raw = load_raw(store).await?;
        raw.extend(env_overrides(std::env::vars()));
        Self::from_pairs(raw)
    }

    /// Resolve from raw key/value pairs. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let raw: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| raw.get(key).map(|v| v.trim()).unwrap_or_default();

        let schedule = SyncSchedule::parse(get(KEY_SYNC_INTERVAL))?;
        let client = ClientCredentials::new(get(KEY_CLIENT_ID), get(KEY_CLIENT_SECRET));
        let global_refresh_token = Some(get(KEY_REFRESH_TOKEN))
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        let navidrome = match get(KEY_NAVIDROME_URL) {
            "" => None,
            url => Some(NavidromeSettings {
                url: url.trim_end_matches('/').to_string(),
                username: get(KEY_NAVIDROME_USERNAME).to_string(),
                password: raw
                    .get(KEY_NAVIDROME_PASSWORD)
                    .cloned()
                    .unwrap_or_default(),
                extra_accounts: parse_accounts(get(KEY_NAVIDROME_ACCOUNTS))?,
            }),
        };

        let defaults = RateLimitPolicy::default();
        let max_retries = parse_number(KEY_RATE_LIMIT_MAX_RETRIES, get(KEY_RATE_LIMIT_MAX_RETRIES))?
            .unwrap_or(defaults.max_retries);
        let backoff = parse_number(KEY_RATE_LIMIT_BACKOFF_SECS, get(KEY_RATE_LIMIT_BACKOFF_SECS))?
            .map(Duration::from_secs)
            .unwrap_or(defaults.backoff);

        let settings = Self {
            schedule,
            client,
            global_refresh_token,
            playlist_filter: PlaylistFilter::parse(get(KEY_PLAYLISTS_FILTER)),
            test_connection: parse_flag(KEY_TEST_CONNECTION, get(KEY_TEST_CONNECTION))?,
            manual_sync: parse_flag(KEY_MANUAL_SYNC, get(KEY_MANUAL_SYNC))?,
            navidrome,
            rate_limit: RateLimitPolicy {
                max_retries,
                backoff,
                max_backoff: defaults.max_backoff.max(backoff),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validates cross-field constraints.
    ///
    /// Missing client credentials are not a configuration error; they fail
    /// the token exchange for each user instead.
    pub fn validate(&self) -> Result<()> {
        if let Some(navidrome) = &self.navidrome {
            if !(navidrome.url.starts_with("http://") || navidrome.url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL",
                    KEY_NAVIDROME_URL
                )));
            }
            if navidrome.username.is_empty() || navidrome.password.is_empty() {
                return Err(Error::Config(format!(
                    "{} requires {} and {}",
                    KEY_NAVIDROME_URL, KEY_NAVIDROME_USERNAME, KEY_NAVIDROME_PASSWORD
                )));
            }
        }

        if self.rate_limit.max_retries > 100 {
            return Err(Error::Config(format!(
                "{} exceeds the maximum of 100",
                KEY_RATE_LIMIT_MAX_RETRIES
            )));
        }

        Ok(())
    }

    pub fn with_playlist_filter(mut self, raw: &str) -> Self {
        self.playlist_filter = PlaylistFilter::parse(raw);
        self
    }

    pub fn with_client(mut self, client: ClientCredentials) -> Self {
        self.client = client;
        self
    }

    pub fn with_global_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.global_refresh_token = Some(token.into());
        self
    }

    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }
}

/// Read every known key from the store.
pub async fn load_raw(store: &dyn SettingsStore) -> Result<HashMap<String, String>> {
    let mut raw = HashMap::new();
    for key in SETTING_KEYS {
        let value = store
            .get_string(key)
            .await
            .map_err(|e| Error::Config(format!("Failed to read setting {}: {}", key, e)))?;
        if let Some(value) = value {
            raw.insert(key.to_string(), value);
        }
    }
    Ok(raw)
}

/// Pick `NAVISYNC_<KEY>` overrides out of an environment listing.
pub fn env_overrides<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let key = name.strip_prefix(ENV_PREFIX)?.to_ascii_lowercase();
            SETTING_KEYS
                .iter()
                .find(|known| **known == key)
                .map(|known| (known.to_string(), value))
        })
        .collect()
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(Error::Config(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer", key)))
}
