//! # Sync Report
//!
//! Outcome of one sync pass, built by the orchestrator and consumed by
//! [`SyncReport::log_summary`] and the CLI.

use chrono::{DateTime, Utc};
use core_auth::CredentialSource;
use std::fmt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::reconcile::ReconcileAction;

/// Unique identifier for a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStatus {
    Completed,
    Skipped { reason: String },
}

/// What happened to a refresh token the remote service rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    NotRotated,
    Persisted,
    PersistFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistStatus {
    Reconciled {
        action: ReconcileAction,
        matched: usize,
        unmatched: usize,
    },
    /// No track resolved; the destination was left untouched
    NothingMatched { total: usize },
    /// Excluded by the allow-list
    Filtered,
    /// Another remote playlist with this name was already handled
    DuplicateName,
    FetchFailed { error: String },
    ReconcileFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistOutcome {
    pub remote_id: String,
    pub name: String,
    pub status: PlaylistStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOutcome {
    pub username: String,
    pub status: UserStatus,
    /// `None` when no credential could be resolved
    pub credential_source: Option<CredentialSource>,
    pub rotation: RotationOutcome,
    pub playlists: Vec<PlaylistOutcome>,
}

impl UserOutcome {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            status: UserStatus::Completed,
            credential_source: None,
            rotation: RotationOutcome::NotRotated,
            playlists: Vec::new(),
        }
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.status = UserStatus::Skipped {
            reason: reason.into(),
        };
        self
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, UserStatus::Skipped { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: SyncRunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub users: Vec<UserOutcome>,
}

impl SyncReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: SyncRunId::new(),
            started_at,
            finished_at: None,
            users: Vec::new(),
        }
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    pub fn user(&self, username: &str) -> Option<&UserOutcome> {
        self.users.iter().find(|user| user.username == username)
    }

    pub fn users_attempted(&self) -> usize {
        self.users.len()
    }

    pub fn users_completed(&self) -> usize {
        self.users.iter().filter(|user| !user.is_skipped()).count()
    }

    pub fn users_skipped(&self) -> usize {
        self.users.iter().filter(|user| user.is_skipped()).count()
    }

    pub fn playlists_reconciled(&self) -> usize {
        self.playlists()
            .filter(|playlist| matches!(playlist.status, PlaylistStatus::Reconciled { .. }))
            .count()
    }

    /// Whether any user or playlist failed.
    pub fn has_failures(&self) -> bool {
        self.users_skipped() > 0
            || self.users.iter().any(|user| {
                matches!(user.rotation, RotationOutcome::PersistFailed { .. })
            })
            || self.playlists().any(|playlist| {
                matches!(
                    playlist.status,
                    PlaylistStatus::FetchFailed { .. } | PlaylistStatus::ReconcileFailed { .. }
                )
            })
    }

    fn playlists(&self) -> impl Iterator<Item = &PlaylistOutcome> {
        self.users.iter().flat_map(|user| user.playlists.iter())
    }

    /// Emit one log event per outcome and a closing summary.
    pub fn log_summary(&self) {
        for user in &self.users {
            for playlist in &user.playlists {
                log_playlist(&user.username, playlist);
            }

            match &user.status {
                UserStatus::Completed => info!(
                    run_id = %self.run_id,
                    username = %user.username,
                    playlists = user.playlists.len(),
                    "User sync completed"
                ),
                UserStatus::Skipped { reason } => warn!(
                    run_id = %self.run_id,
                    username = %user.username,
                    reason = %reason,
                    "User skipped"
                ),
            }

            if let RotationOutcome::PersistFailed { error } = &user.rotation {
                error!(
                    username = %user.username,
                    error = %error,
                    "Rotated refresh token could not be stored"
                );
            }
        }

        let duration_ms = self
            .finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or_default();

        info!(
            run_id = %self.run_id,
            users_attempted = self.users_attempted(),
            users_completed = self.users_completed(),
            users_skipped = self.users_skipped(),
            playlists_reconciled = self.playlists_reconciled(),
            duration_ms,
            "Sync pass finished"
        );
    }
}

fn log_playlist(username: &str, playlist: &PlaylistOutcome) {
    match &playlist.status {
        PlaylistStatus::Reconciled {
            action,
            matched,
            unmatched,
        } => info!(
            username,
            playlist = %playlist.name,
            %action,
            matched,
            unmatched,
            "Playlist synced"
        ),
        PlaylistStatus::NothingMatched { total } => info!(
            username,
            playlist = %playlist.name,
            total,
            "No tracks matched, playlist left untouched"
        ),
        PlaylistStatus::Filtered => warn!(
            username,
            playlist = %playlist.name,
            "Playlist not in allow-list"
        ),
        PlaylistStatus::DuplicateName => warn!(
            username,
            playlist = %playlist.name,
            "Duplicate playlist name in this pass, skipped"
        ),
        PlaylistStatus::FetchFailed { error } => error!(
            username,
            playlist = %playlist.name,
            error = %error,
            "Failed to fetch playlist tracks"
        ),
        PlaylistStatus::ReconcileFailed { error } => error!(
            username,
            playlist = %playlist.name,
            error = %error,
            "Failed to write destination playlist"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(name: &str, status: PlaylistStatus) -> PlaylistOutcome {
        PlaylistOutcome {
            remote_id: format!("id-{}", name),
            name: name.to_string(),
            status,
        }
    }

    #[test]
    fn test_counters() {
        let mut report = SyncReport::new(Utc::now());

        let mut alice = UserOutcome::new("alice");
        alice.playlists.push(playlist(
            "Roadtrip",
            PlaylistStatus::Reconciled {
                action: ReconcileAction::Created,
                matched: 1,
                unmatched: 1,
            },
        ));
        alice.playlists.push(playlist("Chill", PlaylistStatus::Filtered));
        report.users.push(alice);
        report.users.push(UserOutcome::new("bob").skipped("no credential"));
        report.finish(Utc::now());

        assert_eq!(report.users_attempted(), 2);
        assert_eq!(report.users_completed(), 1);
        assert_eq!(report.users_skipped(), 1);
        assert_eq!(report.playlists_reconciled(), 1);
        assert!(report.has_failures());
        assert!(report.user("bob").unwrap().is_skipped());

        report.log_summary();
    }

    #[test]
    fn test_clean_report() {
        let mut report = SyncReport::new(Utc::now());
        let mut alice = UserOutcome::new("alice");
        alice.playlists.push(playlist(
            "Empty",
            PlaylistStatus::NothingMatched { total: 3 },
        ));
        report.users.push(alice);

        assert!(!report.has_failures());
        assert_eq!(report.playlists_reconciled(), 0);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(SyncRunId::new(), SyncRunId::new());
    }
}
