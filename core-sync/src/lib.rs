//! # Sync Module
//!
//! Mirrors each user's remote playlists into the destination media server.
//!
//! ## Overview
//!
//! One sync pass walks every destination user in sequence:
//! - Resolves the user's refresh token and exchanges it for an access token
//! - Lists the user's remote playlists, applying the optional allow-list
//! - Resolves each remote track to a destination track id
//! - Creates or replaces the same-named destination playlist
//!
//! A failure local to one user or playlist is recorded and the pass moves
//! on; only failing to enumerate users aborts it.
//!
//! ## Components
//!
//! - **Track Matcher** (`matcher`): ISRC, exact and substring matching
//! - **Playlist Reconciler** (`reconcile`): create-or-replace by name
//! - **Sync Orchestrator** (`orchestrator`): the per-user state machine
//! - **Sync Report** (`report`): outcome of a pass and its log summary
//! - **Scheduler Callback** (`callback`): payload tags delivered by the host scheduler

pub mod callback;
pub mod error;
pub mod matcher;
pub mod orchestrator;
pub mod reconcile;
pub mod report;

pub use callback::{SchedulerCallback, SYNC_CALLBACK_TAG};
pub use error::{Result, SyncError};
pub use matcher::{select_candidate, MatchKind, TrackMatch, TrackMatcher};
pub use orchestrator::{SyncOrchestrator, SyncSession};
pub use reconcile::{PlaylistReconciler, ReconcileAction};
pub use report::{
    PlaylistOutcome, PlaylistStatus, RotationOutcome, SyncReport, SyncRunId, UserOutcome,
    UserStatus,
};
