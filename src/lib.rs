//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `navisync-workspace` and
//! enable `desktop-shims` to get the sync service wired with the desktop
//! bridges, without naming each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{NaviSyncService, ServiceDependencies};
