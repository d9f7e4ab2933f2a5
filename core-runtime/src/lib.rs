//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync engine:
//! - Logging and tracing infrastructure
//! - Settings resolution and validation
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions and the typed view of the host
//! settings used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{NavidromeSettings, PlaylistFilter, SyncSchedule, SyncSettings};
pub use error::{Error, Result};
