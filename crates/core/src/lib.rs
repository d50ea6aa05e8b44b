//! Core domain types and shared logic for the registry upload reaper.
//!
//! This crate defines what the other crates agree on:
//! - Registry key layout (repository root, upload markers, staging folders)
//! - Upload age evaluation and the staleness rule
//! - Run configuration

pub mod age;
pub mod config;
pub mod error;
pub mod layout;

pub use age::{format_marker_timestamp, hours_since, is_stale, parse_marker_timestamp};
pub use config::{AppConfig, ReaperConfig, StoreConfig};
pub use error::{Error, Result};
pub use layout::{REPOSITORY_ROOT, is_upload_marker, staging_folder};

/// Default cleanup threshold: 12 hours.
pub const DEFAULT_CLEANUP_THRESHOLD_HOURS: i64 = 12;
