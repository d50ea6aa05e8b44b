//! Configuration types shared across crates.

use crate::layout::REPOSITORY_ROOT;
use serde::{Deserialize, Serialize};

/// Top-level configuration file layout.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reaper behaviour.
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// Object store client tuning.
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.reaper.validate()?;
        self.store.validate()
    }
}

/// Stale-upload cleanup configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Uploads strictly older than this many whole hours are removed (default: 12).
    #[serde(default = "default_cleanup_threshold_hours")]
    pub cleanup_threshold_hours: i64,
    /// Prefix whose first-level children are registry repositories.
    /// Must end with `/`.
    #[serde(default = "default_repository_root")]
    pub repository_root: String,
    /// Maximum multipart uploads requested per listing call (default: 1000).
    #[serde(default = "default_page_size")]
    pub multipart_page_size: usize,
    /// Object keys requested per page while scanning a repository (default: 1000).
    #[serde(default = "default_page_size")]
    pub listing_page_size: usize,
    /// Dry-run mode: report what would be removed without removing it (default: false).
    #[serde(default)]
    pub dry_run: bool,
}

fn default_cleanup_threshold_hours() -> i64 {
    crate::DEFAULT_CLEANUP_THRESHOLD_HOURS
}

fn default_repository_root() -> String {
    REPOSITORY_ROOT.to_string()
}

fn default_page_size() -> usize {
    1000 // S3 max-keys ceiling
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            cleanup_threshold_hours: default_cleanup_threshold_hours(),
            repository_root: default_repository_root(),
            multipart_page_size: default_page_size(),
            listing_page_size: default_page_size(),
            dry_run: false,
        }
    }
}

impl ReaperConfig {
    /// Validate reaper configuration for settings that would make a run unsafe.
    pub fn validate(&self) -> Result<(), String> {
        if self.cleanup_threshold_hours < 0 {
            return Err(format!(
                "reaper.cleanup_threshold_hours must not be negative (got {})",
                self.cleanup_threshold_hours
            ));
        }

        // An empty root would treat every top-level folder of the bucket as a repository.
        if self.repository_root.is_empty() || !self.repository_root.ends_with('/') {
            return Err(format!(
                "reaper.repository_root must be a non-empty prefix ending with '/' (got {:?})",
                self.repository_root
            ));
        }

        if self.multipart_page_size == 0 {
            return Err("reaper.multipart_page_size must be greater than zero".to_string());
        }

        if self.listing_page_size == 0 {
            return Err("reaper.listing_page_size must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Object store client configuration.
///
/// Region, addressing style and transport security are fixed by the backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Total attempts per store request, including the first (default: 1 = no retries).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-operation timeout in seconds (default: None = transport defaults).
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            operation_timeout_secs: None,
        }
    }
}

impl StoreConfig {
    /// Get the operation timeout as a std::time::Duration.
    pub fn operation_timeout(&self) -> Option<std::time::Duration> {
        self.operation_timeout_secs
            .map(std::time::Duration::from_secs)
    }

    /// Validate store configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("store.max_attempts must be at least 1".to_string());
        }

        if self.operation_timeout_secs == Some(0) {
            return Err("store.operation_timeout_secs must be greater than zero".to_string());
        }

        Ok(())
    }
}
