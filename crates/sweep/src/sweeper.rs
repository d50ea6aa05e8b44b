//! Run orchestration over every repository in the bucket.

use crate::error::{SweepError, SweepResult};
use crate::folders::reap_upload_folders;
use crate::multipart::reap_multipart_uploads;
use crate::stats::SweepStats;
use reaper_core::ReaperConfig;
use reaper_storage::ObjectStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

/// Drives both reapers across every repository under the configured root.
pub struct Sweeper {
    store: Arc<dyn ObjectStore>,
    config: ReaperConfig,
}

impl Sweeper {
    pub fn new(store: Arc<dyn ObjectStore>, config: ReaperConfig) -> Self {
        Self { store, config }
    }

    /// Sweep the bucket using the current time.
    pub async fn run(&self) -> SweepResult<SweepStats> {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    /// Sweep the bucket, measuring ages against `now`.
    ///
    /// Listing the repositories is all-or-nothing: a failed or truncated
    /// listing ends the run before anything is touched.
    #[instrument(skip(self), fields(backend = self.store.backend_name(), dry_run = self.config.dry_run))]
    pub async fn run_at(&self, now: OffsetDateTime) -> SweepResult<SweepStats> {
        self.config.validate().map_err(SweepError::Config)?;

        let store = self.store.as_ref();
        let repositories = store
            .list_common_prefixes(&self.config.repository_root)
            .await?;

        let mut stats = SweepStats::default();

        for (index, repository) in repositories.iter().enumerate() {
            tracing::info!(index, prefix = %repository, "Prefix {index}: {repository}");

            stats += reap_multipart_uploads(store, repository, &self.config, now).await?;
            stats += reap_upload_folders(store, repository, &self.config, now).await?;
            stats.repositories += 1;

            tracing::info!(
                repositories = stats.repositories,
                uploads_removed = stats.uploads_removed(),
                folders_removed = stats.folders_removed(),
                errors = stats.errors(),
                "Running total"
            );
        }

        Ok(stats)
    }
}
