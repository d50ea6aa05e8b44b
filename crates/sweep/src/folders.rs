//! Staging folder reaper.
//!
//! The registry writes `<repo>/_uploads/<id>/startedat` when an upload begins
//! and removes the whole `<id>` folder when it is committed. Folders whose
//! marker is older than the threshold belong to clients that went away.

use crate::error::{SweepError, SweepResult};
use crate::stats::FolderReport;
use futures::StreamExt;
use reaper_core::layout::upload_id;
use reaper_core::{ReaperConfig, hours_since, is_stale, is_upload_marker, staging_folder};
use reaper_storage::{ListingOptions, ObjectStore, StorageError};
use time::OffsetDateTime;

/// Read a marker and return the whole hours elapsed since the time it records.
pub async fn marker_age(store: &dyn ObjectStore, key: &str, now: OffsetDateTime) -> SweepResult<i64> {
    let body = store.get(key).await?;
    let started = reaper_core::parse_marker_timestamp(&body).map_err(|source| {
        SweepError::MarkerParse {
            key: key.to_string(),
            source,
        }
    })?;
    Ok(hours_since(started, now))
}

/// Delete stale staging folders under `repository`.
///
/// Every object under the repository is scanned page by page. Failures tied
/// to a single marker are logged and counted, and the scan moves on. A failed
/// page fetch ends the pass with an error.
pub async fn reap_upload_folders(
    store: &dyn ObjectStore,
    repository: &str,
    config: &ReaperConfig,
    now: OffsetDateTime,
) -> SweepResult<FolderReport> {
    let mut report = FolderReport::default();
    let mut pages = store.list_pages(
        repository,
        ListingOptions::new(config.listing_page_size),
        None,
    );

    while let Some(page) = pages.next().await {
        let page = page?;
        report.pages_scanned += 1;
        report.objects_scanned += page.keys.len() as u64;

        for key in page.keys.iter().filter(|key| is_upload_marker(key)) {
            report.markers_found += 1;
            reap_marker(store, key, config, now, &mut report).await;
        }
    }

    tracing::info!(
        repository = %repository,
        pages = report.pages_scanned,
        objects = report.objects_scanned,
        markers = report.markers_found,
        folders_removed = report.folders_removed,
        "Finished scanning upload folders"
    );

    Ok(report)
}

async fn reap_marker(
    store: &dyn ObjectStore,
    key: &str,
    config: &ReaperConfig,
    now: OffsetDateTime,
    report: &mut FolderReport,
) {
    let Some(folder) = staging_folder(key) else {
        tracing::warn!(key = %key, "Marker is not inside an upload folder, skipping");
        report.skipped_malformed += 1;
        return;
    };

    let age_hours = match marker_age(store, key, now).await {
        Ok(age) => age,
        Err(SweepError::Storage(StorageError::NotFound(_))) => {
            tracing::warn!(key = %key, "Marker disappeared before it could be read, skipping");
            report.skipped_missing += 1;
            return;
        }
        Err(e @ SweepError::MarkerParse { .. }) => {
            tracing::error!(key = %key, error = %e, "Unreadable marker timestamp, skipping");
            report.skipped_unparseable += 1;
            return;
        }
        Err(e) => {
            tracing::error!(key = %key, error = %e, "Failed to read marker, skipping");
            report.errors += 1;
            return;
        }
    };

    tracing::info!(
        folder = %folder,
        upload_id = upload_id(key).unwrap_or_default(),
        age_hours,
        "Upload folder started {age_hours} hours ago"
    );

    if !is_stale(age_hours, config.cleanup_threshold_hours) {
        report.skipped_fresh += 1;
        return;
    }

    // The trailing slash keeps `<id>` from matching a sibling such as `<id>123`.
    let folder_prefix = format!("{folder}/");
    let keys = match store.list(&folder_prefix).await {
        Ok(keys) => keys,
        Err(e) => {
            tracing::error!(folder = %folder, error = %e, "Failed to list upload folder, skipping");
            report.errors += 1;
            return;
        }
    };

    if config.dry_run {
        tracing::info!(
            folder = %folder,
            objects = keys.len(),
            age_hours,
            "DRY-RUN: Would delete stale upload folder"
        );
        report.would_remove += 1;
        return;
    }

    let mut failed = false;
    for object in &keys {
        match store.delete(object).await {
            Ok(()) => {
                report.objects_deleted += 1;
                tracing::info!(key = %object, "Deleted");
            }
            Err(e) => {
                failed = true;
                report.errors += 1;
                tracing::error!(key = %object, error = %e, "Failed to delete object");
            }
        }
    }

    if !failed {
        report.folders_removed += 1;
        tracing::info!(folder = %folder, objects = keys.len(), "Removed stale upload folder");
    }
}
