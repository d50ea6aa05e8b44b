//! Multipart upload reaper.

use crate::error::SweepResult;
use crate::stats::MultipartReport;
use reaper_core::{ReaperConfig, hours_since, is_stale};
use reaper_storage::ObjectStore;
use time::OffsetDateTime;

/// Abort every multipart upload under `repository` older than the threshold.
///
/// The listing is followed to the end. Abort failures are logged and counted;
/// the pass carries on with the next upload. A failed listing ends the pass
/// with an error.
pub async fn reap_multipart_uploads(
    store: &dyn ObjectStore,
    repository: &str,
    config: &ReaperConfig,
    now: OffsetDateTime,
) -> SweepResult<MultipartReport> {
    let mut report = MultipartReport::default();
    let mut resume = None;

    loop {
        let page = store
            .list_multipart_uploads(repository, config.multipart_page_size, resume.take())
            .await?;

        tracing::info!(
            repository = %repository,
            uploads = page.uploads.len(),
            "Multipart uploads found for prefix"
        );

        for upload in &page.uploads {
            report.found += 1;

            let Some(initiated) = upload.initiated else {
                tracing::warn!(
                    key = %upload.key,
                    upload_id = %upload.upload_id,
                    "Upload has no initiation time, leaving it alone"
                );
                report.undated += 1;
                continue;
            };

            let age_hours = hours_since(initiated, now);
            tracing::info!(key = %upload.key, age_hours, "Upload started {age_hours} hours ago");

            if !is_stale(age_hours, config.cleanup_threshold_hours) {
                continue;
            }

            if config.dry_run {
                tracing::info!(
                    key = %upload.key,
                    upload_id = %upload.upload_id,
                    age_hours,
                    "DRY-RUN: Would abort multipart upload"
                );
                report.would_abort += 1;
                continue;
            }

            match store.abort_multipart_upload(upload).await {
                Ok(()) => {
                    report.aborted += 1;
                    tracing::info!(
                        key = %upload.key,
                        upload_id = %upload.upload_id,
                        "Removed multipart upload"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        key = %upload.key,
                        upload_id = %upload.upload_id,
                        error = %e,
                        "Failed to abort multipart upload"
                    );
                }
            }
        }

        match page.next {
            Some(cursor) => resume = Some(cursor),
            None => break,
        }
    }

    Ok(report)
}
