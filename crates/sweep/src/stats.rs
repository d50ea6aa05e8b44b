//! Per-pass reports and run totals.

use std::ops::AddAssign;

/// Outcome of the multipart pass over one repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultipartReport {
    /// Uploads listed under the repository.
    pub found: u64,
    /// Uploads aborted because they were older than the threshold.
    pub aborted: u64,
    /// Stale uploads whose abort failed.
    pub failed: u64,
    /// Uploads the store reported without an initiation time.
    pub undated: u64,
    /// Stale uploads left in place because of dry run.
    pub would_abort: u64,
}

/// Outcome of the staging folder pass over one repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderReport {
    pub pages_scanned: u64,
    pub objects_scanned: u64,
    pub markers_found: u64,
    /// Stale folders whose every object was deleted.
    pub folders_removed: u64,
    pub objects_deleted: u64,
    pub skipped_fresh: u64,
    pub skipped_missing: u64,
    pub skipped_unparseable: u64,
    /// Markers whose key does not sit in a proper `_uploads/<id>` folder.
    pub skipped_malformed: u64,
    /// Per-marker read, list and delete failures.
    pub errors: u64,
    /// Stale folders left in place because of dry run.
    pub would_remove: u64,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub repositories: u64,
    pub multipart: MultipartReport,
    pub folders: FolderReport,
}

impl SweepStats {
    /// Multipart uploads aborted so far.
    pub fn uploads_removed(&self) -> u64 {
        self.multipart.aborted
    }

    /// Stale staging folders removed so far.
    pub fn folders_removed(&self) -> u64 {
        self.folders.folders_removed
    }

    /// Per-item failures across both passes.
    pub fn errors(&self) -> u64 {
        self.multipart.failed + self.folders.errors
    }
}

impl AddAssign for MultipartReport {
    fn add_assign(&mut self, other: Self) {
        self.found += other.found;
        self.aborted += other.aborted;
        self.failed += other.failed;
        self.undated += other.undated;
        self.would_abort += other.would_abort;
    }
}

impl AddAssign for FolderReport {
    fn add_assign(&mut self, other: Self) {
        self.pages_scanned += other.pages_scanned;
        self.objects_scanned += other.objects_scanned;
        self.markers_found += other.markers_found;
        self.folders_removed += other.folders_removed;
        self.objects_deleted += other.objects_deleted;
        self.skipped_fresh += other.skipped_fresh;
        self.skipped_missing += other.skipped_missing;
        self.skipped_unparseable += other.skipped_unparseable;
        self.skipped_malformed += other.skipped_malformed;
        self.errors += other.errors;
        self.would_remove += other.would_remove;
    }
}

impl AddAssign<MultipartReport> for SweepStats {
    fn add_assign(&mut self, report: MultipartReport) {
        self.multipart += report;
    }
}

impl AddAssign<FolderReport> for SweepStats {
    fn add_assign(&mut self, report: FolderReport) {
        self.folders += report;
    }
}
