//! Object key conventions written by the registry's S3 storage driver.
//!
//! ```text
//! docker/registry/v2/repositories/<name>/_uploads/<upload-id>/startedat
//! docker/registry/v2/repositories/<name>/_uploads/<upload-id>/data
//! docker/registry/v2/repositories/<name>/_uploads/<upload-id>/hashstates/...
//! ```

/// Root under which every repository lives. Listing it with a `/` delimiter
/// yields one common prefix per repository.
pub const REPOSITORY_ROOT: &str = "docker/registry/v2/repositories/";

/// Path segment that introduces a repository's upload staging area.
pub const UPLOADS_SEGMENT: &str = "/_uploads/";

/// File name of the marker object recording when an upload began.
pub const MARKER_FILENAME: &str = "startedat";

/// Returns true if `key` names an upload marker object.
///
/// A marker lives somewhere below an `/_uploads/` segment and its final path
/// segment is `startedat`. Keys matching only one of the two conditions are
/// ordinary objects.
pub fn is_upload_marker(key: &str) -> bool {
    key.contains(UPLOADS_SEGMENT)
        && key
            .rsplit_once('/')
            .is_some_and(|(_, file)| file == MARKER_FILENAME)
}

/// Derive the staging folder prefix of an upload marker.
///
/// The folder is the marker key with its final path segment dropped, e.g.
/// `.../app/_uploads/abc123/startedat` becomes `.../app/_uploads/abc123`.
///
/// Returns `None` for keys that are not markers, and for markers whose parent
/// is not a proper `<repo>/_uploads/<id>` folder. Deleting everything under
/// such a prefix would reach outside a single upload.
pub fn staging_folder(marker_key: &str) -> Option<&str> {
    if !is_upload_marker(marker_key) {
        return None;
    }

    let (folder, _) = marker_key.rsplit_once('/')?;
    let segment_at = folder.rfind(UPLOADS_SEGMENT)?;
    let upload_part = &folder[segment_at + UPLOADS_SEGMENT.len()..];

    // Need a repository before `/_uploads/` and a non-empty upload id after it.
    if segment_at == 0 || upload_part.is_empty() || upload_part.split('/').any(str::is_empty) {
        return None;
    }

    Some(folder)
}

/// Upload identifier of a marker, i.e. the last segment of its staging folder.
pub fn upload_id(marker_key: &str) -> Option<&str> {
    staging_folder(marker_key)
        .and_then(|folder| folder.rsplit_once('/'))
        .map(|(_, id)| id)
}
