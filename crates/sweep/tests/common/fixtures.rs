use reaper_core::format_marker_timestamp;
use reaper_storage::MemoryBackend;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

pub const ROOT: &str = "docker/registry/v2/repositories/";

/// Fixed clock for every sweep in these tests.
pub const NOW: OffsetDateTime = datetime!(2024-06-01 12:00:00 UTC);

pub fn hours_ago(hours: i64) -> OffsetDateTime {
    NOW - Duration::hours(hours)
}

/// Repository prefix as returned by the delimited root listing.
pub fn repository(name: &str) -> String {
    format!("{ROOT}{name}/")
}

/// Marker key for an upload in a repository.
pub fn marker(name: &str, upload: &str) -> String {
    format!("{ROOT}{name}/_uploads/{upload}/startedat")
}

/// Write a staging folder with a marker started `age_hours` ago, a data
/// object and a hash state. Returns the folder's keys.
pub fn seed_upload_folder(
    store: &MemoryBackend,
    name: &str,
    upload: &str,
    age_hours: i64,
) -> Vec<String> {
    let folder = format!("{ROOT}{name}/_uploads/{upload}");
    let started = format_marker_timestamp(hours_ago(age_hours)).unwrap();
    let keys = vec![
        format!("{folder}/data"),
        format!("{folder}/hashstates/sha256/0"),
        format!("{folder}/startedat"),
    ];
    store.put(keys[0].clone(), "partial blob");
    store.put(keys[1].clone(), "hash state");
    store.put(keys[2].clone(), started);
    keys
}
