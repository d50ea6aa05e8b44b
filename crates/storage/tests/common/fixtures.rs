use bytes::Bytes;
use reaper_storage::MemoryBackend;

/// Marker content in the registry's `startedat` format.
pub fn marker_body(timestamp: &str) -> Bytes {
    Bytes::from(timestamp.to_string())
}

/// Store `count` single-byte objects named `<prefix><index>` with zero-padded indices.
pub fn seed_objects(store: &MemoryBackend, prefix: &str, count: usize) {
    for i in 0..count {
        store.put(format!("{prefix}{i:05}"), vec![(i % 256) as u8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_objects_orders_keys() {
        let store = MemoryBackend::new();
        seed_objects(&store, "items/", 12);
        let keys = store.keys();
        assert_eq!(keys.len(), 12);
        assert_eq!(keys.first().map(String::as_str), Some("items/00000"));
        assert_eq!(keys.last().map(String::as_str), Some("items/00011"));
    }
}
