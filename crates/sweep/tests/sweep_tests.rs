mod common;

use common::{FailingStore, NOW, ROOT, hours_ago, marker, repository, seed_upload_folder};
use reaper_core::ReaperConfig;
use reaper_storage::{MemoryBackend, StorageError};
use reaper_sweep::{SweepError, Sweeper};
use std::sync::Arc;

/// Two repositories, each with one stale and one fresh upload of both kinds.
fn registry() -> Arc<MemoryBackend> {
    let store = Arc::new(MemoryBackend::new());
    for name in ["alpine", "library"] {
        let repo = repository(name);
        store.start_multipart_upload(format!("{repo}_uploads/old/data"), hours_ago(20));
        store.start_multipart_upload(format!("{repo}_uploads/new/data"), hours_ago(5));
        seed_upload_folder(&store, name, "old", 20);
        seed_upload_folder(&store, name, "new", 5);
        store.put(format!("{repo}_layers/sha256/abc/link"), "sha256:abc");
    }
    store
}

#[tokio::test]
async fn test_sweep_visits_every_repository() {
    let store = registry();
    let sweeper = Sweeper::new(store.clone(), ReaperConfig::default());

    let stats = sweeper.run_at(NOW).await.unwrap();

    assert_eq!(stats.repositories, 2);
    assert_eq!(stats.uploads_removed(), 2);
    assert_eq!(stats.multipart.found, 4);
    assert_eq!(stats.folders_removed(), 2);
    assert_eq!(stats.folders.objects_deleted, 6);
    assert_eq!(stats.errors(), 0);

    assert_eq!(store.multipart_uploads().len(), 2);
    for name in ["alpine", "library"] {
        assert!(!store.contains(&marker(name, "old")));
        assert!(store.contains(&marker(name, "new")));
        assert!(store.contains(&format!("{ROOT}{name}/_layers/sha256/abc/link")));
    }
}

#[tokio::test]
async fn test_second_run_removes_nothing() {
    let store = registry();
    let sweeper = Sweeper::new(store.clone(), ReaperConfig::default());

    sweeper.run_at(NOW).await.unwrap();
    let keys_after_first = store.keys();

    let stats = sweeper.run_at(NOW).await.unwrap();

    assert_eq!(stats.uploads_removed(), 0);
    assert_eq!(stats.folders_removed(), 0);
    assert_eq!(stats.folders.objects_deleted, 0);
    assert_eq!(store.keys(), keys_after_first);
}

#[tokio::test]
async fn test_ancient_marker_is_removed() {
    let store = Arc::new(MemoryBackend::new());
    let folder = format!("{ROOT}app/_uploads/abc123");
    store.put(format!("{folder}/startedat"), "2020-01-01T00:00:00Z");
    store.put(format!("{folder}/data"), "partial");
    store.put(format!("{folder}/hashstates/sha256/0"), "state");

    let stats = Sweeper::new(store.clone(), ReaperConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(stats.folders_removed(), 1);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_truncated_repository_listing_is_fatal() {
    let store = registry();
    let before = store.keys();
    let uploads_before = store.multipart_uploads();

    let truncating = Arc::new(
        Arc::try_unwrap(store)
            .unwrap_or_else(|_| panic!("store is shared"))
            .with_common_prefix_limit(1),
    );
    let result = Sweeper::new(truncating.clone(), ReaperConfig::default())
        .run_at(NOW)
        .await;

    match result {
        Err(SweepError::Storage(StorageError::Truncated { prefix, .. })) => {
            assert_eq!(prefix, ROOT)
        }
        other => panic!("expected truncation, got {other:?}"),
    }
    assert_eq!(truncating.keys(), before);
    assert_eq!(truncating.multipart_uploads(), uploads_before);
}

#[tokio::test]
async fn test_per_item_failures_do_not_stop_the_run() {
    let memory = registry();
    let store = Arc::new(
        FailingStore::new(memory.clone())
            .failing_abort(format!("{}_uploads/old/data", repository("alpine")))
            .failing_get(marker("alpine", "old")),
    );

    let stats = Sweeper::new(store, ReaperConfig::default())
        .run_at(NOW)
        .await
        .unwrap();

    assert_eq!(stats.repositories, 2);
    assert_eq!(stats.uploads_removed(), 1);
    assert_eq!(stats.multipart.failed, 1);
    assert_eq!(stats.folders_removed(), 1);
    assert_eq!(stats.errors(), 2);
    assert!(memory.contains(&marker("alpine", "old")));
    assert!(!memory.contains(&marker("library", "old")));
}

#[tokio::test]
async fn test_dry_run_reports_without_removing() {
    let store = registry();
    let before = store.keys();
    let config = ReaperConfig {
        dry_run: true,
        ..Default::default()
    };

    let stats = Sweeper::new(store.clone(), config).run_at(NOW).await.unwrap();

    assert_eq!(stats.uploads_removed(), 0);
    assert_eq!(stats.folders_removed(), 0);
    assert_eq!(stats.multipart.would_abort, 2);
    assert_eq!(stats.folders.would_remove, 2);
    assert_eq!(store.keys(), before);
    assert_eq!(store.multipart_uploads().len(), 4);
}

#[tokio::test]
async fn test_custom_repository_root() {
    let store = Arc::new(MemoryBackend::new());
    store.start_multipart_upload("mirror/repositories/app/_uploads/u1/data", hours_ago(30));
    store.start_multipart_upload(format!("{ROOT}app/_uploads/u1/data"), hours_ago(30));

    let config = ReaperConfig {
        repository_root: "mirror/repositories/".to_string(),
        ..Default::default()
    };
    let stats = Sweeper::new(store.clone(), config).run_at(NOW).await.unwrap();

    // The multipart uploads alone create no objects, so no repository is listed.
    assert_eq!(stats.repositories, 0);
    assert_eq!(store.multipart_uploads().len(), 2);

    store.put("mirror/repositories/app/_layers/link", "x");
    let config = ReaperConfig {
        repository_root: "mirror/repositories/".to_string(),
        ..Default::default()
    };
    let stats = Sweeper::new(store.clone(), config).run_at(NOW).await.unwrap();

    assert_eq!(stats.repositories, 1);
    assert_eq!(stats.uploads_removed(), 1);
    let remaining = store.multipart_uploads();
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].key.starts_with(ROOT));
}
