//! In-memory storage backend.
//!
//! Holds objects and multipart upload sessions in ordered maps and serves
//! listings with the same shapes as S3: key-ordered pages resumed after the
//! last returned key, delimited common prefixes, and multipart listings
//! resumed from a key / upload-id marker pair.

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    ContinuationToken, ListingOptions, ListingPage, ListingResume, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
    MultipartUpload, MultipartUploadPage, ObjectStore, PageStream, UploadCursor,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::OffsetDateTime;

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<String, Bytes>,
    /// Keyed by (object key, upload id).
    uploads: BTreeMap<(String, String), Option<OffsetDateTime>>,
}

/// Object store kept entirely in process memory.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    /// Most common prefixes a delimited listing returns before it reports truncation.
    common_prefix_limit: usize,
    pages_served: AtomicUsize,
    next_upload_id: AtomicU64,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryBackend")
            .field("objects", &state.objects.len())
            .field("uploads", &state.uploads.len())
            .field("common_prefix_limit", &self.common_prefix_limit)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            common_prefix_limit: MAX_PAGE_SIZE,
            pages_served: AtomicUsize::new(0),
            next_upload_id: AtomicU64::new(1),
        }
    }

    /// Report delimited listings with more than `limit` prefixes as truncated.
    pub fn with_common_prefix_limit(mut self, limit: usize) -> Self {
        self.common_prefix_limit = limit;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves the maps consistent; keep serving.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an object, replacing any previous content.
    pub fn put(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.state().objects.insert(key.into(), data.into());
    }

    /// Register a multipart upload and return its upload id.
    pub fn start_multipart_upload(
        &self,
        key: impl Into<String>,
        initiated: impl Into<Option<OffsetDateTime>>,
    ) -> String {
        let upload_id = format!(
            "{:016x}",
            self.next_upload_id.fetch_add(1, Ordering::SeqCst)
        );
        self.state()
            .uploads
            .insert((key.into(), upload_id.clone()), initiated.into());
        upload_id
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    /// All object keys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    /// All in-progress multipart uploads, ordered by key then upload id.
    pub fn multipart_uploads(&self) -> Vec<MultipartUpload> {
        self.state()
            .uploads
            .iter()
            .map(|((key, upload_id), initiated)| MultipartUpload {
                key: key.clone(),
                upload_id: upload_id.clone(),
                initiated: *initiated,
            })
            .collect()
    }

    /// Number of pages served by `list_pages` so far.
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }

    /// Up to `page_size` keys with `prefix` strictly after `start_after`,
    /// plus whether more remain.
    fn page(&self, prefix: &str, start_after: Option<&str>, page_size: usize) -> (Vec<String>, bool) {
        let lower = match start_after {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let state = self.state();
        let mut keys: Vec<String> = state
            .objects
            .range((lower, Bound::Unbounded))
            .map(|(key, _)| key)
            .skip_while(|key| key.as_str() < prefix)
            .take_while(|key| key.starts_with(prefix))
            .take(page_size + 1)
            .cloned()
            .collect();

        let has_more = keys.len() > page_size;
        keys.truncate(page_size);
        (keys, has_more)
    }
}

fn is_after_cursor(key: &str, upload_id: &str, cursor: &UploadCursor) -> bool {
    match &cursor.upload_id_marker {
        Some(id_marker) => {
            key > cursor.key_marker.as_str()
                || (key == cursor.key_marker && upload_id > id_marker.as_str())
        }
        None => key > cursor.key_marker.as_str(),
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn list_common_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let state = self.state();
        let mut prefixes = BTreeSet::new();

        for key in state
            .objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
        {
            if let Some((child, _)) = key[prefix.len()..].split_once('/') {
                prefixes.insert(format!("{prefix}{child}/"));
            }
        }

        if prefixes.len() > self.common_prefix_limit {
            return Err(StorageError::Truncated {
                operation: "delimited listing",
                prefix: prefix.to_string(),
            });
        }

        Ok(prefixes.into_iter().collect())
    }

    async fn list_multipart_uploads(
        &self,
        prefix: &str,
        max_uploads: usize,
        resume: Option<UploadCursor>,
    ) -> StorageResult<MultipartUploadPage> {
        let max_uploads = max_uploads.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        let state = self.state();

        let mut uploads: Vec<MultipartUpload> = state
            .uploads
            .iter()
            .filter(|((key, upload_id), _)| {
                key.starts_with(prefix)
                    && resume
                        .as_ref()
                        .is_none_or(|cursor| is_after_cursor(key, upload_id, cursor))
            })
            .take(max_uploads + 1)
            .map(|((key, upload_id), initiated)| MultipartUpload {
                key: key.clone(),
                upload_id: upload_id.clone(),
                initiated: *initiated,
            })
            .collect();

        let next = if uploads.len() > max_uploads {
            uploads.truncate(max_uploads);
            uploads.last().map(|last| UploadCursor {
                key_marker: last.key.clone(),
                upload_id_marker: Some(last.upload_id.clone()),
            })
        } else {
            None
        };

        Ok(MultipartUploadPage { uploads, next })
    }

    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> StorageResult<()> {
        self.state()
            .uploads
            .remove(&(upload.key.clone(), upload.upload_id.clone()))
            .map(|_| ())
            .ok_or_else(|| {
                StorageError::NotFound(format!("{} (upload {})", upload.key, upload.upload_id))
            })
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.state()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        // Like S3, deleting a missing key succeeds.
        self.state().objects.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let state = self.state();
        Ok(state
            .objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn list_pages<'a>(
        &'a self,
        prefix: &str,
        options: ListingOptions,
        resume: Option<ListingResume>,
    ) -> PageStream<'a> {
        let prefix = prefix.to_string();
        let page_size = options.normalized_page_size();

        let start_after = match resume {
            Some(resume) => match resume.start_token.to_utf8() {
                Ok(last_key) => Some(last_key),
                Err(e) => return Box::pin(futures::stream::once(async move { Err(e) })),
            },
            None => None,
        };

        Box::pin(async_stream::try_stream! {
            let mut start_after = start_after;

            loop {
                let (keys, has_more) = self.page(&prefix, start_after.as_deref(), page_size);
                self.pages_served.fetch_add(1, Ordering::SeqCst);

                let next_token = match keys.last() {
                    Some(last) if has_more => Some(ContinuationToken::new(last.clone().into_bytes())?),
                    _ => None,
                };
                start_after = keys.last().cloned();

                if !keys.is_empty() {
                    yield ListingPage { keys, next_token };
                }

                if !has_more {
                    break;
                }
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
