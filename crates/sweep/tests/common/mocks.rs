use async_trait::async_trait;
use bytes::Bytes;
use reaper_storage::error::{StorageError, StorageResult};
use reaper_storage::traits::{
    ListingOptions, ListingResume, MultipartUpload, MultipartUploadPage, ObjectStore, PageStream,
    UploadCursor,
};
use reaper_storage::MemoryBackend;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn injected(what: &str) -> StorageError {
    StorageError::S3(format!("injected failure: {what}").into())
}

/// Wraps a [`MemoryBackend`] and fails selected operations.
///
/// Failures are keyed by object key (get, delete, folder listing) or by the
/// destination key of a multipart upload (abort).
#[allow(dead_code)]
pub struct FailingStore {
    pub inner: Arc<MemoryBackend>,
    pub fail_get: HashSet<String>,
    pub missing_on_get: HashSet<String>,
    pub fail_delete: HashSet<String>,
    pub fail_list: HashSet<String>,
    pub fail_abort: HashSet<String>,
    pub fail_multipart_listing: bool,
    pub aborts_attempted: AtomicUsize,
    pub deletes_attempted: AtomicUsize,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new(inner: Arc<MemoryBackend>) -> Self {
        Self {
            inner,
            fail_get: HashSet::new(),
            missing_on_get: HashSet::new(),
            fail_delete: HashSet::new(),
            fail_list: HashSet::new(),
            fail_abort: HashSet::new(),
            fail_multipart_listing: false,
            aborts_attempted: AtomicUsize::new(0),
            deletes_attempted: AtomicUsize::new(0),
        }
    }

    pub fn failing_get(mut self, key: impl Into<String>) -> Self {
        self.fail_get.insert(key.into());
        self
    }

    /// Report `key` as gone when read, as if the upload finished concurrently.
    pub fn missing_on_get(mut self, key: impl Into<String>) -> Self {
        self.missing_on_get.insert(key.into());
        self
    }

    pub fn failing_delete(mut self, key: impl Into<String>) -> Self {
        self.fail_delete.insert(key.into());
        self
    }

    pub fn failing_list(mut self, prefix: impl Into<String>) -> Self {
        self.fail_list.insert(prefix.into());
        self
    }

    pub fn failing_abort(mut self, key: impl Into<String>) -> Self {
        self.fail_abort.insert(key.into());
        self
    }

    pub fn failing_multipart_listing(mut self) -> Self {
        self.fail_multipart_listing = true;
        self
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn list_common_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list_common_prefixes(prefix).await
    }

    async fn list_multipart_uploads(
        &self,
        prefix: &str,
        max_uploads: usize,
        resume: Option<UploadCursor>,
    ) -> StorageResult<MultipartUploadPage> {
        if self.fail_multipart_listing {
            return Err(injected("list multipart uploads"));
        }
        self.inner
            .list_multipart_uploads(prefix, max_uploads, resume)
            .await
    }

    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> StorageResult<()> {
        self.aborts_attempted.fetch_add(1, Ordering::SeqCst);
        if self.fail_abort.contains(&upload.key) {
            return Err(injected("abort"));
        }
        self.inner.abort_multipart_upload(upload).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        if self.fail_get.contains(key) {
            return Err(injected("get"));
        }
        if self.missing_on_get.contains(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes_attempted.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.contains(key) {
            return Err(injected("delete"));
        }
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        if self.fail_list.contains(prefix) {
            return Err(injected("list"));
        }
        self.inner.list(prefix).await
    }

    fn list_pages<'a>(
        &'a self,
        prefix: &str,
        options: ListingOptions,
        resume: Option<ListingResume>,
    ) -> PageStream<'a> {
        self.inner.list_pages(prefix, options, resume)
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}
