//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use time::OffsetDateTime;

/// A boxed stream of listing pages.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ListingPage>> + Send + 'a>>;

// ===== Streaming Listing API Types =====

/// Page size constraints for listing operations.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MIN_PAGE_SIZE: usize = 1;
pub const MAX_PAGE_SIZE: usize = 1000;

/// Maximum size for continuation tokens (2 KB).
pub const MAX_TOKEN_SIZE: usize = 2048;

/// An opaque continuation token for resuming listing operations.
///
/// This token is backend-specific and should not be parsed or modified.
#[derive(Clone, PartialEq, Eq)]
pub struct ContinuationToken(Vec<u8>);

impl ContinuationToken {
    /// Create a new continuation token from raw bytes.
    ///
    /// Returns an error if the token exceeds MAX_TOKEN_SIZE.
    pub fn new(data: Vec<u8>) -> StorageResult<Self> {
        if data.len() > MAX_TOKEN_SIZE {
            return Err(StorageError::InvalidContinuationToken(format!(
                "continuation token too large: {} bytes (max: {})",
                data.len(),
                MAX_TOKEN_SIZE
            )));
        }
        Ok(Self(data))
    }

    /// Get the raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode the token as UTF-8, the encoding every backend here uses.
    pub fn to_utf8(&self) -> StorageResult<String> {
        String::from_utf8(self.0.clone()).map_err(|e| {
            StorageError::InvalidContinuationToken(format!(
                "continuation token is not valid UTF-8: {e}"
            ))
        })
    }
}

impl std::fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContinuationToken")
            .field(&"<redacted>")
            .finish()
    }
}

/// A single page of listing results.
#[derive(Clone, Debug)]
pub struct ListingPage {
    /// Object keys in this page.
    pub keys: Vec<String>,

    /// Continuation token for the next page, if there are more results.
    /// If None, this is the last page.
    pub next_token: Option<ContinuationToken>,
}

impl ListingPage {
    /// Whether this is the final page of the listing.
    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

/// Options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// Number of keys to fetch per page.
    ///
    /// This value will be clamped to [MIN_PAGE_SIZE, MAX_PAGE_SIZE].
    pub page_size: usize,
}

impl ListingOptions {
    /// Create new listing options with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Get the normalized page size.
    pub fn normalized_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Resume options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingResume {
    /// Continuation token from a previous listing operation.
    pub start_token: ContinuationToken,
}

impl ListingResume {
    /// Create new resume options with the given token.
    pub fn new(start_token: ContinuationToken) -> Self {
        Self { start_token }
    }
}

/// An in-progress multipart upload as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartUpload {
    /// Destination object key.
    pub key: String,
    /// Opaque upload identifier.
    pub upload_id: String,
    /// When the store registered the upload. `None` if the store omitted it.
    pub initiated: Option<OffsetDateTime>,
}

/// Position to resume a multipart upload listing from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCursor {
    pub key_marker: String,
    pub upload_id_marker: Option<String>,
}

/// One response of a multipart upload listing.
#[derive(Clone, Debug, Default)]
pub struct MultipartUploadPage {
    pub uploads: Vec<MultipartUpload>,
    /// Where the next page starts. None when the listing is complete.
    pub next: Option<UploadCursor>,
}

/// Object store capability used by the reapers.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// List the first-level common prefixes below `prefix` (delimiter `/`).
    ///
    /// Consumed as a single response: a truncated result is reported as
    /// [`StorageError::Truncated`] rather than silently returning a partial set.
    async fn list_common_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// List one page of in-progress multipart uploads whose keys start with `prefix`.
    async fn list_multipart_uploads(
        &self,
        prefix: &str,
        max_uploads: usize,
        resume: Option<UploadCursor>,
    ) -> StorageResult<MultipartUploadPage>;

    /// Abort a multipart upload, discarding its parts.
    ///
    /// Aborting an upload that was already aborted or completed fails with
    /// [`StorageError::NotFound`].
    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> StorageResult<()>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List every object with a prefix, following pagination to the end.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// List objects with a prefix, returning a stream of pages.
    ///
    /// Each page contains up to `options.page_size` keys and an optional
    /// continuation token for the next page. Passing that token back through
    /// `resume` continues the listing after the last returned key.
    ///
    /// # Errors
    ///
    /// Returns an error if the continuation token is invalid or there is a
    /// backend-specific error fetching a page.
    fn list_pages<'a>(
        &'a self,
        prefix: &str,
        options: ListingOptions,
        resume: Option<ListingResume>,
    ) -> PageStream<'a>;

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3", "memory").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation_token_rejects_oversized_input() {
        let result = ContinuationToken::new(vec![b'a'; MAX_TOKEN_SIZE + 1]);
        assert!(matches!(
            result,
            Err(StorageError::InvalidContinuationToken(_))
        ));
    }

    #[test]
    fn test_continuation_token_debug_is_redacted() {
        let token = ContinuationToken::new(b"secret-cursor".to_vec()).unwrap();
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret-cursor"));
        assert_eq!(token.to_utf8().unwrap(), "secret-cursor");
    }

    #[test]
    fn test_continuation_token_rejects_invalid_utf8() {
        let token = ContinuationToken::new(vec![0xff, 0xfe]).unwrap();
        assert!(token.to_utf8().is_err());
    }

    #[test]
    fn test_listing_options_clamp() {
        assert_eq!(ListingOptions::new(0).normalized_page_size(), MIN_PAGE_SIZE);
        assert_eq!(ListingOptions::new(250).normalized_page_size(), 250);
        assert_eq!(
            ListingOptions::new(50_000).normalized_page_size(),
            MAX_PAGE_SIZE
        );
        assert_eq!(ListingOptions::default().normalized_page_size(), 1000);
    }

    #[test]
    fn test_listing_page_is_last() {
        let page = ListingPage {
            keys: vec!["a".to_string()],
            next_token: None,
        };
        assert!(page.is_last());

        let page = ListingPage {
            keys: vec!["a".to_string()],
            next_token: Some(ContinuationToken::new(b"a".to_vec()).unwrap()),
        };
        assert!(!page.is_last());
    }
}
