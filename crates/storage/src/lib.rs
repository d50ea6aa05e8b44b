//! Object storage capability and backends for the registry upload reaper.
//!
//! This crate provides:
//! - The `ObjectStore` trait the reapers are written against
//! - An S3-compatible backend built on the AWS SDK
//! - An in-memory backend with the same listing semantics (`testing` feature)
//! - The ordered credential chain used by the S3 backend

pub mod backends;
pub mod credentials;
pub mod error;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub use backends::memory::MemoryBackend;
pub use backends::s3::S3Backend;
pub use credentials::{ChainedCredentialsProvider, ExplicitKeysProvider};
pub use error::{StorageError, StorageResult};
pub use traits::{
    ContinuationToken, ListingOptions, ListingPage, ListingResume, MultipartUpload,
    MultipartUploadPage, ObjectStore, PageStream, UploadCursor,
};

use reaper_core::config::StoreConfig;
use std::sync::Arc;

/// Where the registry's bucket lives and the key pair given for it.
#[derive(Clone)]
pub struct S3Location {
    /// `host:port` or a full URL.
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Location")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Create an object store for the given bucket.
pub fn from_config(location: &S3Location, config: &StoreConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    let backend = S3Backend::new(
        &location.endpoint,
        &location.bucket,
        ExplicitKeysProvider::new(
            location.access_key_id.clone(),
            location.secret_access_key.clone(),
        ),
        config,
    )?;
    Ok(Arc::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> S3Location {
        S3Location {
            endpoint: "minio:9000".to_string(),
            bucket: "registry".to_string(),
            access_key_id: "access".to_string(),
            secret_access_key: "super-secret".to_string(),
        }
    }

    #[tokio::test]
    async fn from_config_s3_ok() {
        let store = from_config(&location(), &StoreConfig::default()).unwrap();
        assert_eq!(store.backend_name(), "s3");
    }

    #[tokio::test]
    async fn from_config_rejects_invalid_store_config() {
        let config = StoreConfig {
            max_attempts: 0,
            operation_timeout_secs: None,
        };

        match from_config(&location(), &config) {
            Ok(_) => panic!("expected error"),
            Err(StorageError::Config(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn location_debug_hides_secret() {
        let rendered = format!("{:?}", location());
        assert!(rendered.contains("minio:9000"));
        assert!(!rendered.contains("super-secret"));
    }
}
