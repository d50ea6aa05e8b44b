//! S3-compatible storage backend using AWS SDK.

use crate::credentials::{ChainedCredentialsProvider, ExplicitKeysProvider};
use crate::error::{StorageError, StorageResult};
use crate::traits::{
    ContinuationToken, ListingOptions, ListingPage, ListingResume, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
    MultipartUpload, MultipartUploadPage, ObjectStore, PageStream, UploadCursor,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use reaper_core::config::StoreConfig;
use time::OffsetDateTime;
use tracing::instrument;

/// Region sent with every request. S3-compatible registries behind a custom
/// endpoint ignore it, but SigV4 signing needs one.
pub const REGION: &str = "us-west-1";

/// Returns true if a credentials failure is anywhere in the error's source chain.
fn is_credentials_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(current) = source {
        if current.downcast_ref::<CredentialsError>().is_some() {
            return true;
        }
        source = current.source();
    }
    false
}

fn map_s3_operation_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if is_credentials_error(&err) {
        return StorageError::Config(format!(
            "S3 credential resolution failed (tried command line, environment, profile, instance metadata): {}",
            aws_sdk_s3::error::DisplayErrorContext(&err)
        ));
    }

    StorageError::S3(Box::new(err))
}

/// Prepend `http://` to bare `host:port` endpoints; keep explicit schemes.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint_lower = endpoint.to_ascii_lowercase();
    if endpoint_lower.starts_with("http://") || endpoint_lower.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Wrap the service's continuation token for the page that carries it.
///
/// A page with more to come must hand out a token, so one we cannot hold
/// fails the listing instead of ending it early.
fn page_token(next: Option<&str>) -> StorageResult<Option<ContinuationToken>> {
    next.map(|token| ContinuationToken::new(token.as_bytes().to_vec())).transpose()
}

fn to_offset_date_time(key: &str, dt: &aws_sdk_s3::primitives::DateTime) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.secs())
        .inspect_err(|e| {
            tracing::warn!(
                key = %key,
                timestamp = dt.secs(),
                error = %e,
                "Failed to convert S3 timestamp, upload will be treated as undated"
            );
        })
        .ok()
}

/// S3-compatible object store using AWS SDK.
///
/// Path-style addressing is always on and the region is fixed to [`REGION`].
pub struct S3Backend {
    client: Client,
    bucket: String,
    /// Endpoint URL after normalization.
    endpoint: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// # Arguments
    /// * `endpoint` - `host:port` (plain HTTP is assumed) or a full URL.
    /// * `credentials` - explicit key pair; the ambient chain is consulted when it declines.
    /// * `config` - retry and timeout tuning.
    pub fn new(
        endpoint: &str,
        bucket: &str,
        credentials: ExplicitKeysProvider,
        config: &StoreConfig,
    ) -> StorageResult<Self> {
        if endpoint.trim().is_empty() {
            return Err(StorageError::Config("S3 endpoint must not be empty".to_string()));
        }
        if bucket.trim().is_empty() {
            return Err(StorageError::Config("S3 bucket must not be empty".to_string()));
        }

        let normalized_endpoint = normalize_endpoint(endpoint);

        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(REGION))
            .endpoint_url(&normalized_endpoint)
            .force_path_style(true)
            .credentials_provider(ChainedCredentialsProvider::new(credentials))
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts));

        if let Some(timeout) = config.operation_timeout() {
            s3_config_builder = s3_config_builder.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(timeout)
                    .build(),
            );
        }

        // Plaintext endpoints get an HTTP-only client so SDK initialization
        // doesn't depend on native trust roots.
        if normalized_endpoint
            .to_ascii_lowercase()
            .starts_with("http://")
        {
            s3_config_builder =
                s3_config_builder.http_client(SmithyHttpClientBuilder::new().build_http());
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            endpoint: normalized_endpoint,
        })
    }

    /// The endpoint URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Convert an AWS SDK error to StorageError, mapping NotFound appropriately.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        // NoSuchKey / NoSuchUpload
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
            let raw = service_err.raw();
            if raw.status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        map_s3_operation_error(err)
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_common_prefixes(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .delimiter("/")
            .send()
            .await
            .map_err(map_s3_operation_error)?;

        if output.is_truncated() == Some(true) {
            return Err(StorageError::Truncated {
                operation: "delimited ListObjectsV2",
                prefix: prefix.to_string(),
            });
        }

        Ok(output
            .common_prefixes()
            .iter()
            .filter_map(|common| common.prefix())
            .map(str::to_string)
            .collect())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list_multipart_uploads(
        &self,
        prefix: &str,
        max_uploads: usize,
        resume: Option<UploadCursor>,
    ) -> StorageResult<MultipartUploadPage> {
        let mut request = self
            .client
            .list_multipart_uploads()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_uploads(max_uploads.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE) as i32);

        if let Some(cursor) = resume {
            request = request.key_marker(cursor.key_marker);
            if let Some(upload_id_marker) = cursor.upload_id_marker {
                request = request.upload_id_marker(upload_id_marker);
            }
        }

        let output = request.send().await.map_err(map_s3_operation_error)?;

        let mut uploads = Vec::with_capacity(output.uploads().len());
        for upload in output.uploads() {
            let (Some(key), Some(upload_id)) = (upload.key(), upload.upload_id()) else {
                tracing::warn!(
                    key = ?upload.key(),
                    upload_id = ?upload.upload_id(),
                    "S3 returned a multipart upload without key or upload id, ignoring"
                );
                continue;
            };

            uploads.push(MultipartUpload {
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                initiated: upload
                    .initiated()
                    .and_then(|dt| to_offset_date_time(key, dt)),
            });
        }

        let next = if output.is_truncated() == Some(true) {
            // Without a key marker there is no way to ask for the rest.
            let Some(key_marker) = output.next_key_marker() else {
                return Err(StorageError::Truncated {
                    operation: "ListMultipartUploads",
                    prefix: prefix.to_string(),
                });
            };
            Some(UploadCursor {
                key_marker: key_marker.to_string(),
                upload_id_marker: output.next_upload_id_marker().map(str::to_string),
            })
        } else {
            None
        };

        Ok(MultipartUploadPage { uploads, next })
    }

    #[instrument(skip(self, upload), fields(backend = "s3", key = %upload.key, upload_id = %upload.upload_id))]
    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, &upload.key))?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();

        Ok(bytes)
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut results = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(map_s3_operation_error)?;

            for obj in output.contents() {
                if let Some(obj_key) = obj.key() {
                    results.push(obj_key.to_string());
                }
            }

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(|s| s.to_string());
                if continuation_token.is_none() {
                    return Err(StorageError::Truncated {
                        operation: "ListObjectsV2",
                        prefix: prefix.to_string(),
                    });
                }
            } else {
                break;
            }
        }

        Ok(results)
    }

    fn list_pages<'a>(
        &'a self,
        prefix: &str,
        options: ListingOptions,
        resume: Option<ListingResume>,
    ) -> PageStream<'a> {
        let prefix = prefix.to_string();
        let page_size = options.normalized_page_size();

        let initial_token: Option<String> = match resume {
            Some(resume_opts) => match resume_opts.start_token.to_utf8() {
                Ok(s3_token) => Some(s3_token),
                Err(e) => return Box::pin(futures::stream::once(async move { Err(e) })),
            },
            None => None,
        };

        let stream = async_stream::try_stream! {
            let mut continuation_token: Option<String> = initial_token;

            loop {
                let mut request = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(&prefix)
                    .max_keys(page_size as i32);

                if let Some(token) = continuation_token.take() {
                    request = request.continuation_token(token);
                }

                let output = request
                    .send()
                    .await
                    .map_err(|e| {
                        // S3 returns 400 for invalid continuation tokens
                        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = e
                            && service_err.raw().status().as_u16() == 400
                        {
                            let body = format!("{:?}", service_err.err());
                            if body.contains("continuation") || body.contains("token") {
                                return StorageError::InvalidContinuationToken(
                                    "S3 rejected continuation token".to_string()
                                );
                            }
                        }
                        map_s3_operation_error(e)
                    })?;

                let keys: Vec<String> = output
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .map(str::to_string)
                    .collect();

                let has_more = output.is_truncated() == Some(true);
                let next_s3_token = if has_more {
                    let token = output
                        .next_continuation_token()
                        .map(str::to_string)
                        .ok_or_else(|| StorageError::Truncated {
                            operation: "ListObjectsV2",
                            prefix: prefix.clone(),
                        })?;
                    Some(token)
                } else {
                    None
                };

                let next_token = page_token(next_s3_token.as_deref())?;

                if !keys.is_empty() {
                    yield ListingPage {
                        keys,
                        next_token,
                    };
                }

                if !has_more {
                    break;
                }

                continuation_token = next_s3_token;
            }
        };

        Box::pin(stream)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
