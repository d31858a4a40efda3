//! Object store gateway: upload a file under a key, hand out a time-limited
//! retrieval URL for it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{Credentials, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use url::Url;

use crate::config::S3Config;
use crate::error::StoreError;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const UPLOAD_TIMEOUT_SECS: u64 = 120;
/// Error bodies from the store are cut to this many characters.
const MAX_ERROR_BODY: usize = 300;

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    pub bucket: String,
    pub key: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the file at `path` under `key`. A single attempt.
    async fn upload(&self, path: &Path, key: &str) -> Result<ObjectHandle, StoreError>;

    /// Retrieval URL for `handle` that expires after `ttl`.
    async fn presign(&self, handle: &ObjectHandle, ttl: Duration) -> Result<String, StoreError>;
}

/// S3 (or S3-compatible) bucket.
///
/// Without a custom endpoint requests go to AWS with virtual-hosted
/// addressing; with one (MinIO, local tests) they are path-style
/// (`{endpoint}/{bucket}/{key}`).
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn new(config: S3Config) -> Result<Self, StoreError> {
        if let Some(endpoint) = &config.endpoint {
            validate_endpoint(endpoint)?;
        }

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "guest-watcher-env",
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                    .operation_timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint.is_some())
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
        })
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), StoreError> {
    let invalid = |detail: String| StoreError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        detail,
    };
    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().is_none() {
        return Err(invalid("no host".into()));
    }
    if url.query().is_some() {
        return Err(invalid("query strings are not allowed".into()));
    }
    Ok(())
}

/// Map an SDK failure, keeping the HTTP status and a cut body when the
/// store answered.
fn request_error<E>(err: SdkError<E>) -> StoreError
where
    E: std::error::Error + 'static,
{
    if let Some(raw) = err.raw_response()
        && !raw.status().is_success()
    {
        let body = raw
            .body()
            .bytes()
            .map(|b| String::from_utf8_lossy(b).chars().take(MAX_ERROR_BODY).collect())
            .unwrap_or_default();
        return StoreError::Status {
            status: raw.status().as_u16(),
            body,
        };
    }
    StoreError::Request(DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, path: &Path, key: &str) -> Result<ObjectHandle, StoreError> {
        let read_error = |source: std::io::Error| StoreError::Read {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::metadata(path).await.map_err(read_error)?;
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| read_error(std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(request_error)?;

        Ok(ObjectHandle {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })
    }

    async fn presign(&self, handle: &ObjectHandle, ttl: Duration) -> Result<String, StoreError> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| StoreError::Presign(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&handle.bucket)
            .key(&handle.key)
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::Presign(DisplayErrorContext(&e).to_string()))?;
        Ok(request.uri().to_string())
    }
}
