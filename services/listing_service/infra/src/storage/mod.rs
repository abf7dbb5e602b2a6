//! S3-compatible object storage client for republished product images.

pub mod image_editor;

pub use image_editor::{GeminiImageEditor, ImageEditor};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use listing_service_core::services::images::StoredImageReader;
use shared_error::AppError;

/// Maximum retry attempts for S3 operations
const MAX_RETRIES: usize = 3;
/// Base delay for exponential backoff (100ms)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    pub region: String,
}

impl StorageConfig {
    pub fn from_app_config(config: &shared_config::Config) -> Self {
        Self {
            endpoint: config.s3_endpoint.clone(),
            access_key: config.s3_access_key.clone(),
            secret_key: config.s3_secret_key.clone(),
            bucket_name: config.s3_bucket.clone(),
            region: config.s3_region.clone(),
        }
    }
}

/// S3 storage client wrapper
pub struct StorageClient {
    client: Client,
    config: StorageConfig,
}

impl StorageClient {
    pub fn new(config: StorageConfig) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "listing-images",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .force_path_style(true) // required for S3-compatible endpoints
            .build();

        Self {
            client: Client::from_conf(s3_config),
            config,
        }
    }

    fn retry_strategy() -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(RETRY_BASE_DELAY_MS)
            .factor(2)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(MAX_RETRIES)
    }

    /// Upload an object with retry. Returns the object URL.
    pub async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let bucket = self.config.bucket_name.clone();
        let key_owned = key.to_string();
        let content_type_owned = content_type.to_string();
        let client = self.client.clone();
        let data_len = data.len();

        let result = Retry::spawn(Self::retry_strategy(), || {
            let data = data.clone();
            let bucket = bucket.clone();
            let key = key_owned.clone();
            let content_type = content_type_owned.clone();
            let client = client.clone();

            async move {
                client
                    .put_object()
                    .bucket(&bucket)
                    .key(&key)
                    .body(ByteStream::from(data))
                    .content_type(&content_type)
                    .acl(ObjectCannedAcl::PublicRead)
                    .send()
                    .await
                    .map_err(|e| {
                        tracing::warn!(key = %key, "S3 upload attempt failed, may retry: {:?}", e);
                        e
                    })
            }
        })
        .await;

        match result {
            Ok(_) => {
                tracing::info!(key = %key, size_bytes = data_len, "image uploaded");
                Ok(self.object_url(key))
            }
            Err(e) => Err(AppError::InternalError(format!(
                "Failed to upload object after {} retries: {}",
                MAX_RETRIES, e
            ))),
        }
    }

    /// Fetch an object's bytes.
    pub async fn download(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to fetch object {}: {}", key, e)))?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to read object {}: {}", key, e)))?;
        Ok(bytes.into_bytes().to_vec())
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.config.endpoint, self.config.bucket_name, key)
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }
}

/// Map a canonical-row location (`/img01306503/01306503_4.jpg`) back to the
/// object key it was derived from (`products/01306503/01306503_4.jpg`).
pub fn key_from_location(location: &str) -> String {
    let trimmed = location.trim().trim_start_matches('/');
    let mut segments: Vec<String> = trimmed.split('/').map(|s| s.to_string()).collect();
    if let Some(first) = segments.first_mut() {
        if let Some(rest) = first.strip_prefix("img") {
            if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                *first = rest.to_string();
            }
        }
    }
    format!("products/{}", segments.join("/"))
}

/// Shared storage client type for dependency injection
pub type SharedStorageClient = Arc<StorageClient>;

#[async_trait]
impl StoredImageReader for StorageClient {
    async fn read(&self, location: &str) -> listing_service_core::Result<Vec<u8>> {
        self.download(&key_from_location(location)).await
    }
}
