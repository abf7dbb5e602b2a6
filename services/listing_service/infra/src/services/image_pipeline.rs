//! Image pipeline: download, transform, guard-rail re-encode, upload.
//!
//! An image that fails the content transform is kept in its original form;
//! only an image that can neither be fetched nor stored is missing from the
//! result.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageReader, Limits};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;

use listing_service_core::services::images::{
    object_key, relative_location, ImagePipeline, ProcessedImageOutcome,
};
use listing_service_core::Result;
use shared_error::AppError;

use crate::storage::{ImageEditor, StorageClient};

use super::quota::QuotaState;

/// Download retry budget: two retries on a 3s exponential base.
const FETCH_RETRIES: usize = 2;
const FETCH_BASE_DELAY_MS: u64 = 3000;

/// Marketplace images may not exceed this edge length.
const MAX_OUTPUT_DIMENSION: u32 = 3840;

const JPEG_QUALITY: u8 = 85;

/// Decode limits guard against images claiming absurd dimensions.
const MAX_DECODE_DIMENSION: u32 = 16384;
const MAX_DECODE_ALLOC_BYTES: u64 = 256 * 1024 * 1024;

pub struct StorageImagePipeline {
    http: reqwest::Client,
    storage: Arc<StorageClient>,
    editor: Arc<dyn ImageEditor>,
    quota: Arc<QuotaState>,
}

impl StorageImagePipeline {
    pub fn new(
        storage: Arc<StorageClient>,
        editor: Arc<dyn ImageEditor>,
        quota: Arc<QuotaState>,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            http,
            storage,
            editor,
            quota,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let strategy = ExponentialBackoff::from_millis(FETCH_BASE_DELAY_MS)
            .max_delay(Duration::from_secs(6))
            .take(FETCH_RETRIES);
        let bytes = Retry::spawn(strategy, || {
            let http = self.http.clone();
            let url = url.to_string();
            async move {
                let response = http.get(&url).send().await?;
                if !response.status().is_success() {
                    return Err(AppError::upstream(
                        Some(response.status().as_u16()),
                        format!("image fetch failed for {}", url),
                        None,
                    ));
                }
                Ok::<_, AppError>(response.bytes().await?.to_vec())
            }
        })
        .await?;
        Ok(bytes)
    }

    /// Decode with limits, clamp oversized images and re-encode as JPEG.
    fn guard_rails(data: &[u8]) -> Result<(Vec<u8>, &'static str)> {
        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_DECODE_DIMENSION);
        limits.max_image_height = Some(MAX_DECODE_DIMENSION);
        limits.max_alloc = Some(MAX_DECODE_ALLOC_BYTES);

        let mut reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| AppError::ValidationError(format!("unreadable image: {}", e)))?;
        reader.limits(limits);
        let decoded = reader
            .decode()
            .map_err(|e| AppError::ValidationError(format!("undecodable image: {}", e)))?;

        let (width, height) = decoded.dimensions();
        let resized: DynamicImage = if width > MAX_OUTPUT_DIMENSION || height > MAX_OUTPUT_DIMENSION
        {
            decoded.resize(
                MAX_OUTPUT_DIMENSION,
                MAX_OUTPUT_DIMENSION,
                image::imageops::FilterType::Lanczos3,
            )
        } else {
            decoded
        };

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        resized
            .write_with_encoder(encoder)
            .map_err(|e| AppError::InternalError(format!("image encode failed: {}", e)))?;
        Ok((out, "jpg"))
    }

    async fn process_one(
        &self,
        url: &str,
        product_image_code: &str,
        index: usize,
    ) -> Result<ProcessedImageOutcome> {
        let original = self.fetch(url).await?;

        // the transform is best-effort; the original is never dropped
        let (transformed, was_processed) =
            match self.editor.erase_overlays(&original, "image/jpeg").await {
                Ok(edited) => (edited, true),
                Err(e) => {
                    if e.is_quota() {
                        self.quota.mark_exhausted();
                    }
                    tracing::warn!(url, error = %e, "content transform failed, keeping original");
                    (original.clone(), false)
                }
            };

        let (encoded, extension) = match Self::guard_rails(&transformed) {
            Ok(encoded) => encoded,
            Err(e) if was_processed => {
                // a broken edit result falls back to the original bytes
                tracing::warn!(url, error = %e, "transformed image unusable, keeping original");
                Self::guard_rails(&original)?
            }
            Err(e) => return Err(e),
        };

        let key = object_key(product_image_code, index, extension);
        let stored_url = self.storage.upload(&key, encoded, "image/jpeg").await?;

        Ok(ProcessedImageOutcome {
            original_url: url.to_string(),
            processed_url: if was_processed {
                Some(stored_url)
            } else {
                None
            },
            relative_path: relative_location(&key),
        })
    }
}

#[async_trait]
impl ImagePipeline for StorageImagePipeline {
    async fn process_images(
        &self,
        urls: &[String],
        product_image_code: &str,
    ) -> Result<Vec<ProcessedImageOutcome>> {
        let mut outcomes = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            match self.process_one(url, product_image_code, index).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(url = %url, error = %e, "image dropped, could not fetch or store");
                }
            }
        }
        if outcomes.is_empty() && !urls.is_empty() {
            return Err(AppError::InternalError(
                "no image could be processed".to_string(),
            ));
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, 85);
        img.write_with_encoder(encoder).unwrap();
        out
    }

    #[test]
    fn test_guard_rails_keeps_small_images() {
        let data = sample_jpeg(100, 80);
        let (encoded, extension) = StorageImagePipeline::guard_rails(&data).unwrap();
        assert_eq!(extension, "jpg");
        let decoded = image::load_from_memory(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (100, 80));
    }

    #[test]
    fn test_guard_rails_clamps_oversized_images() {
        let data = sample_jpeg(4000, 2000);
        let (encoded, _) = StorageImagePipeline::guard_rails(&data).unwrap();
        let decoded = image::load_from_memory(&encoded).unwrap();
        let (width, height) = decoded.dimensions();
        assert!(width <= MAX_OUTPUT_DIMENSION && height <= MAX_OUTPUT_DIMENSION);
    }

    #[test]
    fn test_guard_rails_rejects_garbage() {
        assert!(StorageImagePipeline::guard_rails(&[0, 1, 2, 3]).is_err());
    }
}
