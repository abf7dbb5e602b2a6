//! Content-aware image transform.
//!
//! Listings harvested upstream frequently carry burned-in shop names, promo
//! text and logos that must not appear on the target marketplace. The editor
//! sends each image to a vision model with an erasure instruction and gets
//! an edited image back. Callers keep the original whenever this fails.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

use listing_service_core::Result;
use shared_error::AppError;

use crate::services::quota::QuotaState;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MODEL: &str = "gemini-2.0-flash-exp-image-generation";

const ERASE_INSTRUCTION: &str = "Remove all overlaid text, watermarks, shop names and logos from \
this product photo. Keep the product, background and colors unchanged. Return only the edited image.";

#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Return the edited image bytes, or an error when the transform cannot
    /// be applied.
    async fn erase_overlays(&self, image: &[u8], content_type: &str) -> Result<Vec<u8>>;
}

pub struct GeminiImageEditor {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    quota: Arc<QuotaState>,
}

impl GeminiImageEditor {
    pub fn new(api_key: impl Into<String>, quota: Arc<QuotaState>) -> Result<Self> {
        let api_url = format!("{}/{}:generateContent", GEMINI_API_BASE, MODEL);
        Self::with_url(api_key, api_url, quota)
    }

    pub fn with_url(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        quota: Arc<QuotaState>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_url: api_url.into(),
            quota,
        })
    }
}

#[async_trait]
impl ImageEditor for GeminiImageEditor {
    async fn erase_overlays(&self, image: &[u8], content_type: &str) -> Result<Vec<u8>> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    {"text": ERASE_INSTRUCTION},
                    {"inline_data": {"mime_type": content_type, "data": BASE64.encode(image)}}
                ]
            }],
            "generationConfig": {"responseModalities": ["IMAGE"]}
        });

        let response = self
            .http
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            self.quota.mark_exhausted();
            return Err(AppError::QuotaExceeded(
                "image editing quota exhausted".to_string(),
            ));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                Some(status),
                format!("image edit failed: {}", body),
                serde_json::from_str(&body).ok(),
            ));
        }

        let payload: serde_json::Value = response.json().await?;
        let encoded = payload
            .get("candidates")
            .and_then(|candidates| candidates.as_array())
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.pointer("/content/parts"))
            .and_then(|parts| parts.as_array())
            .and_then(|parts| {
                parts
                    .iter()
                    .find_map(|part| part.pointer("/inline_data/data").or_else(|| part.pointer("/inlineData/data")))
            })
            .and_then(|data| data.as_str())
            .ok_or_else(|| {
                AppError::upstream(Some(status), "edit response carried no image", None)
            })?;

        BASE64
            .decode(encoded)
            .map_err(|e| AppError::upstream(Some(status), format!("undecodable edited image: {}", e), None))
    }
}
