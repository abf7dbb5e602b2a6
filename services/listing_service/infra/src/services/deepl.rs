//! DeepL machine-translation backend with a process-wide cache.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use listing_service_core::services::translator::{Lang, Translator};
use listing_service_core::Result;
use shared_error::AppError;

use super::quota::QuotaState;

const DEEPL_API_URL: &str = "https://api-free.deepl.com/v2/translate";

/// DeepL signals exhausted translation quota with 456.
const QUOTA_EXCEEDED_STATUS: u16 = 456;

pub struct DeepLTranslator {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    /// Read-mostly cache keyed by (source, target, text). DashMap shards
    /// give per-key write locking; repeated variant tokens across a batch
    /// resolve without another API round trip.
    cache: DashMap<String, String>,
    quota: Arc<QuotaState>,
}

impl DeepLTranslator {
    pub fn new(api_key: impl Into<String>, quota: Arc<QuotaState>) -> Result<Self> {
        Self::with_url(api_key, DEEPL_API_URL, quota)
    }

    pub fn with_url(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        quota: Arc<QuotaState>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_url: api_url.into(),
            cache: DashMap::new(),
            quota,
        })
    }

    fn cache_key(text: &str, source: Option<Lang>, target: Lang) -> String {
        format!(
            "{}|{}|{}",
            source.map(|lang| lang.code()).unwrap_or(""),
            target.code(),
            text
        )
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate(&self, text: &str, source: Option<Lang>, target: Lang) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(String::new());
        }

        let key = Self::cache_key(text, source, target);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let mut params: Vec<(&str, String)> = vec![
            ("text", text.to_string()),
            ("target_lang", target.code().to_string()),
        ];
        if let Some(source) = source {
            if !source.code().is_empty() {
                params.push(("source_lang", source.code().to_string()));
            }
        }

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .form(&params)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 || status == QUOTA_EXCEEDED_STATUS {
            self.quota.mark_exhausted();
            return Err(AppError::QuotaExceeded(format!(
                "translation quota exhausted (status {})",
                status
            )));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                Some(status),
                format!("translation failed: {}", body),
                serde_json::from_str(&body).ok(),
            ));
        }

        let body: serde_json::Value = response.json().await?;
        let translated = body
            .get("translations")
            .and_then(|translations| translations.as_array())
            .and_then(|translations| translations.first())
            .and_then(|first| first.get("text"))
            .and_then(|text| text.as_str())
            .ok_or_else(|| {
                AppError::upstream(Some(status), "translation response missing text", Some(body.clone()))
            })?
            .to_string();

        // entry() holds the shard lock only for this key
        self.cache.entry(key).or_insert_with(|| translated.clone());
        self.quota.clear();
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_translate_parses_response_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "DeepL-Auth-Key k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translations": [{"detected_source_language": "ZH", "text": "ブラック"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let translator =
            DeepLTranslator::with_url("k", server.uri(), Arc::new(QuotaState::new())).unwrap();

        let first = translator
            .translate("黑色", Some(Lang::Chinese), Lang::Japanese)
            .await
            .unwrap();
        assert_eq!(first, "ブラック");

        // second call must come from the cache (mock expects exactly 1 hit)
        let second = translator
            .translate("黑色", Some(Lang::Chinese), Lang::Japanese)
            .await
            .unwrap();
        assert_eq!(second, "ブラック");
    }

    #[tokio::test]
    async fn test_quota_status_sets_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(456))
            .mount(&server)
            .await;

        let quota = Arc::new(QuotaState::new());
        let translator = DeepLTranslator::with_url("k", server.uri(), quota.clone()).unwrap();

        let err = translator
            .translate("黑色", None, Lang::Japanese)
            .await
            .unwrap_err();
        assert!(err.is_quota());
        assert!(quota.is_exhausted());
    }
}
