//! OpenAI-backed listing copy generator.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use listing_service_core::services::content::{
    ContentGenerator, ContentInput, GeneratedContent, DESCRIPTION_PC_MAX_CHARS,
    TAGLINE_MAX_CHARS, TITLE_MAX_CHARS, TITLE_MIN_CHARS,
};
use listing_service_core::Result;
use shared_error::AppError;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";

pub struct OpenAiContentGenerator {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl OpenAiContentGenerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_url(api_key, OPENAI_API_URL)
    }

    pub fn with_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            api_url: api_url.into(),
        })
    }

    fn build_prompt(input: &ContentInput) -> String {
        let mut lines = vec![
            "以下の商品情報から楽天市場向けの商品コンテンツを作成してください。".to_string(),
        ];
        if let Some(title) = &input.title_t {
            lines.push(format!("商品名(日本語): {}", title));
        }
        if let Some(title) = &input.title_c {
            lines.push(format!("商品名(中国語): {}", title));
        }
        if let Some(category) = &input.category_name {
            lines.push(format!("カテゴリ: {}", category));
        }
        if !input.attribute_hints.is_empty() {
            lines.push(format!("属性: {}", input.attribute_hints.join("、")));
        }
        lines.push(format!(
            "JSONで出力: {{\"title\": \"名詞のみ{}〜{}文字のSEOタイトル\", \"catchphrase\": \"{}文字以内のキャッチコピー\", \"description\": \"{}文字以内の商品説明\", \"sales_description\": \"販売説明文\"}}",
            TITLE_MIN_CHARS, TITLE_MAX_CHARS, TAGLINE_MAX_CHARS, DESCRIPTION_PC_MAX_CHARS
        ));
        lines.join("\n")
    }
}

#[async_trait]
impl ContentGenerator for OpenAiContentGenerator {
    async fn generate(&self, input: &ContentInput) -> Result<GeneratedContent> {
        let body = json!({
            "model": MODEL,
            "messages": [
                {
                    "role": "system",
                    "content": "あなたは楽天市場の商品ページ制作の専門家です。必ずJSONのみで回答してください。"
                },
                {"role": "user", "content": Self::build_prompt(input)}
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.7
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(AppError::QuotaExceeded(
                "content generation rate limited".to_string(),
            ));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                Some(status),
                format!("content generation failed: {}", body),
                serde_json::from_str(&body).ok(),
            ));
        }

        let payload: serde_json::Value = response.json().await?;
        let content = payload
            .get("choices")
            .and_then(|choices| choices.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| {
                AppError::upstream(Some(status), "completion response missing content", None)
            })?;

        let generated: GeneratedContent = serde_json::from_str(content).map_err(|e| {
            AppError::upstream(
                Some(status),
                format!("completion was not the expected JSON: {}", e),
                None,
            )
        })?;
        if generated.title.trim().is_empty() {
            return Err(AppError::ValidationError(
                "generated content has an empty title".to_string(),
            ));
        }
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn input() -> ContentInput {
        ContentInput {
            title_c: Some("连衣裙".to_string()),
            title_t: Some("ワンピース".to_string()),
            category_name: Some("レディースファッション".to_string()),
            attribute_hints: vec![],
        }
    }

    #[tokio::test]
    async fn test_generate_parses_nested_json_content() {
        let server = MockServer::start().await;
        let inner = serde_json::json!({
            "title": "ワンピース レディース 長袖",
            "catchphrase": "新作入荷",
            "description": "説明",
            "sales_description": "販売説明"
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": inner.to_string()}}]
            })))
            .mount(&server)
            .await;

        let generator = OpenAiContentGenerator::with_url("k", server.uri()).unwrap();
        let content = generator.generate(&input()).await.unwrap();
        assert_eq!(content.title, "ワンピース レディース 長袖");
        assert_eq!(content.sales_description, "販売説明");
    }

    #[tokio::test]
    async fn test_generate_maps_429_to_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let generator = OpenAiContentGenerator::with_url("k", server.uri()).unwrap();
        let err = generator.generate(&input()).await.unwrap_err();
        assert!(err.is_quota());
    }
}
