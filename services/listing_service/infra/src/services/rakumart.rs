//! Upstream (Rakumart) open API client.
//!
//! Requests are multipart forms signed with
//! `md5(app_key + app_secret + unix_timestamp)`; responses declare
//! `success=true` or carry an error. Detail payloads are normalized and then
//! filtered before they reach storage.

use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::multipart::Form;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use listing_service_core::dto::harvest::{KeywordSearchRequest, SearchPage};
use listing_service_core::services::detail_filter::filter_detail_json;
use listing_service_core::services::harvester::{
    normalize_detail_payload, parse_search_response, Harvester,
};
use listing_service_core::Result;
use shared_error::AppError;

pub struct RakumartClient {
    http: reqwest::Client,
    app_key: String,
    app_secret: String,
    search_url: String,
    detail_url: String,
    image_id_url: String,
}

impl RakumartClient {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        search_url: impl Into<String>,
        detail_url: impl Into<String>,
        image_id_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            http,
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            search_url: search_url.into(),
            detail_url: detail_url.into(),
            image_id_url: image_id_url.into(),
        })
    }

    fn signed_form(&self) -> Form {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
            .to_string();
        let sign = sign(&self.app_key, &self.app_secret, &timestamp);
        Form::new()
            .text("app_key", self.app_key.clone())
            .text("timestamp", timestamp)
            .text("sign", sign)
    }

    async fn post_form(&self, url: &str, form: Form) -> Result<Value> {
        let response = self.http.post(url).multipart(form).send().await?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            AppError::upstream(
                Some(status.as_u16()),
                format!("undecodable upstream response: {}", e),
                None,
            )
        })?;
        Ok(body)
    }
}

pub(crate) fn sign(app_key: &str, app_secret: &str, timestamp: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(app_key.as_bytes());
    hasher.update(app_secret.as_bytes());
    hasher.update(timestamp.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl Harvester for RakumartClient {
    async fn keyword_search(&self, request: &KeywordSearchRequest) -> Result<SearchPage> {
        let mut form = self
            .signed_form()
            .text("keywords", request.keywords.clone())
            .text("shop_type", request.shop_type.clone())
            .text("page", request.page.to_string())
            .text("pageSize", request.page_size.to_string());
        if let Some(price_start) = &request.price_start {
            form = form.text("priceStart", price_start.clone());
        }
        if let Some(price_end) = &request.price_end {
            form = form.text("priceEnd", price_end.clone());
        }
        if let Some(sort) = &request.sort {
            form = form.text("sort", sort.to_string());
        }
        if let Some(region_opp) = &request.region_opp {
            form = form.text("regionOpp", region_opp.clone());
        }
        if let Some(filter) = &request.filter {
            form = form.text("filter", filter.clone());
        }
        if let Some(category_id) = &request.category_id {
            form = form.text("categoryId", category_id.clone());
        }

        tracing::info!(
            keywords = %request.keywords,
            page = request.page,
            category_id = ?request.category_id,
            "upstream keyword search"
        );
        let response = self.post_form(&self.search_url, form).await?;
        parse_search_response(&response)
    }

    async fn product_detail(&self, goods_id: &str, shop_type: &str) -> Result<Option<Value>> {
        let form = self
            .signed_form()
            .text("shopType", shop_type.to_string())
            .text("goodsId", goods_id.to_string());

        let response = self.post_form(&self.detail_url, form).await?;
        if !response
            .get("success")
            .and_then(|s| s.as_bool())
            .unwrap_or(false)
        {
            tracing::warn!(goods_id, "detail request reported failure");
            return Ok(None);
        }
        let detail = match response.get("data") {
            Some(data) if !data.is_null() => data.clone(),
            _ => return Ok(None),
        };

        let normalized = normalize_detail_payload(&detail);
        Ok(filter_detail_json(&normalized))
    }

    async fn image_lookup(&self, image_base64: &str) -> Result<Option<Value>> {
        let form = self
            .signed_form()
            .text("imageBase64", image_base64.to_string());
        let response = self.post_form(&self.image_id_url, form).await?;
        if !response
            .get("success")
            .and_then(|s| s.as_bool())
            .unwrap_or(false)
        {
            return Ok(None);
        }
        Ok(response.get("data").cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_sign_is_md5_of_concatenation() {
        // md5("keysecret123")
        assert_eq!(sign("key", "secret", "123"), "b05b259f25ae93e7170421d3c7810009");
    }

    #[tokio::test]
    async fn test_keyword_search_parses_nested_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"result": {"total": 1, "result": [
                    {"goodsId": "g1", "titleT": "ワンピース", "goodsPrice": 8.5}
                ]}}
            })))
            .mount(&server)
            .await;

        let client = RakumartClient::new(
            "key",
            "secret",
            format!("{}/search", server.uri()),
            format!("{}/detail", server.uri()),
            format!("{}/image", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let page = client
            .keyword_search(&KeywordSearchRequest::for_keyword("dress"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.products[0].goods_id, "g1");
        assert_eq!(page.products[0].goods_price, Some(8.5));
    }

    #[tokio::test]
    async fn test_detail_is_normalized_and_filtered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "goodsId": 7,
                    "titleC": "中文",
                    "titleT": "日本語",
                    "video": "v.mp4",
                    "goodsInfo": {
                        "specification": [
                            {"keyC": "颜色", "keyT": "色", "valueT": [{"name": "赤", "picUrl": "p"}]}
                        ]
                    }
                }
            })))
            .mount(&server)
            .await;

        let client = RakumartClient::new(
            "key",
            "secret",
            format!("{}/search", server.uri()),
            format!("{}/detail", server.uri()),
            format!("{}/image", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let detail = client.product_detail("7", "1688").await.unwrap().unwrap();
        assert!(detail.get("titleC").is_none());
        assert!(detail.get("titleT").is_none());
        assert!(detail.get("video").is_none());
        assert_eq!(
            detail["goodsInfo"]["specification"][0]["valueT"][0],
            serde_json::json!({"name": "赤"})
        );
    }

    #[tokio::test]
    async fn test_failed_search_surfaces_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "sign mismatch"
            })))
            .mount(&server)
            .await;

        let client = RakumartClient::new(
            "key",
            "secret",
            format!("{}/search", server.uri()),
            format!("{}/detail", server.uri()),
            format!("{}/image", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client
            .keyword_search(&KeywordSearchRequest::for_keyword("dress"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sign mismatch"));
    }
}
