//! Rakuten RMS API client.
//!
//! All endpoints authenticate with the `ESA base64(service_secret:license_key)`
//! scheme. Every method returns the tagged result type instead of erroring,
//! so transport failures and API rejections travel the same path back to the
//! orchestrator.

pub mod cabinet;
pub mod inventory;
pub mod product;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::time::Duration;

use listing_service_core::dto::rakuten::ApiCallResult;
use shared_config::RakutenCredentials;
use shared_error::AppError;

pub(crate) const ITEMS_BASE_URL: &str =
    "https://api.rms.rakuten.co.jp/es/2.0/items/manage-numbers";
pub(crate) const CATEGORY_MAPPING_BASE_URL: &str =
    "https://api.rms.rakuten.co.jp/es/2.0/categories/item-mappings/manage-numbers";
pub(crate) const INVENTORY_BASE_URL: &str =
    "https://api.rms.rakuten.co.jp/es/2.1/inventories/manage-numbers";
pub(crate) const CABINET_BASE_URL: &str = "https://api.rms.rakuten.co.jp/es/1.0/cabinet";

pub struct RakutenClient {
    pub(crate) http: reqwest::Client,
    pub(crate) cabinet_http: reqwest::Client,
    auth_header: String,
}

impl RakutenClient {
    pub fn new(
        credentials: &RakutenCredentials,
        api_timeout: Duration,
        cabinet_timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(api_timeout)
            .build()
            .map_err(AppError::from)?;
        let cabinet_http = reqwest::Client::builder()
            .timeout(cabinet_timeout)
            .build()
            .map_err(AppError::from)?;
        Ok(Self {
            http,
            cabinet_http,
            auth_header: build_auth_header(credentials),
        })
    }

    pub(crate) fn auth_header(&self) -> &str {
        &self.auth_header
    }

    /// Execute a JSON-endpoint request and fold the response into the tagged
    /// result. 204 and other 2xx are success; everything else carries the
    /// status, the raw body, its JSON form when parseable, and the response
    /// headers.
    pub(crate) async fn send_json(
        &self,
        builder: reqwest::RequestBuilder,
        url: &str,
    ) -> ApiCallResult {
        let response = match builder
            .header("Authorization", self.auth_header())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let classified = AppError::from(e);
                tracing::error!(url, error = %classified, "marketplace request failed");
                return ApiCallResult::failed(url, classified.to_string());
            }
        };

        let status = response.status();
        let headers = header_map(response.headers());

        if status.as_u16() == 204 {
            return ApiCallResult::ok(url, None);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            let data = serde_json::from_str::<serde_json::Value>(&body).ok();
            return ApiCallResult {
                success: true,
                data,
                status_code: Some(status.as_u16()),
                response_headers: Some(headers),
                url: url.to_string(),
                ..Default::default()
            };
        }

        let error_data = match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(parsed) => Some(parsed),
            Err(_) if !body.is_empty() => Some(serde_json::json!({
                "raw_response": body,
                "note": "Response is not valid JSON"
            })),
            Err(_) => Some(serde_json::json!({"note": "Response body is empty"})),
        };

        ApiCallResult {
            success: false,
            data: None,
            status_code: Some(status.as_u16()),
            error: Some(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Error")
            )),
            error_data,
            error_text: if body.is_empty() { None } else { Some(body) },
            response_headers: Some(headers),
            url: url.to_string(),
        }
    }
}

pub(crate) fn build_auth_header(credentials: &RakutenCredentials) -> String {
    let pair = format!(
        "{}:{}",
        credentials.service_secret, credentials.license_key
    );
    format!("ESA {}", BASE64.encode(pair.as_bytes()))
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header_is_esa_base64() {
        let credentials = RakutenCredentials {
            service_secret: "secret".to_string(),
            license_key: "key".to_string(),
        };
        // base64("secret:key")
        assert_eq!(build_auth_header(&credentials), "ESA c2VjcmV0OmtleQ==");
    }
}

#[async_trait::async_trait]
impl listing_service_core::services::marketplace::MarketplaceClient for RakutenClient {
    async fn product_upsert(
        &self,
        manage_number: &str,
        payload: &listing_service_core::dto::rakuten::RakutenItemPayload,
    ) -> ApiCallResult {
        RakutenClient::product_upsert(self, manage_number, payload).await
    }

    async fn product_price_patch(
        &self,
        manage_number: &str,
        body: &listing_service_core::dto::rakuten::PricePatchBody,
    ) -> ApiCallResult {
        RakutenClient::product_price_patch(self, manage_number, body).await
    }

    async fn product_delete(&self, manage_number: &str) -> ApiCallResult {
        RakutenClient::product_delete(self, manage_number).await
    }

    async fn product_get(&self, manage_number: &str) -> ApiCallResult {
        RakutenClient::product_get(self, manage_number).await
    }

    async fn category_map(
        &self,
        manage_number: &str,
        category_ids: &[String],
        main_plural_category_id: Option<&str>,
    ) -> ApiCallResult {
        RakutenClient::category_map(self, manage_number, category_ids, main_plural_category_id)
            .await
    }

    async fn cabinet_create_folder(
        &self,
        folder_name: &str,
        directory_name: Option<&str>,
        upper_folder_id: Option<i64>,
    ) -> listing_service_core::services::marketplace::CabinetResult {
        RakutenClient::cabinet_create_folder(self, folder_name, directory_name, upper_folder_id)
            .await
    }

    async fn cabinet_upload_file(
        &self,
        file_name: &str,
        file_path_name: Option<&str>,
        folder_id: i64,
        data: &[u8],
        overwrite: bool,
    ) -> listing_service_core::services::marketplace::CabinetResult {
        RakutenClient::cabinet_upload_file(self, file_name, file_path_name, folder_id, data, overwrite)
            .await
    }

    async fn inventory_upsert(
        &self,
        manage_number: &str,
        variant_id: &str,
        request: &listing_service_core::services::marketplace::InventoryUpsertRequest,
    ) -> ApiCallResult {
        RakutenClient::inventory_upsert(self, manage_number, variant_id, request).await
    }
}
