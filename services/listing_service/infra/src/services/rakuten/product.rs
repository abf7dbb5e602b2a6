//! Item and category-mapping endpoints.

use listing_service_core::dto::rakuten::{ApiCallResult, PricePatchBody, RakutenItemPayload};
use listing_service_core::services::marketplace::dedupe_category_ids;

use super::{RakutenClient, CATEGORY_MAPPING_BASE_URL, ITEMS_BASE_URL};

/// RMS caps category mappings at five per item.
const MAX_CATEGORY_IDS: usize = 5;

impl RakutenClient {
    pub async fn product_upsert(
        &self,
        manage_number: &str,
        payload: &RakutenItemPayload,
    ) -> ApiCallResult {
        let url = format!("{}/{}", ITEMS_BASE_URL, manage_number);
        self.send_json(self.http.put(&url).json(payload), &url).await
    }

    pub async fn product_price_patch(
        &self,
        manage_number: &str,
        body: &PricePatchBody,
    ) -> ApiCallResult {
        let url = format!("{}/{}", ITEMS_BASE_URL, manage_number);
        self.send_json(self.http.patch(&url).json(body), &url).await
    }

    pub async fn product_delete(&self, manage_number: &str) -> ApiCallResult {
        let url = format!("{}/{}", ITEMS_BASE_URL, manage_number);
        self.send_json(self.http.delete(&url), &url).await
    }

    pub async fn product_get(&self, manage_number: &str) -> ApiCallResult {
        let url = format!("{}/{}", ITEMS_BASE_URL, manage_number);
        self.send_json(self.http.get(&url), &url).await
    }

    pub async fn category_map(
        &self,
        manage_number: &str,
        category_ids: &[String],
        main_plural_category_id: Option<&str>,
    ) -> ApiCallResult {
        let url = format!("{}/{}", CATEGORY_MAPPING_BASE_URL, manage_number);

        let mut unique = dedupe_category_ids(category_ids);
        if unique.is_empty() {
            return ApiCallResult::failed(&url, "At least one category ID is required");
        }
        if unique.len() > MAX_CATEGORY_IDS {
            tracing::warn!(
                manage_number,
                count = unique.len(),
                "category list capped at {}",
                MAX_CATEGORY_IDS
            );
            unique.truncate(MAX_CATEGORY_IDS);
        }

        let mut body = serde_json::json!({ "categoryIds": unique });
        if let Some(main_id) = main_plural_category_id {
            body["mainPluralCategoryId"] = serde_json::Value::String(main_id.to_string());
        }

        self.send_json(self.http.put(&url).json(&body), &url).await
    }
}
