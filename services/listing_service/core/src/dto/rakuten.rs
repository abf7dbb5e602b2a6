//! Marketplace API payloads and the tagged call result.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::dto::listing::{ItemImage, ProductDescription, Variant, VariantSelector};
use crate::models::CanonicalProduct;

/// Item payload for the marketplace items endpoint (PUT body).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RakutenItemPayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    pub product_description: ProductDescription,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_description: Option<String>,
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre_id: Option<String>,
    pub hide_item: bool,
    pub unlimited_inventory_flag: bool,
    pub images: Vec<ItemImage>,
    pub variant_selectors: Vec<VariantSelector>,
    pub variants: BTreeMap<String, Variant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<serde_json::Value>,
}

impl From<&CanonicalProduct> for RakutenItemPayload {
    fn from(product: &CanonicalProduct) -> Self {
        Self {
            title: product.title.clone(),
            tagline: product.tagline.clone(),
            product_description: product.product_description.clone(),
            sales_description: product.sales_description.clone(),
            item_type: product.item_type.clone(),
            genre_id: product.genre_id.clone(),
            hide_item: product.hide_item,
            unlimited_inventory_flag: product.unlimited_inventory_flag,
            images: product.images.clone(),
            variant_selectors: product.variant_selectors.clone(),
            variants: product.variants.clone(),
            features: product.features.clone(),
            payment: product.payment.clone(),
            layout: product.layout.clone(),
        }
    }
}

/// Price-only variant update used on the PATCH path for blocked products.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceOnlyVariant {
    #[serde(rename = "standardPrice")]
    pub standard_price: String,
    #[serde(rename = "selectorValues", skip_serializing_if = "Option::is_none")]
    pub selector_values: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricePatchBody {
    pub variants: BTreeMap<String, PriceOnlyVariant>,
    #[serde(rename = "genreId", skip_serializing_if = "Option::is_none")]
    pub genre_id: Option<String>,
}

/// Tagged result of one marketplace API call. Client methods return this for
/// every outcome instead of raising, so callers branch on `success` and the
/// orchestrator maps failures to state transitions.
#[derive(Debug, Clone, Default)]
pub struct ApiCallResult {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub error_data: Option<serde_json::Value>,
    pub error_text: Option<String>,
    pub response_headers: Option<HashMap<String, String>>,
    pub url: String,
}

impl ApiCallResult {
    pub fn ok(url: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            data,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }
}

/// Render an API failure into the operator-facing error string.
///
/// Marketplace error bodies carry an `errors` array of
/// `{code, message, metadata: {propertyPath}}` entries; each is listed on its
/// own line after the headline error.
pub fn format_error_message(result: &ApiCallResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Error: {}",
        result.error.as_deref().unwrap_or("Unknown error")
    ));

    if let Some(status) = result.status_code {
        lines.push(format!("Status Code: {}", status));
    }

    if let Some(error_data) = &result.error_data {
        match error_data.get("errors").and_then(|e| e.as_array()) {
            Some(errors) => {
                for error in errors {
                    let code = error
                        .get("code")
                        .and_then(|c| c.as_str())
                        .unwrap_or("UNKNOWN");
                    let message = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("No message");
                    let property_path = error
                        .get("metadata")
                        .and_then(|m| m.get("propertyPath"))
                        .and_then(|p| p.as_str())
                        .unwrap_or("");
                    if property_path.is_empty() {
                        lines.push(format!("  [{}] {}", code, message));
                    } else {
                        lines.push(format!("  [{}] {} (at {})", code, message, property_path));
                    }
                }
            }
            None => {
                lines.push(format!(
                    "Error Data: {}",
                    serde_json::to_string_pretty(error_data).unwrap_or_default()
                ));
            }
        }
    }

    if !result.url.is_empty() {
        lines.push(format!("URL: {}", result.url));
    }

    lines.join("\n")
}

/// Outcome of the optional category-mapping step attached to a registration.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryMappingOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_error_message_with_property_path() {
        let result = ApiCallResult {
            success: false,
            error: Some("422 Unprocessable Entity".to_string()),
            status_code: Some(422),
            error_data: Some(json!({
                "errors": [
                    {
                        "code": "INVALID_VALUE",
                        "message": "title too long",
                        "metadata": {"propertyPath": "title"}
                    },
                    {"code": "MISSING", "message": "genre required"}
                ]
            })),
            url: "https://api.rms.rakuten.co.jp/es/2.0/items/manage-numbers/x".to_string(),
            ..Default::default()
        };

        let message = format_error_message(&result);
        assert!(message.contains("Error: 422 Unprocessable Entity"));
        assert!(message.contains("Status Code: 422"));
        assert!(message.contains("[INVALID_VALUE] title too long (at title)"));
        assert!(message.contains("[MISSING] genre required"));
        assert!(message.contains("URL: https://"));
    }

    #[test]
    fn test_format_error_message_without_body() {
        let result = ApiCallResult::failed("https://example", "boom");
        let message = format_error_message(&result);
        assert_eq!(message, "Error: boom\nURL: https://example");
    }

    #[test]
    fn test_price_patch_body_shape() {
        let mut variants = BTreeMap::new();
        variants.insert(
            "S".to_string(),
            PriceOnlyVariant {
                standard_price: "1200".to_string(),
                selector_values: None,
            },
        );
        let body = PricePatchBody {
            variants,
            genre_id: Some("201198".to_string()),
        };
        let rendered = serde_json::to_value(&body).unwrap();
        assert_eq!(
            rendered,
            json!({"variants": {"S": {"standardPrice": "1200"}}, "genreId": "201198"})
        );
    }
}
