//! Marketplace client trait.
//!
//! Every method returns the tagged [`ApiCallResult`] (or the Cabinet variant)
//! for both success and failure; errors never cross this boundary as `Err`.
//! The orchestrator turns these results into state transitions.

use async_trait::async_trait;
use serde::Serialize;

use crate::dto::rakuten::{ApiCallResult, PricePatchBody, RakutenItemPayload};

/// Inventory upsert body for one variant.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryUpsertRequest {
    pub mode: String,
    pub quantity: i64,
    #[serde(rename = "operationLeadTime", skip_serializing_if = "Option::is_none")]
    pub operation_lead_time: Option<serde_json::Value>,
    #[serde(rename = "shipFromIds", skip_serializing_if = "Option::is_none")]
    pub ship_from_ids: Option<Vec<i64>>,
}

/// Result of a Cabinet folder or file insert.
#[derive(Debug, Clone, Default)]
pub struct CabinetResult {
    pub success: bool,
    /// FolderId or FileId returned by the endpoint
    pub id: Option<i64>,
    pub result_code: Option<i32>,
    pub error: Option<String>,
}

#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Register or fully update a product. PUT; 204 on success.
    async fn product_upsert(
        &self,
        manage_number: &str,
        payload: &RakutenItemPayload,
    ) -> ApiCallResult;

    /// Price-only partial update, used for blocked products. PATCH; 204 on
    /// success.
    async fn product_price_patch(
        &self,
        manage_number: &str,
        body: &PricePatchBody,
    ) -> ApiCallResult;

    /// DELETE; 204 on success.
    async fn product_delete(&self, manage_number: &str) -> ApiCallResult;

    /// GET; 200 with the item body, or 404 when absent.
    async fn product_get(&self, manage_number: &str) -> ApiCallResult;

    /// Map 1..5 marketplace category IDs onto a product. Duplicates are
    /// removed order-preservingly before sending.
    async fn category_map(
        &self,
        manage_number: &str,
        category_ids: &[String],
        main_plural_category_id: Option<&str>,
    ) -> ApiCallResult;

    /// Create a Cabinet folder; returns the new folder id.
    async fn cabinet_create_folder(
        &self,
        folder_name: &str,
        directory_name: Option<&str>,
        upper_folder_id: Option<i64>,
    ) -> CabinetResult;

    /// Upload one image into a Cabinet folder. Enforces the 2MB size cap,
    /// the allowed formats and the 3840x3840 dimension cap before sending.
    async fn cabinet_upload_file(
        &self,
        file_name: &str,
        file_path_name: Option<&str>,
        folder_id: i64,
        data: &[u8],
        overwrite: bool,
    ) -> CabinetResult;

    /// Upsert stock for one variant. PUT; 204 on success.
    async fn inventory_upsert(
        &self,
        manage_number: &str,
        variant_id: &str,
        request: &InventoryUpsertRequest,
    ) -> ApiCallResult;
}

/// Order-preserving dedup applied to category lists before mapping.
pub fn dedupe_category_ids(category_ids: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for id in category_ids {
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        if seen.insert(id.to_string()) {
            out.push(id.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_preserves_order() {
        let ids = vec![
            "100".to_string(),
            "200".to_string(),
            "100".to_string(),
            " ".to_string(),
            "300".to_string(),
        ];
        assert_eq!(dedupe_category_ids(&ids), vec!["100", "200", "300"]);
    }
}
