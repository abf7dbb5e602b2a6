//! Inventory upsert endpoint.

use listing_service_core::dto::rakuten::ApiCallResult;
use listing_service_core::services::marketplace::InventoryUpsertRequest;

use super::{RakutenClient, INVENTORY_BASE_URL};

impl RakutenClient {
    pub async fn inventory_upsert(
        &self,
        manage_number: &str,
        variant_id: &str,
        request: &InventoryUpsertRequest,
    ) -> ApiCallResult {
        let url = format!(
            "{}/{}/variants/{}",
            INVENTORY_BASE_URL, manage_number, variant_id
        );
        self.send_json(self.http.put(&url).json(request), &url).await
    }
}
