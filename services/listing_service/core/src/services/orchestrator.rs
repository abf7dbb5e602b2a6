//! Registration state machine for the marketplace.
//!
//! Drives the multi-endpoint registration protocol per canonical product:
//! item PUT/PATCH, category mapping, Cabinet image upload, inventory upsert
//! and status reconciliation. Batch forms run sequentially with per-item
//! isolation so one failing product never poisons the rest.

use serde::Serialize;
use std::sync::Arc;

use crate::dto::listing::{BatchOutcome, ItemOutcome};
use crate::dto::rakuten::{
    format_error_message, ApiCallResult, CategoryMappingOutcome, PriceOnlyVariant, PricePatchBody,
    RakutenItemPayload,
};
use crate::models::{RakutenStatus, RegistrationStatus};
use crate::repositories::canonical_product::CanonicalProductRepository;
use crate::repositories::origin_product::OriginProductRepository;
use crate::services::images::StoredImageReader;
use crate::services::marketplace::{dedupe_category_ids, InventoryUpsertRequest, MarketplaceClient};
use crate::Result;
use shared_error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationOutcome {
    pub item_number: String,
    pub success: bool,
    pub price_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_mapping: Option<CategoryMappingOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRegistrationOutcome {
    pub item_number: String,
    pub success: bool,
    pub folder_id: Option<i64>,
    pub uploaded: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryRegistrationOutcome {
    pub item_number: String,
    pub success: bool,
    pub registered_count: usize,
    pub total_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub item_number: String,
    pub previous_status: Option<RakutenStatus>,
    pub new_status: Option<RakutenStatus>,
    pub hide_item: Option<bool>,
    pub changed: bool,
}

pub struct Orchestrator {
    client: Arc<dyn MarketplaceClient>,
    canonical: Arc<dyn CanonicalProductRepository>,
    origin: Arc<dyn OriginProductRepository>,
    image_reader: Arc<dyn StoredImageReader>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn MarketplaceClient>,
        canonical: Arc<dyn CanonicalProductRepository>,
        origin: Arc<dyn OriginProductRepository>,
        image_reader: Arc<dyn StoredImageReader>,
    ) -> Self {
        Self {
            client,
            canonical,
            origin,
            image_reader,
        }
    }

    /// Register (or fully update) one product on the marketplace.
    ///
    /// Blocked products only receive a price PATCH and are returned without
    /// any status or category-map side effects. For the full path, a
    /// category-map failure is recorded on the outcome but does not undo a
    /// successful registration.
    pub async fn register(&self, item_number: &str) -> Result<RegistrationOutcome> {
        let product = self
            .canonical
            .find_by_item_number(item_number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("product '{}' not found", item_number))
            })?;

        if product.block {
            tracing::info!(item_number, "product is blocked, updating price only");
            return self.register_price_only(&product).await;
        }

        let payload = RakutenItemPayload::from(&product);
        let result = self.client.product_upsert(item_number, &payload).await;

        if !result.success {
            let formatted = format_error_message(&result);
            tracing::error!(item_number, error = %formatted, "product registration failed");
            self.canonical
                .set_rakuten_status(item_number, Some(RakutenStatus::False), Some(&formatted))
                .await?;
            return Ok(RegistrationOutcome {
                item_number: item_number.to_string(),
                success: false,
                price_only: false,
                error: Some(formatted),
                category_mapping: None,
            });
        }

        let category_mapping = self.map_categories(item_number, &product.r_cat_id).await;

        self.canonical
            .set_rakuten_status(item_number, Some(RakutenStatus::True), None)
            .await?;
        tracing::info!(item_number, "product registered");

        Ok(RegistrationOutcome {
            item_number: item_number.to_string(),
            success: true,
            price_only: false,
            error: None,
            category_mapping,
        })
    }

    async fn register_price_only(
        &self,
        product: &crate::models::CanonicalProduct,
    ) -> Result<RegistrationOutcome> {
        let mut variants = std::collections::BTreeMap::new();
        for (sku_id, variant) in &product.variants {
            match coerce_price_to_integer(&variant.standard_price) {
                Some(price) if price >= 0 => {
                    variants.insert(
                        sku_id.clone(),
                        PriceOnlyVariant {
                            standard_price: price.to_string(),
                            selector_values: if variant.selector_values.is_empty() {
                                None
                            } else {
                                Some(variant.selector_values.clone())
                            },
                        },
                    );
                }
                _ => {
                    tracing::warn!(
                        item_number = %product.item_number,
                        sku_id = %sku_id,
                        price = %variant.standard_price,
                        "skipping variant with unusable price"
                    );
                }
            }
        }

        if variants.is_empty() {
            return Ok(RegistrationOutcome {
                item_number: product.item_number.clone(),
                success: false,
                price_only: true,
                error: Some(format!(
                    "No valid price data found for blocked product '{}'",
                    product.item_number
                )),
                category_mapping: None,
            });
        }

        let body = PricePatchBody {
            variants,
            genre_id: product.genre_id.clone(),
        };
        let result = self
            .client
            .product_price_patch(&product.item_number, &body)
            .await;

        let error = if result.success {
            None
        } else {
            Some(format_error_message(&result))
        };
        Ok(RegistrationOutcome {
            item_number: product.item_number.clone(),
            success: result.success,
            price_only: true,
            error,
            category_mapping: None,
        })
    }

    async fn map_categories(
        &self,
        item_number: &str,
        r_cat_id: &[String],
    ) -> Option<CategoryMappingOutcome> {
        let category_ids = dedupe_category_ids(r_cat_id);
        if category_ids.is_empty() {
            tracing::debug!(item_number, "no category IDs to map");
            return None;
        }

        let result = self
            .client
            .category_map(item_number, &category_ids, None)
            .await;
        if result.success {
            Some(CategoryMappingOutcome {
                success: true,
                category_ids: Some(category_ids),
                error: None,
            })
        } else {
            // registration stands; the mapping failure is only surfaced
            tracing::warn!(
                item_number,
                error = ?result.error,
                "product registered but category mapping failed"
            );
            Some(CategoryMappingOutcome {
                success: false,
                category_ids: Some(category_ids),
                error: Some(format_error_message(&result)),
            })
        }
    }

    pub async fn register_many(&self, item_numbers: &[String]) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for item_number in item_numbers {
            match self.register(item_number).await {
                Ok(outcome) if outcome.success => batch.push(ItemOutcome::ok(item_number)),
                Ok(outcome) => batch.push(ItemOutcome::failed(
                    item_number,
                    outcome.error.unwrap_or_else(|| "registration failed".into()),
                )),
                Err(e) => batch.push(ItemOutcome::failed(item_number, e.to_string())),
            }
        }
        batch
    }

    /// Upload a product's images into its Cabinet folder, creating the
    /// folder on first use.
    pub async fn register_images(&self, item_number: &str) -> Result<ImageRegistrationOutcome> {
        let product = self
            .canonical
            .find_by_item_number(item_number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("product '{}' not found", item_number))
            })?;

        if product.images.is_empty() {
            return Err(AppError::ValidationError(format!(
                "product '{}' has no images to register",
                item_number
            )));
        }

        let code = product
            .product_image_code
            .clone()
            .unwrap_or_else(|| crate::services::images::product_image_code(item_number));
        let folder_name = format!("img{}", code);

        let folder = self
            .client
            .cabinet_create_folder(&folder_name, Some(&folder_name), None)
            .await;
        let folder_id = match folder.id {
            Some(id) => id,
            None => {
                let error = folder
                    .error
                    .unwrap_or_else(|| "folder creation returned no id".into());
                self.canonical
                    .set_image_registration_status(item_number, "false")
                    .await?;
                return Ok(ImageRegistrationOutcome {
                    item_number: item_number.to_string(),
                    success: false,
                    folder_id: None,
                    uploaded: 0,
                    total: product.images.len(),
                    errors: vec![error],
                });
            }
        };

        let mut uploaded = 0;
        let mut errors = Vec::new();
        for image in &product.images {
            let file_name = image
                .location
                .rsplit('/')
                .next()
                .unwrap_or(&image.location)
                .to_string();
            match self.image_reader.read(&image.location).await {
                Ok(data) => {
                    let result = self
                        .client
                        .cabinet_upload_file(&file_name, None, folder_id, &data, false)
                        .await;
                    if result.success {
                        uploaded += 1;
                    } else {
                        errors.push(format!(
                            "{}: {}",
                            file_name,
                            result.error.unwrap_or_else(|| "upload failed".into())
                        ));
                    }
                }
                Err(e) => errors.push(format!("{}: {}", file_name, e)),
            }
        }

        let total = product.images.len();
        let status = if uploaded == total {
            "true"
        } else if uploaded == 0 {
            "false"
        } else {
            "partial"
        };
        self.canonical
            .set_image_registration_status(item_number, status)
            .await?;

        Ok(ImageRegistrationOutcome {
            item_number: item_number.to_string(),
            success: uploaded == total,
            folder_id: Some(folder_id),
            uploaded,
            total,
            errors,
        })
    }

    pub async fn register_images_many(&self, item_numbers: &[String]) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for item_number in item_numbers {
            match self.register_images(item_number).await {
                Ok(outcome) if outcome.success => batch.push(ItemOutcome::ok(item_number)),
                Ok(outcome) => {
                    batch.push(ItemOutcome::failed(item_number, outcome.errors.join("; ")))
                }
                Err(e) => batch.push(ItemOutcome::failed(item_number, e.to_string())),
            }
        }
        batch
    }

    /// Push every variant's stock to the marketplace, sequentially.
    pub async fn register_inventory(
        &self,
        item_number: &str,
    ) -> Result<InventoryRegistrationOutcome> {
        let product = self
            .canonical
            .find_by_item_number(item_number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("product '{}' not found", item_number))
            })?;

        let inventory = product.inventory.ok_or_else(|| {
            AppError::ValidationError(format!(
                "no inventory data found for product '{}'",
                item_number
            ))
        })?;
        if inventory.variants.is_empty() {
            return Err(AppError::ValidationError(format!(
                "no variants found in inventory data for product '{}'",
                item_number
            )));
        }

        let manage_number = if inventory.manage_number.is_empty() {
            item_number.to_string()
        } else {
            inventory.manage_number.clone()
        };

        let mut registered = 0;
        let mut errors = Vec::new();
        for variant in &inventory.variants {
            let request = InventoryUpsertRequest {
                mode: variant.mode.clone(),
                quantity: variant.quantity,
                operation_lead_time: variant
                    .operation_lead_time
                    .as_ref()
                    .and_then(|olt| serde_json::to_value(olt).ok()),
                ship_from_ids: None,
            };
            let result = self
                .client
                .inventory_upsert(&manage_number, &variant.variant_id, &request)
                .await;
            if result.success {
                registered += 1;
            } else {
                errors.push(format!(
                    "{}: {}",
                    variant.variant_id,
                    format_error_message(&result)
                ));
            }
        }

        let total = inventory.variants.len();
        let status = if registered == total {
            "true"
        } else if registered == 0 {
            "false"
        } else {
            "partial"
        };
        self.canonical
            .set_inventory_registration_status(item_number, status)
            .await?;

        Ok(InventoryRegistrationOutcome {
            item_number: item_number.to_string(),
            success: registered == total,
            registered_count: registered,
            total_count: total,
            errors,
        })
    }

    pub async fn register_inventory_many(&self, item_numbers: &[String]) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for item_number in item_numbers {
            match self.register_inventory(item_number).await {
                Ok(outcome) if outcome.success => batch.push(ItemOutcome::ok(item_number)),
                Ok(outcome) => {
                    batch.push(ItemOutcome::failed(item_number, outcome.errors.join("; ")))
                }
                Err(e) => batch.push(ItemOutcome::failed(item_number, e.to_string())),
            }
        }
        batch
    }

    /// Remove a product from the marketplace. On success the canonical row
    /// becomes `deleted` and the origin row is marked previously-registered.
    pub async fn delete(&self, item_number: &str) -> Result<ApiCallResult> {
        let result = self.client.product_delete(item_number).await;
        if result.success {
            self.canonical
                .set_rakuten_status(item_number, Some(RakutenStatus::Deleted), None)
                .await?;
            self.origin
                .set_registration_status(
                    &[item_number.to_string()],
                    RegistrationStatus::PreviouslyRegistered,
                )
                .await?;
            tracing::info!(item_number, "product deleted from marketplace");
        }
        Ok(result)
    }

    pub async fn delete_many(&self, item_numbers: &[String]) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for item_number in item_numbers {
            match self.delete(item_number).await {
                Ok(result) if result.success => batch.push(ItemOutcome::ok(item_number)),
                Ok(result) => batch.push(ItemOutcome::failed(
                    item_number,
                    format_error_message(&result),
                )),
                Err(e) => batch.push(ItemOutcome::failed(item_number, e.to_string())),
            }
        }
        batch
    }

    /// Reconcile the stored status with the marketplace.
    ///
    /// 200 with `hideItem=false` means on sale, `hideItem=true` means
    /// stopped; 404 means deleted. Any other failure leaves the database
    /// untouched and surfaces the error.
    pub async fn reconcile(&self, item_number: &str) -> Result<ReconcileOutcome> {
        let product = self
            .canonical
            .find_by_item_number(item_number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("product '{}' not found", item_number))
            })?;
        let previous = product.rakuten_registration_status;

        let result = self.client.product_get(item_number).await;

        if result.success {
            let hide_item = extract_hide_item(&result);
            let new_status = if hide_item {
                RakutenStatus::Stop
            } else {
                RakutenStatus::OnSale
            };
            let changed = previous != Some(new_status);
            if changed {
                self.canonical
                    .set_rakuten_status(item_number, Some(new_status), None)
                    .await?;
            }
            return Ok(ReconcileOutcome {
                item_number: item_number.to_string(),
                previous_status: previous,
                new_status: Some(new_status),
                hide_item: Some(hide_item),
                changed,
            });
        }

        if result.is_not_found() {
            let changed = previous != Some(RakutenStatus::Deleted);
            if changed {
                self.canonical
                    .set_rakuten_status(item_number, Some(RakutenStatus::Deleted), None)
                    .await?;
            }
            return Ok(ReconcileOutcome {
                item_number: item_number.to_string(),
                previous_status: previous,
                new_status: Some(RakutenStatus::Deleted),
                hide_item: None,
                changed,
            });
        }

        Err(AppError::upstream(
            result.status_code,
            result
                .error
                .clone()
                .unwrap_or_else(|| "status check failed".into()),
            result.error_data.clone(),
        ))
    }

    pub async fn reconcile_many(&self, item_numbers: &[String]) -> BatchOutcome {
        let mut batch = BatchOutcome::default();
        for item_number in item_numbers {
            match self.reconcile(item_number).await {
                Ok(_) => batch.push(ItemOutcome::ok(item_number)),
                Err(e) => batch.push(ItemOutcome::failed(item_number, e.to_string())),
            }
        }
        batch
    }
}

/// Coerce a stored price to an integer: `"1200.0"` and `1200.5` both become
/// `1200`; anything unparsable is rejected.
fn coerce_price_to_integer(price: &str) -> Option<i64> {
    let trimmed = price.trim();
    if trimmed.is_empty() {
        return None;
    }
    let integer_part = trimmed.split('.').next().unwrap_or("");
    if let Ok(value) = integer_part.parse::<i64>() {
        return Some(value);
    }
    trimmed.parse::<f64>().ok().map(|f| f as i64)
}

fn extract_hide_item(result: &ApiCallResult) -> bool {
    match result.data.as_ref().and_then(|d| d.get("hideItem")) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => {
            matches!(s.to_lowercase().as_str(), "true" | "t" | "1")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{
        canonical_product, origin_product, FakeCanonicalRepo, FakeMarketplaceClient,
        FakeOriginRepo, FixtureImageReader,
    };
    use serde_json::json;

    fn orchestrator(
        client: Arc<FakeMarketplaceClient>,
        canonical: Arc<FakeCanonicalRepo>,
        origin: Arc<FakeOriginRepo>,
    ) -> Orchestrator {
        Orchestrator::new(client, canonical, origin, Arc::new(FixtureImageReader))
    }

    #[tokio::test]
    async fn test_register_success_sets_status_and_maps_categories() {
        let client = Arc::new(FakeMarketplaceClient::default());
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X1")]));
        let origin = Arc::new(FakeOriginRepo::with(vec![origin_product("X1")]));
        let orch = orchestrator(client.clone(), canonical.clone(), origin);

        let outcome = orch.register("X1").await.unwrap();
        assert!(outcome.success);
        assert!(!outcome.price_only);
        assert!(outcome.category_mapping.as_ref().unwrap().success);

        let row = canonical.get("X1").unwrap();
        assert_eq!(row.rakuten_registration_status, Some(RakutenStatus::True));
        assert!(row.rakuten_registered_at.is_some());
        assert_eq!(client.calls(), vec!["product_upsert", "category_map"]);
    }

    #[tokio::test]
    async fn test_register_failure_sets_false_and_keeps_error() {
        let client = Arc::new(FakeMarketplaceClient::default());
        *client.upsert_result.lock().unwrap() = Some(ApiCallResult {
            success: false,
            error: Some("400 Bad Request".into()),
            status_code: Some(400),
            error_data: Some(json!({"errors": [{"code": "E01", "message": "bad title"}]})),
            url: "u".into(),
            ..Default::default()
        });
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X1")]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client.clone(), canonical.clone(), origin);

        let outcome = orch.register("X1").await.unwrap();
        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.contains("[E01] bad title"));

        let row = canonical.get("X1").unwrap();
        assert_eq!(row.rakuten_registration_status, Some(RakutenStatus::False));
        assert_eq!(row.registration_error.as_deref(), Some(error.as_str()));
        // no category mapping after a failed registration
        assert_eq!(client.calls(), vec!["product_upsert"]);
    }

    #[tokio::test]
    async fn test_category_map_failure_is_non_fatal() {
        let client = Arc::new(FakeMarketplaceClient::default());
        *client.category_result.lock().unwrap() = Some(ApiCallResult::failed("u", "map failed"));
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X1")]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client.clone(), canonical.clone(), origin);

        let outcome = orch.register("X1").await.unwrap();
        assert!(outcome.success);
        let mapping = outcome.category_mapping.unwrap();
        assert!(!mapping.success);
        assert!(mapping.error.unwrap().contains("map failed"));
        assert_eq!(
            canonical.get("X1").unwrap().rakuten_registration_status,
            Some(RakutenStatus::True)
        );
    }

    #[tokio::test]
    async fn test_blocked_product_patches_price_only() {
        let client = Arc::new(FakeMarketplaceClient::default());
        let mut product = canonical_product("X1");
        product.block = true;
        product.variants.get_mut("1").unwrap().standard_price = "1200.0".to_string();
        product.variants.get_mut("1").unwrap().selector_values.clear();
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![product]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client.clone(), canonical.clone(), origin);

        let outcome = orch.register("X1").await.unwrap();
        assert!(outcome.success);
        assert!(outcome.price_only);
        assert!(outcome.category_mapping.is_none());

        // PATCH only, no PUT and no category map
        assert_eq!(client.calls(), vec!["product_price_patch"]);
        let bodies = client.patch_bodies.lock().unwrap();
        let rendered = serde_json::to_value(&bodies[0]).unwrap();
        assert_eq!(
            rendered,
            json!({"variants": {"1": {"standardPrice": "1200"}}, "genreId": "201198"})
        );
    }

    #[tokio::test]
    async fn test_blocked_product_without_prices_fails() {
        let client = Arc::new(FakeMarketplaceClient::default());
        let mut product = canonical_product("X1");
        product.block = true;
        product.variants.get_mut("1").unwrap().standard_price = "not-a-price".to_string();
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![product]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client.clone(), canonical, origin);

        let outcome = orch.register("X1").await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("No valid price data"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_hide_item_true_moves_to_stop() {
        let client = Arc::new(FakeMarketplaceClient::default());
        *client.get_result.lock().unwrap() = Some(ApiCallResult::ok(
            "u",
            Some(json!({"hideItem": true, "title": "x"})),
        ));
        let mut product = canonical_product("X1");
        product.rakuten_registration_status = Some(RakutenStatus::OnSale);
        product.rakuten_registered_at = Some(chrono::Utc::now());
        let registered_at = product.rakuten_registered_at;
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![product]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client, canonical.clone(), origin);

        let outcome = orch.reconcile("X1").await.unwrap();
        assert_eq!(outcome.previous_status, Some(RakutenStatus::OnSale));
        assert_eq!(outcome.new_status, Some(RakutenStatus::Stop));
        assert!(outcome.changed);

        let row = canonical.get("X1").unwrap();
        assert_eq!(row.rakuten_registration_status, Some(RakutenStatus::Stop));
        // a stop transition keeps the registration timestamp
        assert_eq!(row.rakuten_registered_at, registered_at);
    }

    #[tokio::test]
    async fn test_reconcile_visible_item_moves_to_onsale() {
        let client = Arc::new(FakeMarketplaceClient::default());
        *client.get_result.lock().unwrap() =
            Some(ApiCallResult::ok("u", Some(json!({"hideItem": false}))));
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X1")]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client, canonical.clone(), origin);

        let outcome = orch.reconcile("X1").await.unwrap();
        assert_eq!(outcome.new_status, Some(RakutenStatus::OnSale));
        assert_eq!(outcome.hide_item, Some(false));
    }

    #[tokio::test]
    async fn test_reconcile_404_moves_to_deleted() {
        let client = Arc::new(FakeMarketplaceClient::default());
        *client.get_result.lock().unwrap() = Some(ApiCallResult {
            success: false,
            status_code: Some(404),
            error: Some("404 Not Found".into()),
            url: "u".into(),
            ..Default::default()
        });
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X1")]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client, canonical.clone(), origin);

        let outcome = orch.reconcile("X1").await.unwrap();
        assert_eq!(outcome.new_status, Some(RakutenStatus::Deleted));
        assert_eq!(
            canonical.get("X1").unwrap().rakuten_registration_status,
            Some(RakutenStatus::Deleted)
        );
    }

    #[tokio::test]
    async fn test_reconcile_error_leaves_db_untouched() {
        let client = Arc::new(FakeMarketplaceClient::default());
        *client.get_result.lock().unwrap() = Some(ApiCallResult {
            success: false,
            status_code: Some(500),
            error: Some("server error".into()),
            url: "u".into(),
            ..Default::default()
        });
        let mut product = canonical_product("X1");
        product.rakuten_registration_status = Some(RakutenStatus::OnSale);
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![product]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client, canonical.clone(), origin);

        assert!(orch.reconcile("X1").await.is_err());
        assert_eq!(
            canonical.get("X1").unwrap().rakuten_registration_status,
            Some(RakutenStatus::OnSale)
        );
    }

    #[tokio::test]
    async fn test_delete_flips_canonical_and_origin() {
        let client = Arc::new(FakeMarketplaceClient::default());
        let mut origin_row = origin_product("X1");
        origin_row.registration_status = RegistrationStatus::Registered;
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X1")]));
        let origin = Arc::new(FakeOriginRepo::with(vec![origin_row]));
        let orch = orchestrator(client, canonical.clone(), origin.clone());

        let result = orch.delete("X1").await.unwrap();
        assert!(result.success);
        assert_eq!(
            canonical.get("X1").unwrap().rakuten_registration_status,
            Some(RakutenStatus::Deleted)
        );
        assert!(canonical.get("X1").unwrap().rakuten_registered_at.is_none());
        assert_eq!(
            origin.get("X1").unwrap().registration_status,
            RegistrationStatus::PreviouslyRegistered
        );
    }

    #[tokio::test]
    async fn test_register_inventory_aggregates_results() {
        let client = Arc::new(FakeMarketplaceClient::default());
        *client.inventory_results.lock().unwrap() = vec![
            ApiCallResult::ok("u", None),
            ApiCallResult::failed("u", "quantity out of range"),
        ];
        let mut product = canonical_product("X1");
        let inventory = product.inventory.as_mut().unwrap();
        inventory.variants.push(crate::dto::listing::InventoryVariant {
            variant_id: "2".to_string(),
            quantity: 100000,
            mode: "ABSOLUTE".to_string(),
            operation_lead_time: None,
        });
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![product]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client, canonical.clone(), origin);

        let outcome = orch.register_inventory("X1").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.registered_count, 1);
        assert_eq!(outcome.total_count, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(
            canonical.get("X1").unwrap().inventory_registration_status,
            Some("partial".to_string())
        );
    }

    #[tokio::test]
    async fn test_register_images_uploads_into_folder() {
        let client = Arc::new(FakeMarketplaceClient::default());
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X1")]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client.clone(), canonical.clone(), origin);

        let outcome = orch.register_images("X1").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.folder_id, Some(19946));
        assert_eq!(outcome.uploaded, 1);
        assert_eq!(
            client.calls(),
            vec!["cabinet_create_folder", "cabinet_upload_file"]
        );
        assert_eq!(
            canonical.get("X1").unwrap().image_registration_status,
            Some("true".to_string())
        );
    }

    #[tokio::test]
    async fn test_batch_isolation() {
        let client = Arc::new(FakeMarketplaceClient::default());
        let canonical = Arc::new(FakeCanonicalRepo::with(vec![canonical_product("X2")]));
        let origin = Arc::new(FakeOriginRepo::default());
        let orch = orchestrator(client, canonical, origin);

        // X1 is missing; X2 registers fine
        let batch = orch
            .register_many(&["X1".to_string(), "X2".to_string()])
            .await;
        assert_eq!(batch.error_count, 1);
        assert_eq!(batch.success_count, 1);
        assert!(!batch.results[0].success);
        assert!(batch.results[1].success);
    }

    #[test]
    fn test_coerce_price_to_integer() {
        assert_eq!(coerce_price_to_integer("1200"), Some(1200));
        assert_eq!(coerce_price_to_integer("1200.0"), Some(1200));
        assert_eq!(coerce_price_to_integer("1200.9"), Some(1200));
        assert_eq!(coerce_price_to_integer(""), None);
        assert_eq!(coerce_price_to_integer("abc"), None);
    }
}
