//! Canonical product repository implementation
//!
//! PostgreSQL implementation of the CanonicalProductRepository trait. The
//! listing-shaped JSON columns are decoded into the typed DTOs on read;
//! undecodable documents degrade to defaults with a log line instead of
//! failing the whole row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;

use listing_service_core::dto::listing::{
    InventoryPayload, ItemImage, ListQuery, ProductDescription, Variant, VariantSelector,
};
use listing_service_core::models::{CanonicalProduct, RakutenStatus};
use listing_service_core::repositories::canonical_product::CanonicalProductRepository;
use listing_service_core::Result;
use shared_error::AppError;

use super::json_string_array;

const SELECT_COLUMNS: &str = r#"
    item_number, title, tagline, product_description, sales_description,
    images, variant_selectors, variants, inventory, features, payment, layout,
    item_type, hide_item, unlimited_inventory_flag, genre_id, r_cat_id,
    rakuten_registration_status, image_registration_status,
    inventory_registration_status, rakuten_registered_at, registration_error,
    actual_purchase_price, change_status, block, src_url, main_category,
    middle_category, product_image_code, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct CanonicalProductRow {
    item_number: String,
    title: String,
    tagline: Option<String>,
    product_description: serde_json::Value,
    sales_description: Option<String>,
    images: serde_json::Value,
    variant_selectors: serde_json::Value,
    variants: serde_json::Value,
    inventory: Option<serde_json::Value>,
    features: Option<serde_json::Value>,
    payment: Option<serde_json::Value>,
    layout: Option<serde_json::Value>,
    item_type: String,
    hide_item: bool,
    unlimited_inventory_flag: bool,
    genre_id: Option<String>,
    r_cat_id: Option<serde_json::Value>,
    rakuten_registration_status: Option<String>,
    image_registration_status: Option<String>,
    inventory_registration_status: Option<String>,
    rakuten_registered_at: Option<DateTime<Utc>>,
    registration_error: Option<String>,
    actual_purchase_price: Option<f64>,
    change_status: Option<String>,
    block: bool,
    src_url: Option<String>,
    main_category: Option<String>,
    middle_category: Option<String>,
    product_image_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn decode_or_default<T: serde::de::DeserializeOwned + Default>(
    item_number: &str,
    column: &str,
    value: serde_json::Value,
) -> T {
    match serde_json::from_value(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(item_number, column, error = %e, "undecodable JSON column, using default");
            T::default()
        }
    }
}

impl From<CanonicalProductRow> for CanonicalProduct {
    fn from(row: CanonicalProductRow) -> Self {
        let item = row.item_number.clone();
        CanonicalProduct {
            product_description: decode_or_default::<ProductDescription>(
                &item,
                "product_description",
                row.product_description,
            ),
            images: decode_or_default::<Vec<ItemImage>>(&item, "images", row.images),
            variant_selectors: decode_or_default::<Vec<VariantSelector>>(
                &item,
                "variant_selectors",
                row.variant_selectors,
            ),
            variants: decode_or_default::<BTreeMap<String, Variant>>(
                &item,
                "variants",
                row.variants,
            ),
            inventory: row
                .inventory
                .and_then(|value| serde_json::from_value::<InventoryPayload>(value).ok()),
            r_cat_id: json_string_array(row.r_cat_id.as_ref()),
            rakuten_registration_status: RakutenStatus::normalize(
                row.rakuten_registration_status.as_deref(),
            ),
            item_number: row.item_number,
            title: row.title,
            tagline: row.tagline,
            sales_description: row.sales_description,
            features: row.features,
            payment: row.payment,
            layout: row.layout,
            item_type: row.item_type,
            hide_item: row.hide_item,
            unlimited_inventory_flag: row.unlimited_inventory_flag,
            genre_id: row.genre_id,
            image_registration_status: row.image_registration_status,
            inventory_registration_status: row.inventory_registration_status,
            rakuten_registered_at: row.rakuten_registered_at,
            registration_error: row.registration_error,
            actual_purchase_price: row.actual_purchase_price,
            change_status: row.change_status,
            block: row.block,
            src_url: row.src_url,
            main_category: row.main_category,
            middle_category: row.middle_category,
            product_image_code: row.product_image_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL implementation of CanonicalProductRepository
pub struct CanonicalProductRepositoryImpl {
    pool: PgPool,
}

impl CanonicalProductRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(AppError::from)
}

#[async_trait]
impl CanonicalProductRepository for CanonicalProductRepositoryImpl {
    async fn upsert_with_origin_status(&self, product: &CanonicalProduct) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO product_management (
                item_number, title, tagline, product_description, sales_description,
                images, variant_selectors, variants, inventory, features, payment,
                layout, item_type, hide_item, unlimited_inventory_flag, genre_id,
                r_cat_id, rakuten_registration_status, image_registration_status,
                inventory_registration_status, rakuten_registered_at,
                registration_error, actual_purchase_price, change_status, block,
                src_url, main_category, middle_category, product_image_code
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
            )
            ON CONFLICT (item_number) DO UPDATE SET
                title = EXCLUDED.title,
                tagline = EXCLUDED.tagline,
                product_description = EXCLUDED.product_description,
                sales_description = EXCLUDED.sales_description,
                images = EXCLUDED.images,
                variant_selectors = EXCLUDED.variant_selectors,
                variants = EXCLUDED.variants,
                inventory = EXCLUDED.inventory,
                features = EXCLUDED.features,
                payment = EXCLUDED.payment,
                layout = EXCLUDED.layout,
                item_type = EXCLUDED.item_type,
                hide_item = EXCLUDED.hide_item,
                unlimited_inventory_flag = EXCLUDED.unlimited_inventory_flag,
                genre_id = EXCLUDED.genre_id,
                r_cat_id = EXCLUDED.r_cat_id,
                rakuten_registration_status = EXCLUDED.rakuten_registration_status,
                image_registration_status = EXCLUDED.image_registration_status,
                inventory_registration_status = EXCLUDED.inventory_registration_status,
                rakuten_registered_at = EXCLUDED.rakuten_registered_at,
                registration_error = EXCLUDED.registration_error,
                actual_purchase_price = EXCLUDED.actual_purchase_price,
                change_status = EXCLUDED.change_status,
                block = EXCLUDED.block,
                src_url = EXCLUDED.src_url,
                main_category = EXCLUDED.main_category,
                middle_category = EXCLUDED.middle_category,
                product_image_code = EXCLUDED.product_image_code,
                updated_at = NOW()
            "#,
        )
        .bind(&product.item_number)
        .bind(&product.title)
        .bind(&product.tagline)
        .bind(to_json(&product.product_description)?)
        .bind(&product.sales_description)
        .bind(to_json(&product.images)?)
        .bind(to_json(&product.variant_selectors)?)
        .bind(to_json(&product.variants)?)
        .bind(
            product
                .inventory
                .as_ref()
                .map(to_json)
                .transpose()?,
        )
        .bind(&product.features)
        .bind(&product.payment)
        .bind(&product.layout)
        .bind(&product.item_type)
        .bind(product.hide_item)
        .bind(product.unlimited_inventory_flag)
        .bind(&product.genre_id)
        .bind(to_json(&product.r_cat_id)?)
        .bind(
            product
                .rakuten_registration_status
                .map(|status| status.to_string()),
        )
        .bind(&product.image_registration_status)
        .bind(&product.inventory_registration_status)
        .bind(product.rakuten_registered_at)
        .bind(&product.registration_error)
        .bind(product.actual_purchase_price)
        .bind(&product.change_status)
        .bind(product.block)
        .bind(&product.src_url)
        .bind(&product.main_category)
        .bind(&product.middle_category)
        .bind(&product.product_image_code)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE products_origin
            SET registration_status = 2, updated_at = NOW()
            WHERE product_id = $1
            "#,
        )
        .bind(&product.item_number)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_item_number(&self, item_number: &str) -> Result<Option<CanonicalProduct>> {
        let row = sqlx::query_as::<_, CanonicalProductRow>(&format!(
            "SELECT {} FROM product_management WHERE item_number = $1",
            SELECT_COLUMNS
        ))
        .bind(item_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CanonicalProduct::from))
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<CanonicalProduct>> {
        let rows = sqlx::query_as::<_, CanonicalProductRow>(&format!(
            "SELECT {} FROM product_management ORDER BY {} {} NULLS LAST LIMIT $1 OFFSET $2",
            SELECT_COLUMNS,
            query.sort_by.as_column(),
            query.sort_order.as_sql(),
        ))
        .bind(query.limit.max(0))
        .bind(query.offset.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CanonicalProduct::from).collect())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_management")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete(&self, item_numbers: &[String]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // a registered origin row becomes previously-registered, so the UI
        // can tell it apart from one that never went out
        sqlx::query(
            r#"
            UPDATE products_origin
            SET registration_status = 3, updated_at = NOW()
            WHERE product_id = ANY($1) AND registration_status = 2
            "#,
        )
        .bind(item_numbers)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM product_management WHERE item_number = ANY($1)")
            .bind(item_numbers)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(deleted = result.rows_affected(), "canonical products deleted");
        Ok(result.rows_affected())
    }

    async fn update_hide_item(&self, item_numbers: &[String], hidden: bool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE product_management
            SET hide_item = $2, updated_at = NOW()
            WHERE item_number = ANY($1)
              AND (
                  rakuten_registration_status IS NULL
                  OR rakuten_registration_status IN ('', 'onsale', 'true', 'false')
              )
            "#,
        )
        .bind(item_numbers)
        .bind(hidden)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn remove_image(&self, item_number: &str, location: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let images: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT images FROM product_management WHERE item_number = $1 FOR UPDATE",
        )
        .bind(item_number)
        .fetch_optional(&mut *tx)
        .await?;

        let images = match images {
            Some(images) => images,
            None => return Ok(false),
        };
        let mut decoded: Vec<ItemImage> =
            serde_json::from_value(images).unwrap_or_default();
        let target = location.trim();
        let before = decoded.len();
        decoded.retain(|image| image.location.trim() != target);
        if decoded.len() == before {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE product_management SET images = $2, updated_at = NOW() WHERE item_number = $1",
        )
        .bind(item_number)
        .bind(serde_json::to_value(&decoded)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn set_rakuten_status(
        &self,
        item_number: &str,
        status: Option<RakutenStatus>,
        error: Option<&str>,
    ) -> Result<()> {
        let status_text = status.map(|s| s.to_string());
        let result = sqlx::query(
            r#"
            UPDATE product_management
            SET rakuten_registration_status = $2,
                registration_error = $3,
                rakuten_registered_at = CASE
                    WHEN $2 = 'true' THEN COALESCE(rakuten_registered_at, NOW())
                    WHEN $2 = 'deleted' THEN NULL
                    ELSE rakuten_registered_at
                END,
                updated_at = NOW()
            WHERE item_number = $1
            "#,
        )
        .bind(item_number)
        .bind(status_text)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "product '{}' not found",
                item_number
            )));
        }
        Ok(())
    }

    async fn set_image_registration_status(&self, item_number: &str, status: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE product_management
            SET image_registration_status = $2, updated_at = NOW()
            WHERE item_number = $1
            "#,
        )
        .bind(item_number)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_inventory_registration_status(
        &self,
        item_number: &str,
        status: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE product_management
            SET inventory_registration_status = $2, updated_at = NOW()
            WHERE item_number = $1
            "#,
        )
        .bind(item_number)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
