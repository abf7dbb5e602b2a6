//! Origin product repository implementation
//!
//! PostgreSQL implementation of the OriginProductRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use listing_service_core::models::{OriginProduct, RegistrationStatus};
use listing_service_core::repositories::category::CategoryRepository;
use listing_service_core::repositories::origin_product::{
    DimensionField, NewOriginProduct, OriginProductRepository,
};
use listing_service_core::Result;

use super::json_string_array;
use super::CategoryRepositoryImpl;

const SELECT_COLUMNS: &str = r#"
    product_id, title_c, title_t, main_category, middle_category, type_tag,
    monthly_sales, wholesale_price, weight, length, width, height, size,
    creation_date, repurchase_rate, rating_score, detail_json,
    registration_status, r_cat_id, keyword, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct OriginProductRow {
    product_id: String,
    title_c: Option<String>,
    title_t: Option<String>,
    main_category: Option<String>,
    middle_category: Option<String>,
    type_tag: Option<String>,
    monthly_sales: Option<i64>,
    wholesale_price: Option<f64>,
    weight: Option<f64>,
    length: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    size: Option<i32>,
    creation_date: Option<String>,
    repurchase_rate: Option<f64>,
    rating_score: Option<f64>,
    detail_json: Option<serde_json::Value>,
    registration_status: i32,
    r_cat_id: Option<serde_json::Value>,
    keyword: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OriginProductRow> for OriginProduct {
    fn from(row: OriginProductRow) -> Self {
        OriginProduct {
            registration_status: RegistrationStatus::from_i32(row.registration_status)
                .unwrap_or(RegistrationStatus::Unregistered),
            r_cat_id: json_string_array(row.r_cat_id.as_ref()),
            product_id: row.product_id,
            title_c: row.title_c,
            title_t: row.title_t,
            main_category: row.main_category,
            middle_category: row.middle_category,
            type_tag: row.type_tag,
            monthly_sales: row.monthly_sales,
            wholesale_price: row.wholesale_price,
            weight: row.weight,
            length: row.length,
            width: row.width,
            height: row.height,
            size: row.size,
            creation_date: row.creation_date,
            repurchase_rate: row.repurchase_rate,
            rating_score: row.rating_score,
            detail_json: row.detail_json,
            keyword: row.keyword,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL implementation of OriginProductRepository
pub struct OriginProductRepositoryImpl {
    pool: PgPool,
}

impl OriginProductRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Marketplace categories for a record: the mapping configured for its
    /// middle category, or failing that the raw main-category code wrapped
    /// in a one-element array.
    fn resolve_r_cat_id(
        record: &NewOriginProduct,
        rakuten_map: &HashMap<String, Vec<String>>,
    ) -> serde_json::Value {
        let resolved = match record
            .middle_category
            .as_deref()
            .and_then(|code| rakuten_map.get(code))
        {
            Some(mapped) => mapped.clone(),
            None => record
                .main_category
                .as_deref()
                .filter(|code| !code.trim().is_empty())
                .map(|code| vec![code.to_string()])
                .unwrap_or_default(),
        };
        serde_json::Value::Array(
            resolved
                .into_iter()
                .map(serde_json::Value::String)
                .collect(),
        )
    }
}

#[async_trait]
impl OriginProductRepository for OriginProductRepositoryImpl {
    async fn upsert_batch(&self, products: &[NewOriginProduct]) -> Result<usize> {
        // one category-map read covers the whole batch
        let rakuten_map = CategoryRepositoryImpl::new(self.pool.clone())
            .rakuten_category_map()
            .await?;

        let mut written = 0;
        for record in products {
            if let Err(reason) = record.validate() {
                tracing::warn!(reason = %reason, "skipping invalid harvested record");
                continue;
            }
            let r_cat_id = Self::resolve_r_cat_id(record, &rakuten_map);

            sqlx::query(
                r#"
                INSERT INTO products_origin (
                    product_id, title_c, title_t, main_category, middle_category,
                    type_tag, monthly_sales, wholesale_price, weight, length,
                    width, height, size, creation_date, repurchase_rate,
                    rating_score, detail_json, registration_status, r_cat_id, keyword
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, 1, $18, $19
                )
                ON CONFLICT (product_id) DO UPDATE SET
                    title_c = EXCLUDED.title_c,
                    title_t = EXCLUDED.title_t,
                    main_category = EXCLUDED.main_category,
                    middle_category = EXCLUDED.middle_category,
                    type_tag = EXCLUDED.type_tag,
                    monthly_sales = EXCLUDED.monthly_sales,
                    wholesale_price = EXCLUDED.wholesale_price,
                    weight = COALESCE(EXCLUDED.weight, products_origin.weight),
                    length = COALESCE(EXCLUDED.length, products_origin.length),
                    width = COALESCE(EXCLUDED.width, products_origin.width),
                    height = COALESCE(EXCLUDED.height, products_origin.height),
                    size = COALESCE(EXCLUDED.size, products_origin.size),
                    creation_date = EXCLUDED.creation_date,
                    repurchase_rate = EXCLUDED.repurchase_rate,
                    rating_score = EXCLUDED.rating_score,
                    detail_json = COALESCE(EXCLUDED.detail_json, products_origin.detail_json),
                    registration_status = COALESCE(products_origin.registration_status, 1),
                    r_cat_id = EXCLUDED.r_cat_id,
                    keyword = COALESCE(EXCLUDED.keyword, products_origin.keyword),
                    created_at = LEAST(products_origin.created_at, EXCLUDED.created_at),
                    updated_at = NOW()
                "#,
            )
            .bind(record.product_id.trim())
            .bind(&record.title_c)
            .bind(&record.title_t)
            .bind(&record.main_category)
            .bind(&record.middle_category)
            .bind(&record.type_tag)
            .bind(record.monthly_sales)
            .bind(record.wholesale_price)
            .bind(record.weight)
            .bind(record.length)
            .bind(record.width)
            .bind(record.height)
            .bind(record.size)
            .bind(&record.creation_date)
            .bind(record.repurchase_rate)
            .bind(record.rating_score)
            .bind(&record.detail_json)
            .bind(&r_cat_id)
            .bind(&record.keyword)
            .execute(&self.pool)
            .await?;
            written += 1;
        }

        tracing::info!(written, total = products.len(), "origin products upserted");
        Ok(written)
    }

    async fn find_by_id(&self, product_id: &str) -> Result<Option<OriginProduct>> {
        let row = sqlx::query_as::<_, OriginProductRow>(&format!(
            "SELECT {} FROM products_origin WHERE product_id = $1",
            SELECT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OriginProduct::from))
    }

    async fn find_by_ids(&self, product_ids: &[String]) -> Result<Vec<OriginProduct>> {
        let rows = sqlx::query_as::<_, OriginProductRow>(&format!(
            "SELECT {} FROM products_origin WHERE product_id = ANY($1)",
            SELECT_COLUMNS
        ))
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;

        // hand rows back in the requested order
        let mut by_id: HashMap<String, OriginProduct> = rows
            .into_iter()
            .map(OriginProduct::from)
            .map(|product| (product.product_id.clone(), product))
            .collect();
        Ok(product_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }

    async fn set_registration_status(
        &self,
        product_ids: &[String],
        status: RegistrationStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE products_origin
            SET registration_status = $2, updated_at = NOW()
            WHERE product_id = ANY($1)
            "#,
        )
        .bind(product_ids)
        .bind(status.as_i32())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn propagate_dimension(
        &self,
        category_ids: &[String],
        field: DimensionField,
        value: Option<f64>,
    ) -> Result<u64> {
        if category_ids.is_empty() {
            return Ok(0);
        }

        // the column name comes from a closed enum, never from input
        let result = if field == DimensionField::Size {
            sqlx::query(
                r#"
                UPDATE products_origin
                SET size = $2, updated_at = NOW()
                WHERE main_category = ANY($1) OR middle_category = ANY($1)
                "#,
            )
            .bind(category_ids)
            .bind(value.map(|v| v.round() as i32))
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                r#"
                UPDATE products_origin
                SET {} = $2, updated_at = NOW()
                WHERE main_category = ANY($1) OR middle_category = ANY($1)
                "#,
                field.as_column()
            ))
            .bind(category_ids)
            .bind(value)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected())
    }
}

impl OriginProductRepositoryImpl {
    /// Per-keyword convenience used by the refresh task: resolve, validate
    /// and upsert raw search records in one call.
    pub async fn upsert_raw_products(
        &self,
        raw: &[listing_service_core::dto::harvest::RawProduct],
        keyword: Option<&str>,
    ) -> Result<usize> {
        let records: Vec<NewOriginProduct> = raw
            .iter()
            .map(|product| listing_service_core::services::harvester::raw_to_origin(product, keyword))
            .collect();
        self.upsert_batch(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_r_cat_id_prefers_middle_category_mapping() {
        let mut map = HashMap::new();
        map.insert("middle".to_string(), vec!["100".to_string()]);
        map.insert("main".to_string(), vec!["200".to_string()]);

        let mut record = listing_service_core::services::harvester::raw_to_origin(
            &listing_service_core::dto::harvest::RawProduct {
                goods_id: "g".into(),
                title_t: Some("t".into()),
                ..Default::default()
            },
            None,
        );
        record.middle_category = Some("middle".into());
        record.main_category = Some("main".into());

        let resolved = OriginProductRepositoryImpl::resolve_r_cat_id(&record, &map);
        assert_eq!(resolved, serde_json::json!(["100"]));
    }

    #[test]
    fn test_resolve_r_cat_id_falls_back_to_raw_main_category() {
        let mut map = HashMap::new();
        map.insert("middle".to_string(), vec!["100".to_string()]);

        let mut record = listing_service_core::services::harvester::raw_to_origin(
            &listing_service_core::dto::harvest::RawProduct {
                goods_id: "g".into(),
                title_t: Some("t".into()),
                ..Default::default()
            },
            None,
        );
        record.middle_category = Some("unknown".into());
        record.main_category = Some("10".into());

        // an unmapped middle category falls back to the main-category code
        // itself, even when that code has no mapping either
        let resolved = OriginProductRepositoryImpl::resolve_r_cat_id(&record, &map);
        assert_eq!(resolved, serde_json::json!(["10"]));

        record.main_category = None;
        let resolved = OriginProductRepositoryImpl::resolve_r_cat_id(&record, &map);
        assert_eq!(resolved, serde_json::json!([]));

        record.main_category = Some("  ".into());
        let resolved = OriginProductRepositoryImpl::resolve_r_cat_id(&record, &map);
        assert_eq!(resolved, serde_json::json!([]));
    }
}
