//! Category repository implementation
//!
//! PostgreSQL implementation of the CategoryRepository trait, including the
//! propagation of marketplace category IDs into both product tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use listing_service_core::models::{Category, CategoryAttributeGroup, PrimaryCategory};
use listing_service_core::repositories::category::{
    CategoryPatch, CategoryRepository, NewCategory,
};
use listing_service_core::Result;
use shared_error::AppError;

use super::json_string_array;

const SELECT_COLUMNS: &str = r#"
    id, category_name, category_ids, rakuten_category_ids, genre_id,
    primary_category_id, weight, length, width, height, size_option, size,
    attributes, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    category_name: String,
    category_ids: Option<serde_json::Value>,
    rakuten_category_ids: Option<serde_json::Value>,
    genre_id: Option<String>,
    primary_category_id: Option<i64>,
    weight: Option<f64>,
    length: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    size_option: Option<String>,
    size: Option<f64>,
    attributes: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        let attributes: Vec<CategoryAttributeGroup> = row
            .attributes
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        Category {
            id: row.id,
            category_name: row.category_name,
            category_ids: json_string_array(row.category_ids.as_ref()),
            rakuten_category_ids: json_string_array(row.rakuten_category_ids.as_ref()),
            genre_id: row.genre_id,
            primary_category_id: row.primary_category_id,
            weight: row.weight,
            length: row.length,
            width: row.width,
            height: row.height,
            size_option: row.size_option,
            size: row.size,
            attributes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PrimaryCategoryRow {
    id: i64,
    category_name: String,
    default_category_ids: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PrimaryCategoryRow> for PrimaryCategory {
    fn from(row: PrimaryCategoryRow) -> Self {
        PrimaryCategory {
            id: row.id,
            category_name: row.category_name,
            default_category_ids: json_string_array(row.default_category_ids.as_ref()),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn string_array_json(values: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        values
            .iter()
            .map(|v| serde_json::Value::String(v.clone()))
            .collect(),
    )
}

/// PostgreSQL implementation of CategoryRepository
pub struct CategoryRepositoryImpl {
    pool: PgPool,
}

impl CategoryRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for CategoryRepositoryImpl {
    async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {} FROM category_management ORDER BY id",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn create(&self, category: &NewCategory) -> Result<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            INSERT INTO category_management (
                category_name, category_ids, rakuten_category_ids, genre_id,
                primary_category_id, weight, length, width, height,
                size_option, size, attributes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(&category.category_name)
        .bind(string_array_json(&category.category_ids))
        .bind(string_array_json(&category.rakuten_category_ids))
        .bind(&category.genre_id)
        .bind(category.primary_category_id)
        .bind(category.weight)
        .bind(category.length)
        .bind(category.width)
        .bind(category.height)
        .bind(&category.size_option)
        .bind(category.size)
        .bind(serde_json::to_value(&category.attributes)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(Category::from(row))
    }

    async fn update(&self, id: i64, patch: &CategoryPatch) -> Result<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            r#"
            UPDATE category_management SET
                category_name = COALESCE($2, category_name),
                category_ids = COALESCE($3, category_ids),
                rakuten_category_ids = COALESCE($4, rakuten_category_ids),
                genre_id = COALESCE($5, genre_id),
                primary_category_id = COALESCE($6, primary_category_id),
                weight = COALESCE($7, weight),
                length = COALESCE($8, length),
                width = COALESCE($9, width),
                height = COALESCE($10, height),
                size_option = COALESCE($11, size_option),
                size = COALESCE($12, size),
                attributes = COALESCE($13, attributes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(&patch.category_name)
        .bind(patch.category_ids.as_deref().map(string_array_json))
        .bind(patch.rakuten_category_ids.as_deref().map(string_array_json))
        .bind(&patch.genre_id)
        .bind(patch.primary_category_id)
        .bind(patch.weight)
        .bind(patch.length)
        .bind(patch.width)
        .bind(patch.height)
        .bind(&patch.size_option)
        .bind(patch.size)
        .bind(
            patch
                .attributes
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {} not found", id)))?;
        Ok(Category::from(row))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM category_management WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_for_category_code(&self, code: &str) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {} FROM category_management WHERE category_ids ? $1 LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn rakuten_category_map(&self) -> Result<HashMap<String, Vec<String>>> {
        let categories = self.list().await?;
        let mut map = HashMap::new();
        for category in categories {
            if category.rakuten_category_ids.is_empty() {
                continue;
            }
            for code in category.category_ids {
                map.insert(code, category.rakuten_category_ids.clone());
            }
        }
        Ok(map)
    }

    async fn sync_rakuten_ids(
        &self,
        category_ids: &[String],
        rakuten_ids: &[String],
    ) -> Result<(u64, u64)> {
        if category_ids.is_empty() {
            return Ok((0, 0));
        }
        let payload = string_array_json(rakuten_ids);

        let origin = sqlx::query(
            r#"
            UPDATE products_origin
            SET r_cat_id = $2, updated_at = NOW()
            WHERE main_category = ANY($1) OR middle_category = ANY($1)
            "#,
        )
        .bind(category_ids)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        let canonical = sqlx::query(
            r#"
            UPDATE product_management
            SET r_cat_id = $2, updated_at = NOW()
            WHERE main_category = ANY($1) OR middle_category = ANY($1)
            "#,
        )
        .bind(category_ids)
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        Ok((origin.rows_affected(), canonical.rows_affected()))
    }

    async fn list_primary(&self) -> Result<Vec<PrimaryCategory>> {
        let rows = sqlx::query_as::<_, PrimaryCategoryRow>(
            r#"
            SELECT id, category_name, default_category_ids, created_at, updated_at
            FROM primary_category_management ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PrimaryCategory::from).collect())
    }

    async fn create_primary(
        &self,
        category_name: &str,
        default_category_ids: &[String],
    ) -> Result<PrimaryCategory> {
        let row = sqlx::query_as::<_, PrimaryCategoryRow>(
            r#"
            INSERT INTO primary_category_management (category_name, default_category_ids)
            VALUES ($1, $2)
            RETURNING id, category_name, default_category_ids, created_at, updated_at
            "#,
        )
        .bind(category_name)
        .bind(string_array_json(default_category_ids))
        .fetch_one(&self.pool)
        .await?;
        Ok(PrimaryCategory::from(row))
    }

    async fn update_primary(
        &self,
        id: i64,
        category_name: Option<&str>,
        default_category_ids: Option<&[String]>,
    ) -> Result<PrimaryCategory> {
        let row = sqlx::query_as::<_, PrimaryCategoryRow>(
            r#"
            UPDATE primary_category_management SET
                category_name = COALESCE($2, category_name),
                default_category_ids = COALESCE($3, default_category_ids),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, category_name, default_category_ids, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(category_name)
        .bind(default_category_ids.map(string_array_json))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("primary category {} not found", id)))?;
        Ok(PrimaryCategory::from(row))
    }

    async fn delete_primary(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM primary_category_management WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
