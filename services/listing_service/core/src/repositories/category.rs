//! Category repository trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Category, CategoryAttributeGroup, PrimaryCategory};
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewCategory {
    pub category_name: String,
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub rakuten_category_ids: Vec<String>,
    #[serde(default)]
    pub genre_id: Option<String>,
    #[serde(default)]
    pub primary_category_id: Option<i64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub size_option: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub attributes: Vec<CategoryAttributeGroup>,
}

/// Partial category update; `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CategoryPatch {
    pub category_name: Option<String>,
    pub category_ids: Option<Vec<String>>,
    pub rakuten_category_ids: Option<Vec<String>>,
    pub genre_id: Option<String>,
    pub primary_category_id: Option<i64>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub size_option: Option<String>,
    pub size: Option<f64>,
    pub attributes: Option<Vec<CategoryAttributeGroup>>,
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Category>>;

    async fn create(&self, category: &NewCategory) -> Result<Category>;

    async fn update(&self, id: i64, patch: &CategoryPatch) -> Result<Category>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Find the category entry covering an upstream category code.
    async fn find_for_category_code(&self, code: &str) -> Result<Option<Category>>;

    /// Map of upstream category code -> marketplace category IDs, used when
    /// resolving `r_cat_id` on upsert.
    async fn rakuten_category_map(&self) -> Result<HashMap<String, Vec<String>>>;

    /// Write the same marketplace category array into the origin and
    /// canonical rows of every product under the given upstream codes.
    /// Returns (origin rows, canonical rows) affected.
    async fn sync_rakuten_ids(
        &self,
        category_ids: &[String],
        rakuten_ids: &[String],
    ) -> Result<(u64, u64)>;

    async fn list_primary(&self) -> Result<Vec<PrimaryCategory>>;

    async fn create_primary(
        &self,
        category_name: &str,
        default_category_ids: &[String],
    ) -> Result<PrimaryCategory>;

    async fn update_primary(
        &self,
        id: i64,
        category_name: Option<&str>,
        default_category_ids: Option<&[String]>,
    ) -> Result<PrimaryCategory>;

    async fn delete_primary(&self, id: i64) -> Result<bool>;
}
