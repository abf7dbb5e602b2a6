//! Origin product repository trait
//!
//! Data access interface for the raw harvested product rows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{OriginProduct, RegistrationStatus};
use crate::Result;

/// Input row for an origin upsert. Built from a raw search record plus the
/// keyword that found it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOriginProduct {
    pub product_id: String,
    pub title_c: Option<String>,
    pub title_t: Option<String>,
    pub main_category: Option<String>,
    pub middle_category: Option<String>,
    pub type_tag: Option<String>,
    pub monthly_sales: Option<i64>,
    pub wholesale_price: Option<f64>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub size: Option<i32>,
    pub creation_date: Option<String>,
    pub repurchase_rate: Option<f64>,
    pub rating_score: Option<f64>,
    pub detail_json: Option<serde_json::Value>,
    pub keyword: Option<String>,
}

impl NewOriginProduct {
    /// A record is persistable when it has an id and at least one title.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.product_id.trim().is_empty() {
            return Err("product_id must not be empty".to_string());
        }
        let has_title = self
            .title_c
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
            || self
                .title_t
                .as_deref()
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false);
        if !has_title {
            return Err(format!("product {} has no title", self.product_id));
        }
        Ok(())
    }
}

/// Dimension columns a category edit may propagate into product rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionField {
    Weight,
    Length,
    Width,
    Height,
    Size,
}

impl DimensionField {
    pub fn as_column(self) -> &'static str {
        match self {
            DimensionField::Weight => "weight",
            DimensionField::Length => "length",
            DimensionField::Width => "width",
            DimensionField::Height => "height",
            DimensionField::Size => "size",
        }
    }
}

/// Repository trait for origin (raw harvested) products.
#[async_trait]
pub trait OriginProductRepository: Send + Sync {
    /// Upsert a batch of harvested records.
    ///
    /// Per record: invalid rows are skipped (and counted as skipped), the
    /// marketplace category array is resolved from the category table, an
    /// existing `registration_status` is preserved (a registered row is never
    /// downgraded back to unregistered) and `created_at` keeps the earliest
    /// observed value.
    ///
    /// Returns the number of rows written.
    async fn upsert_batch(&self, products: &[NewOriginProduct]) -> Result<usize>;

    /// Fetch one origin product by upstream id.
    async fn find_by_id(&self, product_id: &str) -> Result<Option<OriginProduct>>;

    /// Fetch several origin products, preserving the requested order.
    async fn find_by_ids(&self, product_ids: &[String]) -> Result<Vec<OriginProduct>>;

    /// Set the registration status for a set of products.
    async fn set_registration_status(
        &self,
        product_ids: &[String],
        status: RegistrationStatus,
    ) -> Result<u64>;

    /// Bulk-update one dimension column for every product whose main or
    /// middle category is in `category_ids`. Returns affected row count.
    async fn propagate_dimension(
        &self,
        category_ids: &[String],
        field: DimensionField,
        value: Option<f64>,
    ) -> Result<u64>;
}
