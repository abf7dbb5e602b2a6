//! Canonical product building blocks: selectors, variants, images, inventory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One value of a variant selector, display form only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorValue {
    #[serde(rename = "displayValue")]
    pub display_value: String,
}

/// One axis of product variation (color, size, ...). The `values` form one
/// dimension of the SKU cartesian.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantSelector {
    pub key: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub values: Vec<SelectorValue>,
}

/// One cell of the selector cartesian, keyed by the upstream SKU id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Variant {
    #[serde(rename = "selectorValues")]
    pub selector_values: BTreeMap<String, String>,
    /// Sale price as a stringified non-negative JPY integer, rounded to 10
    #[serde(rename = "standardPrice")]
    pub standard_price: String,
    #[serde(rename = "articleNumber", skip_serializing_if = "Option::is_none")]
    pub article_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<serde_json::Value>,
    #[serde(rename = "normalDeliveryDateId", skip_serializing_if = "Option::is_none")]
    pub normal_delivery_date_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemImage {
    #[serde(rename = "type")]
    pub image_type: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationLeadTime {
    #[serde(rename = "normalDeliveryTimeId")]
    pub normal_delivery_time_id: i64,
}

/// Per-variant stock row sent to the marketplace inventory endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryVariant {
    pub variant_id: String,
    pub quantity: i64,
    pub mode: String,
    #[serde(rename = "operationLeadTime", skip_serializing_if = "Option::is_none")]
    pub operation_lead_time: Option<OperationLeadTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryPayload {
    pub manage_number: String,
    pub variants: Vec<InventoryVariant>,
}

/// PC and smartphone descriptions of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProductDescription {
    #[serde(default)]
    pub pc: String,
    #[serde(default)]
    pub sp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Sortable columns of the canonical listing view. Keeping this closed set
/// is what lets the repository splice the column name into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalSortBy {
    CreatedAt,
    RakutenRegisteredAt,
}

impl CanonicalSortBy {
    pub fn as_column(self) -> &'static str {
        match self {
            CanonicalSortBy::CreatedAt => "created_at",
            CanonicalSortBy::RakutenRegisteredAt => "rakuten_registered_at",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: CanonicalSortBy,
    pub sort_order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            sort_by: CanonicalSortBy::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

/// Per-item outcome of a batch operation.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub item_number: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn ok(item_number: impl Into<String>) -> Self {
        Self {
            item_number: item_number.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(item_number: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            item_number: item_number.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregate result of a batch operation over many items.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchOutcome {
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<ItemOutcome>,
}

impl BatchOutcome {
    pub fn push(&mut self, outcome: ItemOutcome) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.results.push(outcome);
    }
}
