//! Upstream search request/response shapes.

use serde::{Deserialize, Serialize};

/// Keyword search request against the upstream marketplace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSearchRequest {
    pub keywords: String,
    #[serde(default = "default_shop_type")]
    pub shop_type: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub price_start: Option<String>,
    #[serde(default)]
    pub price_end: Option<String>,
    /// Sort field and direction, e.g. `{"monthSold": "desc"}`
    #[serde(default)]
    pub sort: Option<serde_json::Value>,
    #[serde(default)]
    pub region_opp: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

fn default_shop_type() -> String {
    "1688".to_string()
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

impl KeywordSearchRequest {
    pub fn for_keyword(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            shop_type: default_shop_type(),
            page: default_page(),
            page_size: default_page_size(),
            price_start: None,
            price_end: None,
            sort: None,
            region_opp: None,
            filter: None,
            category_id: None,
        }
    }
}

/// One raw product record as returned by the upstream search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawProduct {
    #[serde(rename = "goodsId")]
    pub goods_id: String,
    #[serde(rename = "titleC", default)]
    pub title_c: Option<String>,
    #[serde(rename = "titleT", default)]
    pub title_t: Option<String>,
    #[serde(rename = "imgUrl", default)]
    pub img_url: Option<String>,
    #[serde(rename = "goodsPrice", default)]
    pub goods_price: Option<f64>,
    #[serde(rename = "monthSold", default)]
    pub month_sold: Option<i64>,
    #[serde(rename = "repurchaseRate", default)]
    pub repurchase_rate: Option<f64>,
    #[serde(rename = "tradeScore", default)]
    pub trade_score: Option<f64>,
    #[serde(rename = "createDate", default)]
    pub create_date: Option<String>,
    #[serde(rename = "topCategoryId", default)]
    pub top_category_id: Option<String>,
    #[serde(rename = "secondCategoryId", default)]
    pub second_category_id: Option<String>,
    #[serde(rename = "shopType", default)]
    pub shop_type: Option<String>,
    #[serde(rename = "sourceCategoryId", default)]
    pub source_category_id: Option<String>,
    /// Filtered detail payload, attached after a detail fetch
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

/// Parsed search page: the records plus the upstream total.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub total: i64,
    pub products: Vec<RawProduct>,
}

/// Combined result of a multi-category sweep.
#[derive(Debug, Clone, Default)]
pub struct MultiCategorySearchResult {
    pub total_found: i64,
    pub products: Vec<RawProduct>,
    pub successful_categories: usize,
    pub failed_category_ids: Vec<String>,
}
