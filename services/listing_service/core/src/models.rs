use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dto::listing::{
    InventoryPayload, ItemImage, ProductDescription, Variant, VariantSelector,
};

/// Registration state of an origin product, stored as an integer column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[repr(i32)]
pub enum RegistrationStatus {
    Unregistered = 1,
    Registered = 2,
    PreviouslyRegistered = 3,
}

impl RegistrationStatus {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(RegistrationStatus::Unregistered),
            2 => Some(RegistrationStatus::Registered),
            3 => Some(RegistrationStatus::PreviouslyRegistered),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Unregistered => "unregistered",
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::PreviouslyRegistered => "previously_registered",
        };
        f.write_str(s)
    }
}

/// On-marketplace status of a canonical product.
///
/// `True`/`False` record the outcome of the most recent registration attempt;
/// `OnSale`/`Stop`/`Deleted` come from reconciliation against the marketplace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RakutenStatus {
    True,
    False,
    Deleted,
    OnSale,
    Stop,
}

impl fmt::Display for RakutenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RakutenStatus::True => "true",
            RakutenStatus::False => "false",
            RakutenStatus::Deleted => "deleted",
            RakutenStatus::OnSale => "onsale",
            RakutenStatus::Stop => "stop",
        };
        f.write_str(s)
    }
}

impl FromStr for RakutenStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "true" => Ok(RakutenStatus::True),
            "false" => Ok(RakutenStatus::False),
            "deleted" => Ok(RakutenStatus::Deleted),
            "onsale" => Ok(RakutenStatus::OnSale),
            "stop" => Ok(RakutenStatus::Stop),
            _ => Err(format!("Unknown registration status: {}", s)),
        }
    }
}

impl RakutenStatus {
    /// Normalize a raw column value. Legacy rows stored booleans and `t`/`f`
    /// markers; empty strings count as unset.
    pub fn normalize(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        match raw {
            "" => None,
            "t" | "T" => Some(RakutenStatus::True),
            "f" | "F" => Some(RakutenStatus::False),
            other => other.parse().ok(),
        }
    }

    /// A product can only be hidden/unhidden while it is in one of the states
    /// an operator may still toggle; `deleted` and `stop` are final for that
    /// control.
    pub fn allows_hide_toggle(status: Option<Self>) -> bool {
        match status {
            None => true,
            Some(RakutenStatus::OnSale)
            | Some(RakutenStatus::True)
            | Some(RakutenStatus::False) => true,
            Some(RakutenStatus::Deleted) | Some(RakutenStatus::Stop) => false,
        }
    }
}

/// Raw harvested listing from the upstream marketplace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginProduct {
    pub product_id: String,
    pub title_c: Option<String>,
    pub title_t: Option<String>,
    pub main_category: Option<String>,
    pub middle_category: Option<String>,
    pub type_tag: Option<String>,
    pub monthly_sales: Option<i64>,
    /// Unit wholesale price in CNY
    pub wholesale_price: Option<f64>,
    /// Weight in kilograms
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Parcel size class: 30, 60, 80 or 100
    pub size: Option<i32>,
    pub creation_date: Option<String>,
    pub repurchase_rate: Option<f64>,
    pub rating_score: Option<f64>,
    pub detail_json: Option<serde_json::Value>,
    pub registration_status: RegistrationStatus,
    /// Marketplace category IDs, always a JSON array
    pub r_cat_id: Vec<String>,
    pub keyword: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Marketplace-ready product row (`product_management`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub item_number: String,
    pub title: String,
    pub tagline: Option<String>,
    pub product_description: ProductDescription,
    pub sales_description: Option<String>,
    pub images: Vec<ItemImage>,
    pub variant_selectors: Vec<VariantSelector>,
    pub variants: std::collections::BTreeMap<String, Variant>,
    pub inventory: Option<InventoryPayload>,
    pub features: Option<serde_json::Value>,
    pub payment: Option<serde_json::Value>,
    pub layout: Option<serde_json::Value>,
    pub item_type: String,
    pub hide_item: bool,
    pub unlimited_inventory_flag: bool,
    pub genre_id: Option<String>,
    pub r_cat_id: Vec<String>,
    pub rakuten_registration_status: Option<RakutenStatus>,
    pub image_registration_status: Option<String>,
    pub inventory_registration_status: Option<String>,
    pub rakuten_registered_at: Option<DateTime<Utc>>,
    /// Formatted error of the last failed registration attempt
    pub registration_error: Option<String>,
    pub actual_purchase_price: Option<f64>,
    pub change_status: Option<String>,
    pub block: bool,
    pub src_url: Option<String>,
    pub main_category: Option<String>,
    pub middle_category: Option<String>,
    /// Eight-digit code used for object-store and Cabinet folder naming
    pub product_image_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attribute group attached to a managed category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryAttributeGroup {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub category_name: String,
    /// Upstream category codes this entry covers
    pub category_ids: Vec<String>,
    /// Marketplace category IDs propagated into matching product rows
    pub rakuten_category_ids: Vec<String>,
    pub genre_id: Option<String>,
    pub primary_category_id: Option<i64>,
    pub weight: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub size_option: Option<String>,
    pub size: Option<f64>,
    pub attributes: Vec<CategoryAttributeGroup>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryCategory {
    pub id: i64,
    pub category_name: String,
    pub default_category_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Size-tiered domestic shipping costs in JPY.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomesticShippingCosts {
    #[serde(default = "default_regular")]
    pub regular: f64,
    #[serde(default = "default_size60")]
    pub size60: f64,
    #[serde(default = "default_size80")]
    pub size80: f64,
    #[serde(default = "default_size100")]
    pub size100: f64,
}

fn default_regular() -> f64 {
    300.0
}

fn default_size60() -> f64 {
    360.0
}

fn default_size80() -> f64 {
    420.0
}

fn default_size100() -> f64 {
    480.0
}

impl Default for DomesticShippingCosts {
    fn default() -> Self {
        Self {
            regular: default_regular(),
            size60: default_size60(),
            size80: default_size80(),
            size100: default_size100(),
        }
    }
}

/// Pricing settings singleton, persisted under the `pricing_settings` key of
/// the settings table. Unknown fields in the stored document are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingSettings {
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: f64,
    #[serde(default = "default_profit_margin")]
    pub profit_margin_percent: f64,
    #[serde(default = "default_sales_commission")]
    pub sales_commission_percent: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub domestic_shipping_costs: DomesticShippingCosts,
    #[serde(default = "default_international_rate")]
    pub international_shipping_rate: f64,
    #[serde(default = "default_customs_duty")]
    pub customs_duty_rate: f64,
}

fn default_exchange_rate() -> f64 {
    20.0
}

fn default_profit_margin() -> f64 {
    5.0
}

fn default_sales_commission() -> f64 {
    10.0
}

fn default_currency() -> String {
    "JPY".to_string()
}

fn default_international_rate() -> f64 {
    17.0
}

fn default_customs_duty() -> f64 {
    100.0
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            exchange_rate: default_exchange_rate(),
            profit_margin_percent: default_profit_margin(),
            sales_commission_percent: default_sales_commission(),
            currency: default_currency(),
            domestic_shipping_costs: DomesticShippingCosts::default(),
            international_shipping_rate: default_international_rate(),
            customs_duty_rate: default_customs_duty(),
        }
    }
}

impl PricingSettings {
    /// Domestic shipping cost for a parcel size class. Unknown sizes fall
    /// back to the regular tariff.
    pub fn shipping_cost_for_size(&self, size: Option<i32>) -> f64 {
        match size {
            Some(60) => self.domestic_shipping_costs.size60,
            Some(80) => self.domestic_shipping_costs.size80,
            Some(100) => self.domestic_shipping_costs.size100,
            _ => self.domestic_shipping_costs.regular,
        }
    }
}

/// Listed for schema completeness; authentication lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_status_round_trip() {
        for status in [
            RegistrationStatus::Unregistered,
            RegistrationStatus::Registered,
            RegistrationStatus::PreviouslyRegistered,
        ] {
            assert_eq!(RegistrationStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(RegistrationStatus::from_i32(0), None);
        assert_eq!(RegistrationStatus::from_i32(4), None);
    }

    #[test]
    fn test_rakuten_status_normalize() {
        assert_eq!(RakutenStatus::normalize(None), None);
        assert_eq!(RakutenStatus::normalize(Some("")), None);
        assert_eq!(RakutenStatus::normalize(Some("t")), Some(RakutenStatus::True));
        assert_eq!(RakutenStatus::normalize(Some("f")), Some(RakutenStatus::False));
        assert_eq!(
            RakutenStatus::normalize(Some("onsale")),
            Some(RakutenStatus::OnSale)
        );
        assert_eq!(RakutenStatus::normalize(Some("garbage")), None);
    }

    #[test]
    fn test_hide_toggle_gating() {
        assert!(RakutenStatus::allows_hide_toggle(None));
        assert!(RakutenStatus::allows_hide_toggle(Some(RakutenStatus::OnSale)));
        assert!(RakutenStatus::allows_hide_toggle(Some(RakutenStatus::True)));
        assert!(RakutenStatus::allows_hide_toggle(Some(RakutenStatus::False)));
        assert!(!RakutenStatus::allows_hide_toggle(Some(RakutenStatus::Stop)));
        assert!(!RakutenStatus::allows_hide_toggle(Some(RakutenStatus::Deleted)));
    }

    #[test]
    fn test_shipping_cost_for_size() {
        let settings = PricingSettings::default();
        assert_eq!(settings.shipping_cost_for_size(Some(30)), 300.0);
        assert_eq!(settings.shipping_cost_for_size(Some(60)), 360.0);
        assert_eq!(settings.shipping_cost_for_size(Some(80)), 420.0);
        assert_eq!(settings.shipping_cost_for_size(Some(100)), 480.0);
        assert_eq!(settings.shipping_cost_for_size(Some(120)), 300.0);
        assert_eq!(settings.shipping_cost_for_size(None), 300.0);
    }

    #[test]
    fn test_pricing_settings_ignores_unknown_fields() {
        let raw = r#"{"exchange_rate": 22.0, "legacy_field": true}"#;
        let parsed: PricingSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.exchange_rate, 22.0);
        assert_eq!(parsed.profit_margin_percent, 5.0);
    }
}
