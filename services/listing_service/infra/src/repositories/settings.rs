//! Settings repository implementation
//!
//! Pricing settings live as one JSONB document under a fixed key in the
//! `app_settings` table.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use sqlx::PgPool;
use std::collections::HashSet;

use listing_service_core::models::PricingSettings;
use listing_service_core::repositories::settings::SettingsRepository;
use listing_service_core::Result;
use shared_error::AppError;

const PRICING_SETTINGS_KEY: &str = "pricing_settings";

static KNOWN_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "exchange_rate",
        "profit_margin_percent",
        "sales_commission_percent",
        "currency",
        "domestic_shipping_costs",
        "international_shipping_rate",
        "customs_duty_rate",
        // superseded by the size-tiered map, still present in old documents
        "domestic_shipping_cost",
        "profit_margin",
    ])
});

/// PostgreSQL implementation of SettingsRepository
pub struct SettingsRepositoryImpl {
    pool: PgPool,
}

impl SettingsRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SettingsRepositoryImpl {
    async fn load_pricing(&self) -> Result<PricingSettings> {
        let stored: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = $1")
                .bind(PRICING_SETTINGS_KEY)
                .fetch_optional(&self.pool)
                .await?;

        let stored = match stored {
            Some(value) => value,
            None => return Ok(PricingSettings::default()),
        };

        if let Some(document) = stored.as_object() {
            for field in document.keys() {
                if !KNOWN_FIELDS.contains(field.as_str()) {
                    tracing::warn!(field = %field, "ignoring unknown pricing settings field");
                }
            }
        }

        serde_json::from_value(stored)
            .map_err(|e| AppError::InternalError(format!("undecodable pricing settings: {}", e)))
    }

    async fn save_pricing(&self, settings: &PricingSettings) -> Result<()> {
        let mut valid = true;
        for rate in [
            settings.exchange_rate,
            settings.profit_margin_percent,
            settings.sales_commission_percent,
            settings.international_shipping_rate,
            settings.customs_duty_rate,
            settings.domestic_shipping_costs.regular,
            settings.domestic_shipping_costs.size60,
            settings.domestic_shipping_costs.size80,
            settings.domestic_shipping_costs.size100,
        ] {
            if !rate.is_finite() || rate < 0.0 {
                valid = false;
            }
        }
        if !valid {
            return Err(AppError::ValidationError(
                "pricing settings must be non-negative".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
            "#,
        )
        .bind(PRICING_SETTINGS_KEY)
        .bind(serde_json::to_value(settings)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
