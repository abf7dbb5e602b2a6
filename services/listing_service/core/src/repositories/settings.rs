//! Settings repository trait

use async_trait::async_trait;

use crate::models::PricingSettings;
use crate::Result;

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load the pricing settings singleton, falling back to defaults when
    /// nothing has been saved yet.
    async fn load_pricing(&self) -> Result<PricingSettings>;

    async fn save_pricing(&self, settings: &PricingSettings) -> Result<()>;
}
