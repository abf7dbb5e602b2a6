//! Composition root: build the full pipeline from configuration.
//!
//! The HTTP surface lives elsewhere; whatever hosts this service calls
//! [`init`] once and drives the returned components.

use std::sync::Arc;
use std::time::Duration;

use listing_service_core::services::refresh::RefreshKeywords;
use listing_service_core::{Materializer, Orchestrator, Result};
use shared_config::{Config, RakutenCredentials};
use shared_error::AppError;

use crate::repositories::{
    schema, CanonicalProductRepositoryImpl, CategoryRepositoryImpl, OriginProductRepositoryImpl,
    SettingsRepositoryImpl,
};
use crate::services::{
    AutoRefreshTask, DeepLTranslator, OpenAiContentGenerator, QuotaState, RakumartClient,
    RakutenClient, StorageImagePipeline,
};
use crate::storage::{GeminiImageEditor, StorageClient, StorageConfig};

pub struct Pipeline {
    pub materializer: Arc<Materializer>,
    pub orchestrator: Arc<Orchestrator>,
    pub harvester: Arc<RakumartClient>,
    pub origin_repo: Arc<OriginProductRepositoryImpl>,
    pub canonical_repo: Arc<CanonicalProductRepositoryImpl>,
    pub category_repo: Arc<CategoryRepositoryImpl>,
    pub settings_repo: Arc<SettingsRepositoryImpl>,
    pub refresh_keywords: Arc<RefreshKeywords>,
    pub quota: Arc<QuotaState>,
    pub pool: sqlx::PgPool,
    pub config: Config,
}

/// Connect, repair the schema, and wire every component.
pub async fn init(config: Config) -> Result<Pipeline> {
    if config.database_url.is_empty() {
        return Err(AppError::ConfigError(
            "DATABASE_URL (or PG* variables) must be set".to_string(),
        ));
    }

    let pool = shared_db::connect_with_fallback(
        &config.database_url,
        config.pool_min_connections,
        config.pool_max_connections,
    )
    .await?;
    schema::ensure_schema(&pool).await?;

    let origin_repo = Arc::new(OriginProductRepositoryImpl::new(pool.clone()));
    let canonical_repo = Arc::new(CanonicalProductRepositoryImpl::new(pool.clone()));
    let category_repo = Arc::new(CategoryRepositoryImpl::new(pool.clone()));
    let settings_repo = Arc::new(SettingsRepositoryImpl::new(pool.clone()));

    let quota = Arc::new(QuotaState::new());
    let translator = Arc::new(DeepLTranslator::new(
        config.deepl_api_key.clone(),
        quota.clone(),
    )?);
    let content = Arc::new(OpenAiContentGenerator::new(config.openai_api_key.clone())?);

    let storage = Arc::new(StorageClient::new(StorageConfig::from_app_config(&config)));
    let editor = Arc::new(GeminiImageEditor::new(
        config.gemini_api_key.clone(),
        quota.clone(),
    )?);
    let images = Arc::new(StorageImagePipeline::new(
        storage.clone(),
        editor,
        quota.clone(),
        Duration::from_secs(config.image_timeout_secs),
    )?);

    let harvester = Arc::new(RakumartClient::new(
        config.rakumart_app_key.clone(),
        config.rakumart_app_secret.clone(),
        config.rakumart_search_url.clone(),
        config.rakumart_detail_url.clone(),
        config.rakumart_image_id_url.clone(),
        Duration::from_secs(config.api_timeout_secs),
    )?);

    let credentials = RakutenCredentials::load(&config.rakuten_config_path)
        .map_err(AppError::ConfigError)?;
    let rakuten = Arc::new(RakutenClient::new(
        &credentials,
        Duration::from_secs(config.api_timeout_secs),
        Duration::from_secs(config.cabinet_timeout_secs),
    )?);

    let materializer = Arc::new(Materializer::new(
        origin_repo.clone(),
        canonical_repo.clone(),
        category_repo.clone(),
        settings_repo.clone(),
        translator,
        content,
        images,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        rakuten,
        canonical_repo.clone(),
        origin_repo.clone(),
        storage,
    ));

    let refresh_keywords = Arc::new(RefreshKeywords::new());

    tracing::info!("listing pipeline initialized");
    Ok(Pipeline {
        materializer,
        orchestrator,
        harvester,
        origin_repo,
        canonical_repo,
        category_repo,
        settings_repo,
        refresh_keywords,
        quota,
        pool,
        config,
    })
}

impl Pipeline {
    /// Start the periodic keyword refresh when enabled.
    pub fn spawn_auto_refresh(&self) -> Option<crate::services::refresh::AutoRefreshHandle> {
        if !self.config.auto_refresh {
            return None;
        }
        let task = AutoRefreshTask::new(
            self.harvester.clone(),
            self.origin_repo.clone(),
            self.refresh_keywords.clone(),
            Duration::from_secs(self.config.refresh_interval_secs),
        );
        Some(task.spawn())
    }
}
