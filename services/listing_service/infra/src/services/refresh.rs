//! Periodic keyword refresh task.
//!
//! Re-runs the configured keyword searches at a fixed interval and upserts
//! the results. Cancellation is cooperative: a cycle in flight finishes its
//! current keyword batch before the task stops.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use listing_service_core::dto::harvest::KeywordSearchRequest;
use listing_service_core::services::harvester::{raw_to_origin, Harvester};
use listing_service_core::services::refresh::RefreshKeywords;
use listing_service_core::OriginProductRepository;

pub struct AutoRefreshTask {
    harvester: Arc<dyn Harvester>,
    origin: Arc<dyn OriginProductRepository>,
    keywords: Arc<RefreshKeywords>,
    interval: Duration,
}

pub struct AutoRefreshHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl AutoRefreshHandle {
    /// Signal shutdown and wait for the current cycle to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

impl AutoRefreshTask {
    pub fn new(
        harvester: Arc<dyn Harvester>,
        origin: Arc<dyn OriginProductRepository>,
        keywords: Arc<RefreshKeywords>,
        interval: Duration,
    ) -> Self {
        Self {
            harvester,
            origin,
            keywords,
            interval,
        }
    }

    pub fn spawn(self) -> AutoRefreshHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("auto-refresh task stopping");
                        break;
                    }
                }
            }
        });
        AutoRefreshHandle { shutdown, join }
    }

    pub async fn run_cycle(&self) {
        let keywords = self.keywords.list();
        if keywords.is_empty() {
            tracing::debug!("no keywords configured for automatic refresh");
            return;
        }
        tracing::info!(keywords = keywords.len(), "automatic refresh cycle starting");

        for keyword in keywords {
            match self
                .harvester
                .keyword_search(&KeywordSearchRequest::for_keyword(&keyword))
                .await
            {
                Ok(page) if page.products.is_empty() => {
                    tracing::warn!(keyword = %keyword, "no products found during refresh");
                }
                Ok(page) => {
                    let records: Vec<_> = page
                        .products
                        .iter()
                        .map(|raw| raw_to_origin(raw, Some(&keyword)))
                        .collect();
                    match self.origin.upsert_batch(&records).await {
                        Ok(saved) => tracing::info!(
                            keyword = %keyword,
                            found = page.products.len(),
                            saved,
                            "refresh cycle keyword done"
                        ),
                        Err(e) => {
                            tracing::error!(keyword = %keyword, error = %e, "refresh upsert failed")
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(keyword = %keyword, error = %e, "refresh search failed");
                }
            }
        }
        tracing::info!("automatic refresh cycle completed");
    }
}
