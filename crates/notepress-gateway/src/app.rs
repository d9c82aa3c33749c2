use axum::{routing::get, Router};
use notepress_core::config::{NotepressConfig, StoreBackend};
use notepress_publisher::{PublishOptions, PublishScheduler, PublishService};
use notepress_store::{ContentStore, GitHubStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: NotepressConfig,
    pub scheduler: PublishScheduler,
    /// Backend name reported by the health probe.
    pub store_name: String,
}

impl AppState {
    pub fn new(config: NotepressConfig, store: Arc<dyn ContentStore>) -> Self {
        let options = PublishOptions {
            max_attempts: config.publish.max_attempts,
            store_timeout: Duration::from_millis(config.store.timeout_ms),
        };
        let store_name = store.name().to_string();
        let service = Arc::new(PublishService::new(store, options));
        let scheduler = PublishScheduler::new(service, config.publish.concurrency);
        Self {
            config,
            scheduler,
            store_name,
        }
    }
}

/// Build the content store selected by `store.backend`.
pub fn build_store(config: &NotepressConfig) -> anyhow::Result<Arc<dyn ContentStore>> {
    match config.store.backend {
        StoreBackend::Github => {
            let gh = config
                .store
                .github
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("store.github section is required"))?;
            info!(owner = %gh.owner, repo = %gh.repo, branch = %gh.branch, "using GitHub content store");
            Ok(Arc::new(GitHubStore::new(gh)?))
        }
        StoreBackend::Memory => {
            info!("using in-memory content store (contents are not persisted)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/api/cron/publish",
            get(crate::http::cron::cron_publish_handler)
                .post(crate::http::cron::cron_publish_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
