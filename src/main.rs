use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinematch_api::{
    catalog::{CatalogStore, InMemoryCatalog, PgCatalog},
    config::Config,
    db::{create_pool, create_redis_client, Cache, CacheWriterHandle},
    llm::{GeminiClient, LlmClient, RedisReplyCache, ReplyCache},
    routes::{create_router, AppState},
    services::Recommender,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinematch_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let catalog: Arc<dyn CatalogStore> = match &config.catalog_seed_path {
        Some(path) => Arc::new(InMemoryCatalog::from_json_file(path)?),
        None => {
            let pool = create_pool(
                &config.database_url,
                config.database_max_connections,
                config.catalog_timeout(),
            )
            .await
            .context("Failed to connect to the catalog database")?;
            Arc::new(PgCatalog::new(pool))
        }
    };
    tracing::info!(store = catalog.name(), "Catalog ready");

    let gemini = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_api_url.clone(),
        config.gemini_model.clone(),
        config.llm_timeout(),
    )?;
    let model = gemini.model().to_string();

    let llm: Arc<dyn LlmClient> = Arc::new(gemini);
    tracing::info!(llm = llm.name(), model = %model, "LLM client ready");

    let mut recommender = Recommender::new(
        catalog.clone(),
        llm,
        config.llm_timeout(),
        config.catalog_timeout(),
    );

    let mut cache_handle: Option<CacheWriterHandle> = None;
    if let Some(redis_url) = &config.redis_url {
        let (cache, handle) = Cache::new(create_redis_client(redis_url)?);
        cache_handle = Some(handle);
        let replies: Arc<dyn ReplyCache> =
            Arc::new(RedisReplyCache::new(cache, model, config.llm_cache_ttl_secs));
        recommender = recommender.with_reply_cache(replies);
        tracing::info!(ttl_secs = config.llm_cache_ttl_secs, "LLM reply cache enabled");
    }

    let app = create_router(Arc::new(AppState::new(recommender, catalog)));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    tracing::info!("Server running on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
