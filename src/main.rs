use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;

use media_pipeline::app::create_app;
use media_pipeline::config::settings::AppConfig;
use media_pipeline::infrastructure::db::pool::{connect_to_db, run_migrations};
use media_pipeline::infrastructure::redis::client::RedisService;
use media_pipeline::infrastructure::storage::StorageService;
use media_pipeline::modules::content::repository::PgContentRepository;
use media_pipeline::modules::identity::CachedIdentityResolver;
use media_pipeline::rpc::{ConversionClient, RpcClient, SharedSecret};
use media_pipeline::state::{AppState, MediaSettings};
use media_pipeline::workers::cleanup::CleanupQueue;

/// Identity lookups are on the request path; keep them short.
const USER_SERVICE_TIMEOUT_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    media_pipeline::init_tracing();

    info!("Starting content orchestrator...");

    let config = AppConfig::new().context("invalid configuration")?;

    let db = connect_to_db(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    run_migrations(&db).await.context("failed to run migrations")?;

    let redis = RedisService::new(&config.redis_url)
        .await
        .context("failed to connect to Redis")?;

    let storage = Arc::new(StorageService::new(&config.s3));
    let secret = SharedSecret::new(config.rpc_auth_key.clone());

    let transcoder = ConversionClient::new(RpcClient::new(
        config.conversion_service_url.clone(),
        secret.clone(),
        config.conversion_timeout,
    ));
    let identity = CachedIdentityResolver::new(
        Arc::new(redis),
        RpcClient::new(
            config.user_service_url.clone(),
            secret,
            std::time::Duration::from_secs(USER_SERVICE_TIMEOUT_SECS),
        ),
        config.identity_cache_ttl,
    );

    let (cleanup, cleanup_worker) = CleanupQueue::start(storage.clone(), config.cleanup_queue_capacity);

    let state = AppState::new(
        MediaSettings::from(&config),
        Arc::new(PgContentRepository::new(db)),
        storage,
        Arc::new(transcoder),
        Arc::new(identity),
        cleanup.clone(),
    );

    let app = create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Content orchestrator running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(media_pipeline::shutdown_signal())
        .await?;

    cleanup.close();
    cleanup_worker.drained().await;
    info!(dropped_cleanup_tasks = cleanup.dropped(), "Content orchestrator stopped");

    Ok(())
}
