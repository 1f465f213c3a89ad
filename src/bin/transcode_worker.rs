use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;

use media_pipeline::config::settings::WorkerConfig;
use media_pipeline::infrastructure::storage::StorageService;
use media_pipeline::rpc::SharedSecret;
use media_pipeline::workers::cleanup::CleanupQueue;
use media_pipeline::workers::transcoder::{FfmpegEncoder, TranscodePipeline, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    media_pipeline::init_tracing();

    info!("Starting transcode worker...");

    let config = WorkerConfig::new().context("invalid configuration")?;

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .with_context(|| format!("failed to create scratch dir {}", config.scratch_dir.display()))?;

    let storage = Arc::new(StorageService::new(&config.s3));
    let encoder = Arc::new(FfmpegEncoder::new(
        config.ffmpeg_path.clone(),
        config.hls_segment_seconds,
    ));
    let (cleanup, cleanup_worker) = CleanupQueue::start(storage.clone(), config.cleanup_queue_capacity);

    let pipeline = TranscodePipeline::new(
        storage,
        encoder,
        cleanup.clone(),
        config.s3.bucket.clone(),
        config.scratch_dir.clone(),
    );
    let app = router(pipeline, SharedSecret::new(config.rpc_auth_key.clone()));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🎬 Transcode worker listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(media_pipeline::shutdown_signal())
        .await?;

    cleanup.close();
    cleanup_worker.drained().await;
    info!(dropped_cleanup_tasks = cleanup.dropped(), "Transcode worker stopped");

    Ok(())
}
