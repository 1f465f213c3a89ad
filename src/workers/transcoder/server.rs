use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::pipeline::{TranscodeJob, TranscodePipeline};
use crate::common::media::MediaType;
use crate::rpc::auth::{SharedSecret, require_shared_secret};
use crate::rpc::contract::{CONVERSION_PATH, ConversionRequest, ConversionResponse, RpcStatus};

/// Conversion handler. Authentication already happened in the interceptor.
pub async fn conversion(
    State(pipeline): State<TranscodePipeline>,
    Json(req): Json<ConversionRequest>,
) -> Result<Json<ConversionResponse>, RpcStatus> {
    info!(key = %req.key, is_audio_file = req.is_audio_file, "📦 Received conversion request");

    let job = TranscodeJob {
        source_key: req.key,
        media_type: MediaType::from_audio_flag(req.is_audio_file),
    };

    match pipeline.run(job).await {
        Ok(key) => Ok(Json(ConversionResponse { key })),
        Err(e) => Err(e.to_status()),
    }
}

/// Router for the transcode worker process. Every RPC route sits behind the
/// shared-secret interceptor; `/health` does not.
pub fn router(pipeline: TranscodePipeline, secret: SharedSecret) -> Router {
    let rpc_routes = Router::new()
        .route(CONVERSION_PATH, post(conversion))
        .route_layer(middleware::from_fn_with_state(secret, require_shared_secret))
        .with_state(pipeline);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(rpc_routes)
        .layer(TraceLayer::new_for_http())
}
