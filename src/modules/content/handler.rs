use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::modules::content::dto::*;
use crate::modules::content::model::ContentRecord;
use crate::modules::content::service::ContentService;
use crate::modules::identity::AuthPrincipal;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/contents",
    request_body = CreateContentRequest,
    responses(
        (status = 201, description = "Content Created", body = ApiResponse<ContentRecord>),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn create_content(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<CreateContentRequest>,
) -> impl IntoResponse {
    match ContentService::create(state, &principal, req).await {
        Ok(res) => ApiSuccess::created(res, "Content created successfully").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/contents/{id}",
    params(
        ("id" = Uuid, Path, description = "Content ID")
    ),
    responses(
        (status = 200, description = "Get Content", body = ApiResponse<ContentRecord>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Content Not Found")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn get_content(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match ContentService::get(state, &principal, id).await {
        Ok(res) => ApiSuccess::ok(res, "Content retrieved successfully").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/contents/{id}/upload-url",
    params(
        ("id" = Uuid, Path, description = "Content ID")
    ),
    request_body = UploadGrantRequest,
    responses(
        (status = 200, description = "Signed upload URL", body = ApiResponse<UploadGrantResponse>),
        (status = 400, description = "Bad Request"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Content Not Found"),
        (status = 502, description = "Object storage unavailable")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn issue_upload_grant(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    Json(req): Json<UploadGrantRequest>,
) -> impl IntoResponse {
    match ContentService::issue_upload_grant(state, &principal, id, req).await {
        Ok(res) => ApiSuccess::ok(res, "Upload URL issued").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/contents/{id}/upload",
    params(
        ("id" = Uuid, Path, description = "Content ID")
    ),
    request_body = CommitUploadRequest,
    responses(
        (status = 200, description = "Upload transcoded and committed", body = ApiResponse<ContentRecord>),
        (status = 400, description = "Bad Request"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Content Not Found"),
        (status = 409, description = "Superseded by a newer upload"),
        (status = 502, description = "Transcoding failed"),
        (status = 504, description = "Transcoding timed out")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn commit_upload(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommitUploadRequest>,
) -> impl IntoResponse {
    match ContentService::commit_raw_upload(state, &principal, id, req).await {
        Ok(res) => ApiSuccess::ok(res, "Upload processed successfully").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/contents/{id}/transcode",
    params(
        ("id" = Uuid, Path, description = "Content ID")
    ),
    responses(
        (status = 200, description = "Transcode re-run", body = ApiResponse<ContentRecord>),
        (status = 409, description = "Content is not awaiting a transcode"),
        (status = 502, description = "Transcoding failed"),
        (status = 504, description = "Transcoding timed out")
    ),
    tag = "Content",
    security(("bearer_auth" = []))
)]
pub async fn retry_transcode(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match ContentService::retry_transcode(state, &principal, id).await {
        Ok(res) => ApiSuccess::ok(res, "Transcode completed").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use crate::app::create_app;
    use crate::modules::content::model::MediaStatus;
    use crate::rpc::RpcCode;
    use crate::testing::{ScriptedTranscoder, TestApp, principal};
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const TOKEN: &str = "user-token";

    fn signed_in(app: &TestApp) -> Router {
        app.identity.register(TOKEN, principal());
        create_app(app.state.clone())
    }

    fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn create(router: &Router, media_type: &str) -> String {
        let (status, body) = send(
            router,
            post(
                "/api/v1/contents",
                Some(TOKEN),
                json!({"title": "Pilot", "media_type": media_type}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn requests_without_identity_are_rejected_before_any_work() {
        let app = TestApp::new(ScriptedTranscoder::succeeding());
        let router = signed_in(&app);

        for token in [None, Some("unknown")] {
            let (status, body) = send(
                &router,
                post("/api/v1/contents", token, json!({"title": "x", "media_type": "audio"})),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["status"], "error");
        }
        assert!(app.storage.calls().is_empty());
    }

    #[tokio::test]
    async fn full_upload_flow() {
        let app = TestApp::new(ScriptedTranscoder::succeeding());
        let router = signed_in(&app);
        let id = create(&router, "video").await;

        let (status, body) = send(
            &router,
            post(
                &format!("/api/v1/contents/{id}/upload-url"),
                Some(TOKEN),
                json!({"file_name": "trailer.mp4", "is_audio_file": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let raw_key = body["data"]["object_key"].as_str().unwrap().to_string();
        assert_eq!(raw_key, format!("video/{id}.mp4"));
        assert_eq!(body["data"]["bucket"], "media");

        app.storage.insert("media", &raw_key, Bytes::from_static(b"uploaded"));

        let (status, body) = send(
            &router,
            post(
                &format!("/api/v1/contents/{id}/upload"),
                Some(TOKEN),
                json!({"object_key": raw_key}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["object_key"], format!("video/{id}.m3u8"));
        assert_eq!(body["data"]["status"], "final");
        assert_eq!(body["data"]["media_type"], "video");
    }

    #[tokio::test]
    async fn worker_failure_is_bad_gateway_and_retry_recovers() {
        let app = TestApp::new(ScriptedTranscoder::failing(RpcCode::Internal));
        let router = signed_in(&app);
        let id = create(&router, "audio").await;
        let raw_key = format!("audio/{id}.mp3");
        app.storage.insert("media", &raw_key, Bytes::from_static(b"uploaded"));

        let (status, body) = send(
            &router,
            post(
                &format!("/api/v1/contents/{id}/upload"),
                Some(TOKEN),
                json!({"object_key": raw_key}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "Transcoding failed");

        let uuid = id.parse().unwrap();
        assert_eq!(app.contents.record(uuid).unwrap().status, MediaStatus::Failed);

        app.transcoder.succeed_from_now();
        let (status, body) = send(
            &router,
            post(&format!("/api/v1/contents/{id}/transcode"), Some(TOKEN), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "final");
    }

    #[tokio::test]
    async fn other_users_content_is_forbidden() {
        let app = TestApp::new(ScriptedTranscoder::succeeding());
        let router = signed_in(&app);
        let id = create(&router, "audio").await;

        app.identity.register("intruder", principal());
        let req = Request::get(format!("/api/v1/contents/{id}"))
            .header("authorization", "Bearer intruder")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = Request::get(format!("/api/v1/contents/{id}"))
            .header("authorization", format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "draft");
    }

    #[tokio::test]
    async fn category_mismatch_is_bad_request() {
        let app = TestApp::new(ScriptedTranscoder::succeeding());
        let router = signed_in(&app);
        let id = create(&router, "audio").await;

        let (status, _) = send(
            &router,
            post(
                &format!("/api/v1/contents/{id}/upload-url"),
                Some(TOKEN),
                json!({"file_name": "clip.mp4", "is_audio_file": false}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.storage.calls().is_empty());
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = TestApp::new(ScriptedTranscoder::succeeding());
        let router = create_app(app.state.clone());
        let res = router
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
