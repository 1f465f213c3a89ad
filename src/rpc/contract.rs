//! Wire contract between the content orchestrator and its backing services.
//!
//! Both sides compile against this module. Route paths carry the contract
//! version (`/rpc/v1/...`).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CONVERSION_PATH: &str = "/rpc/v1/conversion";
pub const USER_DETAIL_PATH: &str = "/rpc/v1/user-detail";
pub const AUTHORIZATION_METADATA: &str = "authorization";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub key: String,
    pub is_audio_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetailRequest {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetailResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Status codes carried by a failed call, named after their gRPC
/// counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCode {
    InvalidArgument,
    Unauthenticated,
    NotFound,
    Internal,
}

impl RpcCode {
    pub fn http_status(self) -> StatusCode {
        match self {
            RpcCode::InvalidArgument => StatusCode::BAD_REQUEST,
            RpcCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            RpcCode::NotFound => StatusCode::NOT_FOUND,
            RpcCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(RpcCode::InvalidArgument, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Unauthenticated, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Internal, message)
    }
}

impl std::fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl IntoResponse for RpcStatus {
    fn into_response(self) -> Response {
        (self.code.http_status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_request_uses_camel_case_fields() {
        let req = ConversionRequest {
            key: "audio/abc.mp3".into(),
            is_audio_file: true,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"key": "audio/abc.mp3", "isAudioFile": true}));
    }

    #[test]
    fn status_codes_serialize_like_grpc_names() {
        let status = RpcStatus::invalid_argument("missing metadata");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["code"], "INVALID_ARGUMENT");
        assert_eq!(RpcCode::Unauthenticated.http_status(), StatusCode::UNAUTHORIZED);
    }
}
