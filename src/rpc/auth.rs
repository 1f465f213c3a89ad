use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::contract::{AUTHORIZATION_METADATA, RpcStatus};

/// Service-to-service credential. Built once at startup and handed to both
/// the inbound interceptor and outbound clients.
#[derive(Clone)]
pub struct SharedSecret(Arc<str>);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Arc::from(secret.into()))
    }

    /// Value for the outbound `authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    pub fn matches(&self, token: &str) -> bool {
        // Length is not secret; the byte comparison is.
        let expected = self.0.as_bytes();
        let given = token.as_bytes();
        expected.len() == given.len() && bool::from(expected.ct_eq(given))
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Validates an `authorization` value against the shared secret.
///
/// Absent metadata is `INVALID_ARGUMENT`; anything else that is not exactly
/// `Bearer <secret>` is `UNAUTHENTICATED`.
pub fn check_authorization(
    secret: &SharedSecret,
    header: Option<&HeaderValue>,
) -> Result<(), RpcStatus> {
    let header = header.ok_or_else(|| RpcStatus::invalid_argument("missing metadata"))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| RpcStatus::unauthenticated("invalid token"))?;

    if token.is_empty() || !secret.matches(token) {
        return Err(RpcStatus::unauthenticated("invalid token"));
    }

    Ok(())
}

/// Interceptor applied to every RPC route; rejects before the handler runs.
pub async fn require_shared_secret(
    State(secret): State<SharedSecret>,
    req: Request,
    next: Next,
) -> Result<Response, RpcStatus> {
    if let Err(status) = check_authorization(&secret, req.headers().get(AUTHORIZATION_METADATA)) {
        warn!(path = %req.uri().path(), code = ?status.code, "Rejected RPC call");
        return Err(status);
    }

    Ok(next.run(req).await)
}
