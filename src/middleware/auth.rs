use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::common::error::AppError;
use crate::modules::identity::IdentityError;
use crate::state::AppState;

/// Resolves the bearer token to an [`AuthPrincipal`] and stores it in the
/// request extensions. Rejects before any handler runs.
///
/// [`AuthPrincipal`]: crate::modules::identity::AuthPrincipal
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Missing or invalid token".to_string()))?;

    let principal = state.identity.resolve(token).await.map_err(|e| {
        if let IdentityError::Unavailable(reason) = &e {
            warn!(reason = %reason, "Could not resolve identity");
        }
        AppError::Auth("Unauthorized".to_string())
    })?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
