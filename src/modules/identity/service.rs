use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::model::AuthPrincipal;
use crate::infrastructure::redis::client::RedisService;
use crate::rpc::RpcClient;
use crate::rpc::client::RpcError;
use crate::rpc::contract::{RpcCode, USER_DETAIL_PATH, UserDetailRequest, UserDetailResponse};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid or expired token")]
    Unauthenticated,

    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<AuthPrincipal, IdentityError>;
}

/// Short-lived token → principal entries.
#[async_trait]
pub trait IdentityCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RedisError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RedisError>;
}

#[async_trait]
impl IdentityCache for RedisService {
    async fn get(&self, key: &str) -> Result<Option<String>, RedisError> {
        let mut conn = self.get_conn().await?;
        conn.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), RedisError> {
        let mut conn = self.get_conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await
    }
}

/// Token → principal through the cache, falling back to the user service.
/// Cache failures degrade to a direct lookup.
#[derive(Clone)]
pub struct CachedIdentityResolver {
    cache: Arc<dyn IdentityCache>,
    users: RpcClient,
    ttl: Duration,
}

impl CachedIdentityResolver {
    pub fn new(cache: Arc<dyn IdentityCache>, users: RpcClient, ttl: Duration) -> Self {
        Self { cache, users, ttl }
    }

    async fn cached(&self, key: &str) -> Option<AuthPrincipal> {
        match self.cache.get(key).await {
            Ok(raw) => raw.and_then(|raw| serde_json::from_str(&raw).ok()),
            Err(e) => {
                warn!(error = %e, "Identity cache read failed");
                None
            }
        }
    }

    async fn store(&self, key: &str, principal: &AuthPrincipal) {
        let Ok(raw) = serde_json::to_string(principal) else {
            return;
        };

        if let Err(e) = self.cache.set_ex(key, &raw, self.ttl).await {
            warn!(error = %e, "Identity cache write failed");
        }
    }
}

#[async_trait]
impl IdentityResolver for CachedIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<AuthPrincipal, IdentityError> {
        if token.is_empty() {
            return Err(IdentityError::Unauthenticated);
        }

        let key = cache_key(token);
        if let Some(principal) = self.cached(&key).await {
            debug!(user_id = %principal.id, "Identity cache hit");
            return Ok(principal);
        }

        let request = UserDetailRequest {
            token: token.to_string(),
        };
        let principal: AuthPrincipal = self
            .users
            .call::<_, UserDetailResponse>(USER_DETAIL_PATH, &request)
            .await
            .map_err(classify)?
            .into();

        self.store(&key, &principal).await;
        Ok(principal)
    }
}

pub fn cache_key(token: &str) -> String {
    format!("identity:{}", token)
}

/// Caller-side rejections mean a bad token; anything else is an outage.
fn classify(e: RpcError) -> IdentityError {
    match e.code() {
        Some(RpcCode::Unauthenticated | RpcCode::NotFound | RpcCode::InvalidArgument) => {
            IdentityError::Unauthenticated
        }
        _ => {
            error!(error = %e, "User service lookup failed");
            IdentityError::Unavailable(e.to_string())
        }
    }
}
