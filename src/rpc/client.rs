use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::auth::SharedSecret;
use super::contract::{
    AUTHORIZATION_METADATA, CONVERSION_PATH, ConversionRequest, ConversionResponse, RpcCode,
    RpcStatus,
};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("rpc call failed: {0}")]
    Status(RpcStatus),

    #[error("malformed rpc response: {0}")]
    Decode(String),
}

impl RpcError {
    pub fn code(&self) -> Option<RpcCode> {
        match self {
            RpcError::Status(status) => Some(status.code),
            _ => None,
        }
    }
}

/// Minimal JSON-over-HTTP caller that attaches the shared secret as
/// transport metadata and enforces a per-call timeout.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base_url: Url,
    secret: SharedSecret,
    timeout: Duration,
}

impl RpcClient {
    /// `base_url` may carry a path prefix; method paths are resolved below it.
    pub fn new(mut base_url: Url, secret: SharedSecret, timeout: Duration) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            secret,
            timeout,
        }
    }

    pub async fn call<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = self.endpoint(path)?;

        debug!(%url, "Dispatching RPC call");

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION_METADATA, self.secret.bearer())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout(self.timeout)
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                RpcError::Timeout(self.timeout)
            } else {
                RpcError::Transport(e.to_string())
            }
        })?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| RpcError::Decode(e.to_string()));
        }

        let rpc_status = serde_json::from_slice::<RpcStatus>(&body).unwrap_or_else(|_| {
            RpcStatus::internal(format!("unexpected HTTP status {status}"))
        });
        warn!(path, http_status = %status, code = ?rpc_status.code, "RPC call failed");
        Err(RpcError::Status(rpc_status))
    }

    fn endpoint(&self, path: &str) -> Result<Url, RpcError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| RpcError::Transport(format!("invalid rpc url: {e}")))
    }
}

/// The orchestrator's view of the transcode worker.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn convert(&self, request: ConversionRequest) -> Result<ConversionResponse, RpcError>;
}

#[derive(Clone)]
pub struct ConversionClient {
    rpc: RpcClient,
}

impl ConversionClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl Transcoder for ConversionClient {
    async fn convert(&self, request: ConversionRequest) -> Result<ConversionResponse, RpcError> {
        self.rpc.call(CONVERSION_PATH, &request).await
    }
}
