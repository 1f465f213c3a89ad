pub mod auth;
pub mod client;
pub mod contract;

pub use auth::{SharedSecret, require_shared_secret};
pub use client::{ConversionClient, RpcClient, RpcError, Transcoder};
pub use contract::{ConversionRequest, ConversionResponse, RpcCode, RpcStatus};
