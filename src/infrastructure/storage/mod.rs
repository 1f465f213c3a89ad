//! Object storage adapter.
//!
//! Everything that touches the object store goes through [`ObjectStore`], so the
//! orchestrator and the worker can be exercised against an in-memory double.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod s3;

pub use s3::StorageService;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("download failed for {key}: {reason}")]
    DownloadFailed { key: String, reason: String },

    #[error("upload failed for {key}: {reason}")]
    UploadFailed { key: String, reason: String },

    #[error("delete failed for {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    #[error("presign failed for {key}: {reason}")]
    PresignFailed { key: String, reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A signed, time-limited URL a client may `PUT` an object to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUpload {
    pub url: String,
    pub expires_in: Duration,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Stores `body` as a public-readable object.
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str)
    -> StorageResult<()>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<SignedUpload>;
}
