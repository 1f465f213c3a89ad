//! Single-job transcode pipeline:
//! `Received → Fetched → Transcoded → Published → (background) Retired`.
//!
//! Nothing is written to storage before the encoder succeeds, and the source
//! object is only queued for deletion once both derived objects are stored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info, instrument};

use super::encoder::{EncodeError, EncodePlan, Encoder};
use crate::common::media::{
    HlsKeys, MediaType, PLAYLIST_CONTENT_TYPE, PLAYLIST_EXTENSION, SEGMENT_CONTENT_TYPE,
    SEGMENT_EXTENSION, file_extension,
};
use crate::infrastructure::storage::{ObjectStore, StorageError};
use crate::rpc::contract::RpcStatus;
use crate::workers::cleanup::CleanupQueue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub source_key: String,
    pub media_type: MediaType,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid source key `{0}`")]
    InvalidKey(String),

    #[error("failed to fetch source: {0}")]
    Fetch(#[source] StorageError),

    #[error("scratch file error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("transcode failed: {0}")]
    Transcode(#[from] EncodeError),

    #[error("failed to publish output: {0}")]
    Publish(#[source] StorageError),
}

impl PipelineError {
    /// Status returned to the caller. Only bad input is reported in detail.
    pub fn to_status(&self) -> RpcStatus {
        match self {
            PipelineError::InvalidKey(key) => {
                RpcStatus::invalid_argument(format!("invalid source key `{key}`"))
            }
            _ => RpcStatus::internal("something went wrong"),
        }
    }
}

#[derive(Clone)]
pub struct TranscodePipeline {
    storage: Arc<dyn ObjectStore>,
    encoder: Arc<dyn Encoder>,
    cleanup: CleanupQueue,
    bucket: String,
    scratch_root: PathBuf,
}

impl TranscodePipeline {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        encoder: Arc<dyn Encoder>,
        cleanup: CleanupQueue,
        bucket: impl Into<String>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            encoder,
            cleanup,
            bucket: bucket.into(),
            scratch_root: scratch_root.into(),
        }
    }

    /// Runs the job and returns the playlist key.
    #[instrument(skip_all, fields(source_key = %job.source_key, media_type = %job.media_type))]
    pub async fn run(&self, job: TranscodeJob) -> Result<String, PipelineError> {
        let hls = validate_source(&job.source_key)?;
        info!(stage = "received", "Transcode job received");

        let source = self
            .storage
            .get(&self.bucket, &job.source_key)
            .await
            .map_err(PipelineError::Fetch)?;
        info!(stage = "fetched", size_bytes = source.len(), "Source object downloaded");

        let scratch = tempfile::Builder::new()
            .prefix("transcode-")
            .tempdir_in(&self.scratch_root)?;

        let result = self.encode_and_publish(&job, &hls, source, scratch.path()).await;
        self.cleanup.remove_scratch(scratch);

        match result {
            Ok(()) => {
                info!(stage = "published", output_key = %hls.playlist, "Transcode job published");
                self.cleanup.delete_object(&self.bucket, &job.source_key);
                Ok(hls.playlist)
            }
            Err(e) => {
                error!(error = %e, "Transcode job failed");
                Err(e)
            }
        }
    }

    async fn encode_and_publish(
        &self,
        job: &TranscodeJob,
        hls: &HlsKeys,
        source: Bytes,
        scratch: &Path,
    ) -> Result<(), PipelineError> {
        let source_name = job
            .source_key
            .rsplit('/')
            .next()
            .unwrap_or(&job.source_key);
        let (playlist_name, segment_name) = hls.file_names();

        let plan = EncodePlan {
            media_type: job.media_type,
            input: scratch.join(format!("source-{source_name}")),
            playlist: scratch.join(playlist_name),
            segment: scratch.join(segment_name),
        };

        tokio::fs::write(&plan.input, &source).await?;
        drop(source);

        self.encoder.encode(&plan).await?;
        info!(stage = "transcoded", "Encoder finished");

        let playlist = tokio::fs::read(&plan.playlist).await?;
        let segment = tokio::fs::read(&plan.segment).await?;

        self.storage
            .put(&self.bucket, &hls.playlist, Bytes::from(playlist), PLAYLIST_CONTENT_TYPE)
            .await
            .map_err(PipelineError::Publish)?;

        self.storage
            .put(&self.bucket, &hls.segment, Bytes::from(segment), SEGMENT_CONTENT_TYPE)
            .await
            .map_err(PipelineError::Publish)?;

        Ok(())
    }
}

/// A source must have a file name with an extension, and must not already be
/// one of the derived HLS artifacts (retiring it would delete the output).
fn validate_source(source_key: &str) -> Result<HlsKeys, PipelineError> {
    let invalid = || PipelineError::InvalidKey(source_key.to_string());

    let ext = file_extension(source_key).ok_or_else(invalid)?;
    if ext == PLAYLIST_EXTENSION || ext == SEGMENT_EXTENSION {
        return Err(invalid());
    }
    HlsKeys::derive(source_key).ok_or_else(invalid)
}
