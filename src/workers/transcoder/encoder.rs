use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

use crate::common::media::MediaType;

const AUDIO_BITRATE: &str = "320k";
const VIDEO_CRF: &str = "28";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to spawn encoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder exited with {status}")]
    Failed { status: String, stderr: String },

    #[error("encoder did not produce {0}")]
    MissingOutput(PathBuf),
}

/// One encoder run: read `input`, write an HLS playlist at `playlist` and its
/// single segment file at `segment`.
#[derive(Debug, Clone)]
pub struct EncodePlan {
    pub media_type: MediaType,
    pub input: PathBuf,
    pub playlist: PathBuf,
    pub segment: PathBuf,
}

#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, plan: &EncodePlan) -> Result<(), EncodeError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: String,
    segment_seconds: u32,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<String>, segment_seconds: u32) -> Self {
        Self {
            program: program.into(),
            segment_seconds,
        }
    }

    /// ffmpeg arguments for `plan`. With `single_file` the muxer writes the
    /// segment next to the playlist using the playlist's stem.
    pub fn args(&self, plan: &EncodePlan) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-i".into(), path_arg(&plan.input)];

        match plan.media_type {
            MediaType::Audio => {
                args.extend(["-c:a", "aac", "-b:a", AUDIO_BITRATE, "-vn"].map(String::from));
            }
            MediaType::Video => {
                args.extend(
                    [
                        "-c:v", "libx265", "-crf", VIDEO_CRF, "-c:a", "aac", "-b:a", AUDIO_BITRATE,
                    ]
                    .map(String::from),
                );
            }
        }

        args.extend([
            "-hls_time".to_string(),
            self.segment_seconds.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_flags".to_string(),
            "single_file".to_string(),
            path_arg(&plan.playlist),
        ]);

        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, plan: &EncodePlan) -> Result<(), EncodeError> {
        let args = self.args(plan);
        info!(program = %self.program, media_type = %plan.media_type, "Running encoder");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EncodeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!(status = %output.status, stderr = %stderr, "FFmpeg failed");
            return Err(EncodeError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        for produced in [&plan.playlist, &plan.segment] {
            if !tokio::fs::try_exists(produced).await.unwrap_or(false) {
                return Err(EncodeError::MissingOutput(produced.clone()));
            }
        }

        Ok(())
    }
}
