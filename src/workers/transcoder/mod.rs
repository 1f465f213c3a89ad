//! The transcode worker: a stateless RPC service that turns a raw upload into
//! HLS output and retires the source.

pub mod encoder;
pub mod pipeline;
pub mod server;

pub use encoder::{EncodeError, EncodePlan, Encoder, FfmpegEncoder};
pub use pipeline::{PipelineError, TranscodeJob, TranscodePipeline};
pub use server::router;
