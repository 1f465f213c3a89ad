use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::env::{self, EnvKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("{key}={value:?} is not valid, expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get_opt(key).ok_or(ConfigError::Missing(name))
}

fn required_url(key: EnvKey) -> Result<Url, ConfigError> {
    let name = key.as_str();
    let raw = required(key)?;
    Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { key: name, source })
}

/// Unset means `default`. A value that is set but does not parse is an error.
fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid {
                key,
                value,
                expected: "a number",
            })
        }
    }
}

fn positive_or(key: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match parse_or(key, raw, default)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            expected: "a value greater than zero",
        }),
        n => Ok(n),
    }
}

fn parsed<T: FromStr>(key: EnvKey, default: T) -> Result<T, ConfigError> {
    parse_or(key.as_str(), env::get_opt(key), default)
}

fn positive(key: EnvKey, default: u64) -> Result<u64, ConfigError> {
    positive_or(key.as_str(), env::get_opt(key), default)
}

fn seconds(key: EnvKey, default: u64) -> Result<Duration, ConfigError> {
    positive(key, default).map(Duration::from_secs)
}

/// Object store connection shared by both processes.
#[derive(Clone, Debug)]
pub struct S3Settings {
    /// Custom endpoint for S3-compatible stores (MinIO). `None` targets AWS.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

impl S3Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env::get_opt(EnvKey::S3Endpoint),
            region: env::get_or(EnvKey::S3Region, "us-east-1"),
            bucket: required(EnvKey::S3Bucket)?,
            access_key: required(EnvKey::S3AccessKey)?,
            secret_key: required(EnvKey::S3SecretKey)?,
        })
    }
}

/// Content orchestrator configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub s3: S3Settings,
    pub rpc_auth_key: String,
    pub conversion_service_url: Url,
    pub user_service_url: Url,
    pub conversion_timeout: Duration,
    pub upload_url_expiry: Duration,
    pub identity_cache_ttl: Duration,
    pub cleanup_queue_capacity: usize,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            server_port: parsed(EnvKey::ServerPort, 3000)?,
            database_url: required(EnvKey::DatabaseUrl)?,
            redis_url: required(EnvKey::RedisUrl)?,
            s3: S3Settings::from_env()?,
            rpc_auth_key: required(EnvKey::RpcAuthKey)?,
            conversion_service_url: required_url(EnvKey::ConversionServiceUrl)?,
            user_service_url: required_url(EnvKey::UserServiceUrl)?,
            conversion_timeout: seconds(EnvKey::ConversionTimeoutSecs, 300)?,
            upload_url_expiry: seconds(EnvKey::UploadUrlExpirySecs, 900)?,
            identity_cache_ttl: seconds(EnvKey::IdentityCacheTtlSecs, 3600)?,
            cleanup_queue_capacity: positive(EnvKey::CleanupQueueCapacity, 256)? as usize,
        })
    }
}

/// Transcode worker configuration.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub port: u16,
    pub s3: S3Settings,
    pub rpc_auth_key: String,
    pub ffmpeg_path: String,
    pub scratch_dir: PathBuf,
    pub hls_segment_seconds: u32,
    pub cleanup_queue_capacity: usize,
}

impl WorkerConfig {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            port: parsed(EnvKey::WorkerPort, 50051)?,
            s3: S3Settings::from_env()?,
            rpc_auth_key: required(EnvKey::RpcAuthKey)?,
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            scratch_dir: env::get_opt(EnvKey::ScratchDir)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            hls_segment_seconds: positive(EnvKey::HlsSegmentSeconds, 10)? as u32,
            cleanup_queue_capacity: positive(EnvKey::CleanupQueueCapacity, 256)? as usize,
        })
    }
}
