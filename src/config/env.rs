use std::env;

pub enum EnvKey {
    ServerPort,
    WorkerPort,
    DatabaseUrl,
    RedisUrl,
    S3Endpoint,
    S3Region,
    S3Bucket,
    S3AccessKey,
    S3SecretKey,
    RpcAuthKey,
    ConversionServiceUrl,
    UserServiceUrl,
    ConversionTimeoutSecs,
    UploadUrlExpirySecs,
    IdentityCacheTtlSecs,
    FfmpegPath,
    ScratchDir,
    HlsSegmentSeconds,
    CleanupQueueCapacity,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::WorkerPort => "WORKER_PORT",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3AccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::S3SecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::RpcAuthKey => "RPC_AUTH_KEY",
            EnvKey::ConversionServiceUrl => "CONVERSION_SERVICE_URL",
            EnvKey::UserServiceUrl => "USER_SERVICE_URL",
            EnvKey::ConversionTimeoutSecs => "CONVERSION_TIMEOUT_SECS",
            EnvKey::UploadUrlExpirySecs => "UPLOAD_URL_EXPIRY_SECS",
            EnvKey::IdentityCacheTtlSecs => "IDENTITY_CACHE_TTL_SECS",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::HlsSegmentSeconds => "HLS_SEGMENT_SECONDS",
            EnvKey::CleanupQueueCapacity => "CLEANUP_QUEUE_CAPACITY",
        }
    }
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}
