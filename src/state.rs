use std::sync::Arc;
use std::time::Duration;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::ObjectStore;
use crate::modules::content::repository::ContentStore;
use crate::modules::identity::IdentityResolver;
use crate::rpc::Transcoder;
use crate::workers::cleanup::CleanupQueue;

/// Media settings the content handlers need at request time.
#[derive(Clone, Debug)]
pub struct MediaSettings {
    pub bucket: String,
    pub upload_url_expiry: Duration,
}

impl From<&AppConfig> for MediaSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            bucket: config.s3.bucket.clone(),
            upload_url_expiry: config.upload_url_expiry,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub media: MediaSettings,
    pub contents: Arc<dyn ContentStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub identity: Arc<dyn IdentityResolver>,
    pub cleanup: CleanupQueue,
}

impl AppState {
    pub fn new(
        media: MediaSettings,
        contents: Arc<dyn ContentStore>,
        storage: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
        identity: Arc<dyn IdentityResolver>,
        cleanup: CleanupQueue,
    ) -> Self {
        Self {
            media,
            contents,
            storage,
            transcoder,
            identity,
            cleanup,
        }
    }
}
