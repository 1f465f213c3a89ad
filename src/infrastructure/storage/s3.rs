use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{info, warn};

use super::{ObjectStore, SignedUpload, StorageError, StorageResult};
use crate::config::settings::S3Settings;

#[derive(Clone)]
pub struct StorageService {
    client: Client,
}

impl StorageService {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "static",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &settings.endpoint {
            // Path-style addressing is required for MinIO
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!(region = %settings.region, endpoint = ?settings.endpoint, "✅ S3 client configured");

        Self { client }
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::DownloadFailed {
                        key: key.to_string(),
                        reason: service_error.to_string(),
                    }
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(data.into_bytes())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let size = body.len();

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed {
                key: key.to_string(),
                reason: e.into_service_error().to_string(),
            })?;

        info!(bucket, key, size_bytes = size, content_type, "S3 upload successful");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed {
                key: key.to_string(),
                reason: e.into_service_error().to_string(),
            })?;

        info!(bucket, key, "S3 object deleted");
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    warn!(bucket, key, error = %service_error, "S3 head_object failed");
                    Err(StorageError::Backend(service_error.to_string()))
                }
            }
        }
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<SignedUpload> {
        let presigning_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|e| StorageError::PresignFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::PresignFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(SignedUpload {
            url: request.uri().to_string(),
            expires_in,
        })
    }
}
