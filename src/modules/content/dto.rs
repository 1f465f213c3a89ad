use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::common::media::MediaType;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateContentRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
    pub media_type: MediaType,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UploadGrantRequest {
    /// Original file name; only its extension is used.
    #[validate(length(min = 1, max = 255, message = "File name is required"))]
    pub file_name: String,
    pub is_audio_file: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadGrantResponse {
    pub upload_url: String,
    pub object_key: String,
    pub bucket: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommitUploadRequest {
    #[validate(length(min = 1, max = 1024, message = "Object key is required"))]
    pub object_key: String,
}
