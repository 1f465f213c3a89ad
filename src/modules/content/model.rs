use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::media::MediaType;

/// Where a record's media object is in its lifecycle.
///
/// `draft` has no key. `raw` and `transcoding` point at the client upload.
/// `final` points at the published playlist. `failed` keeps the raw key so the
/// job can be re-dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "media_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Draft,
    Raw,
    Transcoding,
    Final,
    Failed,
}

impl MediaStatus {
    /// Whether a transcode may be (re)dispatched from this state.
    pub fn can_dispatch(self) -> bool {
        matches!(self, MediaStatus::Raw | MediaStatus::Failed)
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, ToSchema)]
pub struct ContentRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub media_type: MediaType,
    pub object_key: Option<String>,
    pub status: MediaStatus,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub modified_at: OffsetDateTime,
}

impl ContentRecord {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Insert payload for a new record.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub media_type: MediaType,
}
