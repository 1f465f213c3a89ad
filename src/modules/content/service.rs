use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::dto::{CommitUploadRequest, CreateContentRequest, UploadGrantRequest, UploadGrantResponse};
use super::model::{ContentRecord, MediaStatus, NewContent};
use crate::common::error::AppError;
use crate::common::media::{
    HlsKeys, MediaType, PLAYLIST_EXTENSION, SEGMENT_EXTENSION, file_extension,
    is_upload_key_for, objects_for_key, upload_key,
};
use crate::modules::identity::AuthPrincipal;
use crate::rpc::contract::ConversionRequest;
use crate::state::AppState;

pub struct ContentService;

impl ContentService {
    pub async fn create(
        state: AppState,
        principal: &AuthPrincipal,
        req: CreateContentRequest,
    ) -> Result<ContentRecord, AppError> {
        req.validate()?;

        let record = state
            .contents
            .create(NewContent {
                owner_id: principal.id,
                title: req.title.trim().to_string(),
                description: req.description,
                media_type: req.media_type,
            })
            .await?;

        info!(content_id = %record.id, media_type = %record.media_type, "Content created");
        Ok(record)
    }

    pub async fn get(
        state: AppState,
        principal: &AuthPrincipal,
        id: Uuid,
    ) -> Result<ContentRecord, AppError> {
        Self::load_owned(&state, principal, id).await
    }

    /// Signs a direct-to-storage upload slot. The record is not touched.
    #[instrument(skip_all, fields(content_id = %id))]
    pub async fn issue_upload_grant(
        state: AppState,
        principal: &AuthPrincipal,
        id: Uuid,
        req: UploadGrantRequest,
    ) -> Result<UploadGrantResponse, AppError> {
        req.validate()?;

        let extension = file_extension(&req.file_name)
            .ok_or_else(|| AppError::Validation("File name has no extension".to_string()))?;
        if !is_media_extension(&extension) {
            return Err(AppError::Validation(format!(
                "`.{extension}` is not an audio or video file"
            )));
        }

        let record = Self::load_owned(&state, principal, id).await?;
        if MediaType::from_audio_flag(req.is_audio_file) != record.media_type {
            return Err(AppError::Validation(format!(
                "Content is {}, upload category does not match",
                record.media_type
            )));
        }

        let object_key = upload_key(record.media_type, record.id, &extension);
        let signed = state
            .storage
            .presign_put(&state.media.bucket, &object_key, state.media.upload_url_expiry)
            .await?;

        info!(object_key = %object_key, "Upload grant issued");

        Ok(UploadGrantResponse {
            upload_url: signed.url,
            object_key,
            bucket: state.media.bucket.clone(),
            expires_in_secs: signed.expires_in.as_secs(),
        })
    }

    /// Records a finished client upload and runs the transcode job to
    /// completion.
    ///
    /// The raw key is written before anything is dispatched, and the object
    /// it replaces is only queued for deletion once that write has committed.
    #[instrument(skip_all, fields(content_id = %id))]
    pub async fn commit_raw_upload(
        state: AppState,
        principal: &AuthPrincipal,
        id: Uuid,
        req: CommitUploadRequest,
    ) -> Result<ContentRecord, AppError> {
        req.validate()?;
        let raw_key = req.object_key;

        let record = Self::load_owned(&state, principal, id).await?;
        if !is_upload_key_for(&raw_key, record.media_type, record.id) {
            return Err(AppError::Validation(format!(
                "`{raw_key}` is not an upload key for this content"
            )));
        }
        if !state.storage.exists(&state.media.bucket, &raw_key).await? {
            return Err(AppError::Validation(
                "Uploaded object was not found in storage".to_string(),
            ));
        }

        let previous = state
            .contents
            .commit_raw_key(id, &raw_key)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => AppError::NotFound("Content not found".to_string()),
                other => AppError::Database(other),
            })?;
        info!(raw_key = %raw_key, "Raw upload committed");

        if let Some(previous) = previous {
            Self::retire_replaced(&state, &previous, &raw_key);
        }

        Self::dispatch(&state, id, &raw_key, record.media_type).await
    }

    /// Re-runs the transcode for a record whose last attempt failed or never
    /// started.
    #[instrument(skip_all, fields(content_id = %id))]
    pub async fn retry_transcode(
        state: AppState,
        principal: &AuthPrincipal,
        id: Uuid,
    ) -> Result<ContentRecord, AppError> {
        let record = Self::load_owned(&state, principal, id).await?;

        let raw_key = match (&record.object_key, record.status.can_dispatch()) {
            (Some(key), true) => key.clone(),
            _ => {
                return Err(AppError::Conflict(format!(
                    "Content in status {:?} cannot be transcoded",
                    record.status
                )));
            }
        };

        if !state.storage.exists(&state.media.bucket, &raw_key).await? {
            return Self::adopt_published_output(&state, id, &raw_key).await;
        }

        info!(raw_key = %raw_key, "Re-dispatching transcode");
        Self::dispatch(&state, id, &raw_key, record.media_type).await
    }

    /// The worker retires the source only after publishing, so a missing raw
    /// object with its playlist and segment in place means a finished job
    /// whose reply never arrived.
    async fn adopt_published_output(
        state: &AppState,
        id: Uuid,
        raw_key: &str,
    ) -> Result<ContentRecord, AppError> {
        let gone = || {
            AppError::Validation(
                "Uploaded object is no longer in storage, upload it again".to_string(),
            )
        };

        let hls = HlsKeys::derive(raw_key).ok_or_else(gone)?;
        let bucket = &state.media.bucket;
        if !state.storage.exists(bucket, &hls.playlist).await?
            || !state.storage.exists(bucket, &hls.segment).await?
        {
            return Err(gone());
        }

        match state.contents.commit_final_key(id, raw_key, &hls.playlist).await? {
            Some(record) => {
                info!(output_key = %hls.playlist, "Adopted output of an unanswered transcode");
                Ok(record)
            }
            None => Err(AppError::Conflict(
                "Content was re-uploaded while recovering".to_string(),
            )),
        }
    }

    async fn dispatch(
        state: &AppState,
        id: Uuid,
        raw_key: &str,
        media_type: MediaType,
    ) -> Result<ContentRecord, AppError> {
        if !state
            .contents
            .update_status(id, raw_key, MediaStatus::Transcoding)
            .await?
        {
            return Err(AppError::Conflict(
                "Content was re-uploaded while dispatching".to_string(),
            ));
        }

        let request = ConversionRequest {
            key: raw_key.to_string(),
            is_audio_file: media_type.is_audio(),
        };

        match state.transcoder.convert(request).await {
            Ok(response) => {
                let committed = match state
                    .contents
                    .commit_final_key(id, raw_key, &response.key)
                    .await
                {
                    Ok(committed) => committed,
                    Err(e) => {
                        error!(error = %e, output_key = %response.key, "Failed to commit transcode result");
                        Self::mark_failed(state, id, raw_key).await;
                        return Err(AppError::Database(e));
                    }
                };

                match committed {
                    Some(record) => {
                        info!(output_key = %response.key, "Transcode committed");
                        Ok(record)
                    }
                    None => {
                        warn!(output_key = %response.key, "Transcode result superseded by a newer upload");
                        Err(AppError::Conflict(
                            "Content was re-uploaded during transcoding".to_string(),
                        ))
                    }
                }
            }
            Err(e) => {
                error!(error = %e, raw_key = %raw_key, "Transcode failed");
                Self::mark_failed(state, id, raw_key).await;
                Err(AppError::from(e))
            }
        }
    }

    /// Leaves the record re-dispatchable. Best effort.
    async fn mark_failed(state: &AppState, id: Uuid, raw_key: &str) {
        if let Err(db) = state
            .contents
            .update_status(id, raw_key, MediaStatus::Failed)
            .await
        {
            error!(error = %db, "Failed to mark content as failed");
        }
    }

    /// Queues deletion of the objects behind `previous`, except any key the
    /// upcoming transcode of `raw_key` will write to.
    fn retire_replaced(state: &AppState, previous: &str, raw_key: &str) {
        if previous == raw_key {
            return;
        }

        let upcoming = HlsKeys::derive(raw_key);
        for key in objects_for_key(previous) {
            let overwritten = upcoming
                .as_ref()
                .is_some_and(|hls| hls.playlist == key || hls.segment == key);
            if key != raw_key && !overwritten {
                state.cleanup.delete_object(&state.media.bucket, &key);
            }
        }
    }

    async fn load_owned(
        state: &AppState,
        principal: &AuthPrincipal,
        id: Uuid,
    ) -> Result<ContentRecord, AppError> {
        let record = state
            .contents
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Content not found".to_string()))?;

        if !record.is_owned_by(principal.id) {
            return Err(AppError::Forbidden(
                "You do not own this content".to_string(),
            ));
        }

        Ok(record)
    }
}

/// Audio or video by MIME type. Streaming outputs are never valid uploads.
fn is_media_extension(extension: &str) -> bool {
    if extension == PLAYLIST_EXTENSION || extension == SEGMENT_EXTENSION {
        return false;
    }
    mime_guess::from_ext(extension)
        .iter()
        .any(|mime| mime.type_() == mime_guess::mime::AUDIO || mime.type_() == mime_guess::mime::VIDEO)
}
