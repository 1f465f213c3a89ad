//! Media categories and the object-key scheme shared by the orchestrator and
//! the transcode worker.
//!
//! Raw uploads live at `{category}/{content_id}.{ext}`. Derived HLS output keeps
//! the same prefix and stem with `.m3u8` (playlist) and `.ts` (segment).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const PLAYLIST_EXTENSION: &str = "m3u8";
pub const SEGMENT_EXTENSION: &str = "ts";
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "media_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
}

impl MediaType {
    pub fn from_audio_flag(is_audio: bool) -> Self {
        if is_audio {
            MediaType::Audio
        } else {
            MediaType::Video
        }
    }

    pub fn is_audio(self) -> bool {
        matches!(self, MediaType::Audio)
    }

    /// Key prefix for objects of this category.
    pub fn category(self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.category())
    }
}

/// Extension of `filename`, lowercased. `None` when there is no non-empty
/// extension after the last dot.
pub fn file_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Deterministic key for a raw upload: `{category}/{content_id}.{ext}`.
pub fn upload_key(media_type: MediaType, content_id: Uuid, extension: &str) -> String {
    format!("{}/{}.{}", media_type.category(), content_id, extension)
}

/// True when `key` is a raw upload key that belongs to `content_id`.
pub fn is_upload_key_for(key: &str, media_type: MediaType, content_id: Uuid) -> bool {
    let prefix = format!("{}/{}.", media_type.category(), content_id);
    match key.strip_prefix(&prefix) {
        Some(ext) => {
            !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext != PLAYLIST_EXTENSION
                && ext != SEGMENT_EXTENSION
        }
        None => false,
    }
}

/// Playlist and segment keys derived from a source key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsKeys {
    pub playlist: String,
    pub segment: String,
}

impl HlsKeys {
    /// Strips the extension of the last path segment and swaps in the HLS
    /// extensions, keeping the prefix. Returns `None` for keys without a
    /// file name or without an extension.
    pub fn derive(source_key: &str) -> Option<Self> {
        let (prefix, name) = match source_key.rsplit_once('/') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, source_key),
        };
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }

        let base = match prefix {
            Some(prefix) => format!("{prefix}/{stem}"),
            None => stem.to_string(),
        };

        Some(Self {
            playlist: format!("{base}.{PLAYLIST_EXTENSION}"),
            segment: format!("{base}.{SEGMENT_EXTENSION}"),
        })
    }

    /// File names (no prefix) the encoder should write to.
    pub fn file_names(&self) -> (String, String) {
        let last = |key: &str| key.rsplit('/').next().unwrap_or(key).to_string();
        (last(&self.playlist), last(&self.segment))
    }
}

/// Every object key that makes up the media referenced by `key`. A playlist
/// brings its segment along.
pub fn objects_for_key(key: &str) -> Vec<String> {
    match HlsKeys::derive(key) {
        Some(hls) if hls.playlist == key => vec![hls.playlist, hls.segment],
        _ => vec![key.to_string()],
    }
}
