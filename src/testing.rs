//! In-memory doubles for the storage, encoder, record store, transcoder and
//! identity seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::common::media::{HlsKeys, MediaType};
use crate::infrastructure::storage::{ObjectStore, SignedUpload, StorageError, StorageResult};
use crate::modules::content::model::{ContentRecord, MediaStatus, NewContent};
use crate::modules::content::repository::ContentStore;
use crate::modules::identity::{AuthPrincipal, IdentityError, IdentityResolver};
use crate::rpc::client::{RpcError, Transcoder};
use crate::rpc::contract::{ConversionRequest, ConversionResponse, RpcCode, RpcStatus};
use crate::state::{AppState, MediaSettings};
use crate::workers::cleanup::{CleanupQueue, CleanupWorker};
use crate::workers::transcoder::encoder::{EncodeError, EncodePlan, Encoder};
use crate::workers::transcoder::pipeline::{TranscodeJob, TranscodePipeline};

pub const TEST_BUCKET: &str = "media";

pub fn principal() -> AuthPrincipal {
    let id = Uuid::new_v4();
    AuthPrincipal {
        id,
        name: format!("user-{}", &id.simple().to_string()[..8]),
        email: format!("{}@example.test", id.simple()),
    }
}

// --- object storage ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Get(String),
    Put(String),
    Delete(String),
    Exists(String),
    Presign(String),
}

#[derive(Default)]
struct StoredObjects {
    objects: HashMap<(String, String), (Bytes, Option<String>)>,
    calls: Vec<StorageCall>,
    fail_puts: HashSet<String>,
    fail_deletes: bool,
    writes: usize,
}

/// Recording object store.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<StoredObjects>,
    delete_attempts: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without recording a call.
    pub fn insert(&self, bucket: &str, key: &str, body: Bytes) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert((bucket.to_string(), key.to_string()), (body, None));
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .objects
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|(_, content_type)| content_type.clone())
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Successful puts.
    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    pub fn fail_puts_for(&self, key: &str) {
        self.inner.lock().unwrap().fail_puts.insert(key.to_string());
    }

    pub fn fail_deletes(&self) {
        self.inner.lock().unwrap().fail_deletes = true;
    }

    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::Get(key.to_string()));
        inner
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(body, _)| body.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::Put(key.to_string()));
        if inner.fail_puts.contains(key) {
            return Err(StorageError::UploadFailed {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        inner.objects.insert(
            (bucket.to_string(), key.to_string()),
            (body, Some(content_type.to_string())),
        );
        inner.writes += 1;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::Delete(key.to_string()));
        if inner.fail_deletes {
            return Err(StorageError::DeleteFailed {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        inner.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::Exists(key.to_string()));
        Ok(inner
            .objects
            .contains_key(&(bucket.to_string(), key.to_string())))
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<SignedUpload> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(StorageCall::Presign(key.to_string()));
        Ok(SignedUpload {
            url: format!(
                "https://storage.test/{bucket}/{key}?X-Amz-Expires={}",
                expires_in.as_secs()
            ),
            expires_in,
        })
    }
}

// --- encoder ---

/// Writes placeholder HLS files instead of running ffmpeg.
pub struct FakeEncoder {
    failure: Option<String>,
    media_types: Mutex<Vec<MediaType>>,
}

impl FakeEncoder {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            media_types: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            failure: Some(stderr.to_string()),
            media_types: Mutex::new(Vec::new()),
        }
    }

    pub fn media_types(&self) -> Vec<MediaType> {
        self.media_types.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, plan: &EncodePlan) -> Result<(), EncodeError> {
        self.media_types.lock().unwrap().push(plan.media_type);

        if let Some(stderr) = &self.failure {
            return Err(EncodeError::Failed {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            });
        }

        let segment_name = plan
            .segment
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let playlist = format!(
            "#EXTM3U\n#EXT-X-PLAYLIST-TYPE:VOD\n#EXTINF:10.0,\n{segment_name}\n#EXT-X-ENDLIST\n"
        );
        tokio::fs::write(&plan.playlist, playlist).await.unwrap();
        tokio::fs::write(&plan.segment, b"segment").await.unwrap();
        Ok(())
    }
}

// --- content records ---

#[derive(Default)]
pub struct MemoryContentStore {
    records: Mutex<HashMap<Uuid, ContentRecord>>,
    history: Mutex<HashMap<Uuid, Vec<MediaStatus>>>,
    fail_next_final_commit: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: Uuid) -> Option<ContentRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    /// Every status the record has been written with, oldest first.
    pub fn status_history(&self, id: Uuid) -> Vec<MediaStatus> {
        self.history.lock().unwrap().get(&id).cloned().unwrap_or_default()
    }

    /// Overwrites the key outside the normal flow, as a concurrent request
    /// would.
    pub fn force_key(&self, id: Uuid, key: &str, status: MediaStatus) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.object_key = Some(key.to_string());
            record.status = status;
        }
    }

    /// Makes the next `commit_final_key` return a database error.
    pub fn fail_next_final_commit(&self) {
        self.fail_next_final_commit.store(true, Ordering::SeqCst);
    }

    fn write(&self, record: &mut ContentRecord, status: MediaStatus) {
        record.status = status;
        record.modified_at = OffsetDateTime::now_utc();
        self.history
            .lock()
            .unwrap()
            .entry(record.id)
            .or_default()
            .push(status);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn create(&self, new: NewContent) -> Result<ContentRecord, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let mut record = ContentRecord {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            title: new.title,
            description: new.description,
            media_type: new.media_type,
            object_key: None,
            status: MediaStatus::Draft,
            created_at: now,
            modified_at: now,
        };
        self.write(&mut record, MediaStatus::Draft);
        self.records.lock().unwrap().insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContentRecord>, sqlx::Error> {
        Ok(self.record(id))
    }

    async fn commit_raw_key(
        &self,
        id: Uuid,
        raw_key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
        let previous = record.object_key.replace(raw_key.to_string());
        self.write(record, MediaStatus::Raw);
        Ok(previous)
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_key: &str,
        status: MediaStatus,
    ) -> Result<bool, sqlx::Error> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&id) {
            Some(record) if record.object_key.as_deref() == Some(expected_key) => {
                self.write(record, status);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_final_key(
        &self,
        id: Uuid,
        raw_key: &str,
        output_key: &str,
    ) -> Result<Option<ContentRecord>, sqlx::Error> {
        if self.fail_next_final_commit.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&id) {
            Some(record) if record.object_key.as_deref() == Some(raw_key) => {
                record.object_key = Some(output_key.to_string());
                self.write(record, MediaStatus::Final);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }
}

// --- transcoder ---

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Succeed,
    Fail(RpcCode),
    Timeout,
}

type ReplyHook = Box<dyn Fn() + Send + Sync>;

/// Answers conversion calls from a script and records every request.
pub struct ScriptedTranscoder {
    outcome: Mutex<Outcome>,
    requests: Mutex<Vec<ConversionRequest>>,
    hook: Mutex<Option<ReplyHook>>,
    worker: Mutex<Option<TranscodePipeline>>,
}

impl ScriptedTranscoder {
    fn with(outcome: Outcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            requests: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Replies with the playlist key the worker would derive.
    pub fn succeeding() -> Self {
        Self::with(Outcome::Succeed)
    }

    pub fn failing(code: RpcCode) -> Self {
        Self::with(Outcome::Fail(code))
    }

    pub fn timing_out() -> Self {
        Self::with(Outcome::Timeout)
    }

    pub fn succeed_from_now(&self) {
        *self.outcome.lock().unwrap() = Outcome::Succeed;
    }

    /// Runs `hook` after the request is received and before the reply.
    pub fn before_reply(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Runs every request through `pipeline` before the scripted outcome is
    /// applied, so a timeout still leaves the worker's output behind.
    pub fn run_through(&self, pipeline: TranscodePipeline) {
        *self.worker.lock().unwrap() = Some(pipeline);
    }

    pub fn requests(&self) -> Vec<ConversionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn convert(&self, request: ConversionRequest) -> Result<ConversionResponse, RpcError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook();
        }

        let worker = self.worker.lock().unwrap().clone();
        let published = match worker {
            Some(pipeline) => Some(
                pipeline
                    .run(TranscodeJob {
                        source_key: request.key.clone(),
                        media_type: MediaType::from_audio_flag(request.is_audio_file),
                    })
                    .await
                    .map_err(|e| RpcError::Status(e.to_status())),
            ),
            None => None,
        };

        let outcome = *self.outcome.lock().unwrap();
        match (outcome, published) {
            (Outcome::Succeed, Some(result)) => result.map(|key| ConversionResponse { key }),
            (Outcome::Succeed, None) => {
                let hls = HlsKeys::derive(&request.key).ok_or_else(|| {
                    RpcError::Status(RpcStatus::invalid_argument("invalid source key"))
                })?;
                Ok(ConversionResponse { key: hls.playlist })
            }
            (Outcome::Fail(code), _) => {
                Err(RpcError::Status(RpcStatus::new(code, "scripted failure")))
            }
            (Outcome::Timeout, _) => Err(RpcError::Timeout(Duration::from_secs(300))),
        }
    }
}

// --- identity ---

#[derive(Default)]
pub struct StaticIdentity {
    tokens: Mutex<HashMap<String, AuthPrincipal>>,
}

impl StaticIdentity {
    pub fn register(&self, token: &str, principal: AuthPrincipal) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), principal);
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self, token: &str) -> Result<AuthPrincipal, IdentityError> {
        self.tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(IdentityError::Unauthenticated)
    }
}

// --- wiring ---

/// An [`AppState`] over in-memory doubles, with handles to each of them.
pub struct TestApp {
    pub state: AppState,
    pub storage: Arc<MemoryStorage>,
    pub contents: Arc<MemoryContentStore>,
    pub transcoder: Arc<ScriptedTranscoder>,
    pub identity: Arc<StaticIdentity>,
    cleanup: CleanupQueue,
    worker: CleanupWorker,
}

impl TestApp {
    pub fn new(transcoder: ScriptedTranscoder) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let contents = Arc::new(MemoryContentStore::new());
        let transcoder = Arc::new(transcoder);
        let identity = Arc::new(StaticIdentity::default());
        let (cleanup, worker) = CleanupQueue::start(storage.clone(), 64);

        let state = AppState::new(
            MediaSettings {
                bucket: TEST_BUCKET.to_string(),
                upload_url_expiry: Duration::from_secs(900),
            },
            contents.clone(),
            storage.clone(),
            transcoder.clone(),
            identity.clone(),
            cleanup.clone(),
        );

        Self {
            state,
            storage,
            contents,
            transcoder,
            identity,
            cleanup,
            worker,
        }
    }

    /// Drains pending cleanup and hands back the storage for assertions.
    pub async fn settle(self) -> Arc<MemoryStorage> {
        self.cleanup.close();
        self.worker.drained().await;
        self.storage
    }
}
