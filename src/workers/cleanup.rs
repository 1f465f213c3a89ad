//! Best-effort background cleanup.
//!
//! Retiring source objects and removing scratch directories never blocks a
//! response. Tasks go onto a bounded channel drained by one dedicated task;
//! failures are logged and dropped. A full queue drops the task with a warning
//! and bumps a counter, so the orphan rate stays bounded and visible.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::infrastructure::storage::ObjectStore;

pub enum CleanupTask {
    DeleteObject { bucket: String, key: String },
    RemoveScratch(TempDir),
}

impl std::fmt::Debug for CleanupTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanupTask::DeleteObject { bucket, key } => f
                .debug_struct("DeleteObject")
                .field("bucket", bucket)
                .field("key", key)
                .finish(),
            CleanupTask::RemoveScratch(dir) => {
                f.debug_tuple("RemoveScratch").field(&dir.path()).finish()
            }
        }
    }
}

#[derive(Clone)]
pub struct CleanupQueue {
    sender: async_channel::Sender<CleanupTask>,
    dropped: Arc<AtomicU64>,
}

pub struct CleanupWorker {
    handle: JoinHandle<()>,
}

impl CleanupQueue {
    /// Creates the queue and spawns its consumer.
    pub fn start(storage: Arc<dyn ObjectStore>, capacity: usize) -> (Self, CleanupWorker) {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        let handle = tokio::spawn(run_cleanup(storage, receiver));

        (
            Self {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            CleanupWorker { handle },
        )
    }

    pub fn enqueue(&self, task: CleanupTask) {
        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(async_channel::TrySendError::Full(task)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(?task, dropped_total = dropped, "Cleanup queue full, dropping task");
            }
            Err(async_channel::TrySendError::Closed(task)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(?task, dropped_total = dropped, "Cleanup queue closed, dropping task");
            }
        }
    }

    pub fn delete_object(&self, bucket: &str, key: &str) {
        self.enqueue(CleanupTask::DeleteObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
    }

    pub fn remove_scratch(&self, dir: TempDir) {
        self.enqueue(CleanupTask::RemoveScratch(dir));
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting work. Queued tasks are still drained by the worker.
    pub fn close(&self) {
        self.sender.close();
    }
}

impl CleanupWorker {
    /// Waits until every queued task has been processed. Call after
    /// [`CleanupQueue::close`].
    pub async fn drained(self) {
        if let Err(e) = self.handle.await {
            error!("Cleanup worker panicked: {}", e);
        }
    }
}

async fn run_cleanup(storage: Arc<dyn ObjectStore>, receiver: async_channel::Receiver<CleanupTask>) {
    info!("🧹 Cleanup worker started");

    while let Ok(task) = receiver.recv().await {
        match task {
            CleanupTask::DeleteObject { bucket, key } => {
                if let Err(e) = storage.delete(&bucket, &key).await {
                    error!(bucket = %bucket, key = %key, error = %e, "Failed to retire object");
                }
            }
            CleanupTask::RemoveScratch(dir) => {
                let path = dir.path().to_path_buf();
                let result = tokio::task::spawn_blocking(move || dir.close()).await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(path = %path.display(), error = %e, "Failed to remove scratch dir")
                    }
                    Err(e) => error!(path = %path.display(), error = %e, "Scratch removal panicked"),
                }
            }
        }
    }

    info!("🧹 Cleanup worker drained");
}
