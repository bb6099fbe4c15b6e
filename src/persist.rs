//! Background snapshot writes.
//!
//! Saves run on the blocking pool so a slow disk never stalls channel tasks.
//! Each save waits for the one before it, and a save that has been superseded
//! by a newer request is skipped, so the file always ends at the latest state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use session_store::{SessionSnapshot, SnapshotStore};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub(crate) struct SnapshotWriter {
    store: SnapshotStore,
    generation: u64,
    latest: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    pub(crate) fn new(store: SnapshotStore) -> Self {
        Self {
            store,
            generation: 0,
            latest: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    /// Queues `snapshot` for writing. Outside a runtime it is written inline.
    pub(crate) fn save(&mut self, snapshot: SessionSnapshot) {
        let Ok(handle) = Handle::try_current() else {
            write(&self.store, &snapshot);
            return;
        };

        self.generation += 1;
        self.latest.store(self.generation, Ordering::Release);
        let task = QueuedSave {
            store: self.store.clone(),
            snapshot,
            generation: self.generation,
            latest: Arc::clone(&self.latest),
            previous: self.pending.take(),
        };
        self.pending = Some(handle.spawn(task.run()));
    }

    /// Waits until every queued save has finished.
    pub(crate) async fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Err(error) = pending.await {
                tracing::warn!(%error, "session snapshot writer stopped");
            }
        }
    }
}

struct QueuedSave {
    store: SnapshotStore,
    snapshot: SessionSnapshot,
    generation: u64,
    latest: Arc<AtomicU64>,
    previous: Option<JoinHandle<()>>,
}

impl QueuedSave {
    async fn run(self) {
        if let Some(previous) = self.previous {
            let _ = previous.await;
        }
        if self.latest.load(Ordering::Acquire) != self.generation {
            return;
        }

        let store = self.store;
        let snapshot = self.snapshot;
        if let Err(error) = tokio::task::spawn_blocking(move || write(&store, &snapshot)).await {
            tracing::warn!(%error, "session snapshot write panicked");
        }
    }
}

fn write(store: &SnapshotStore, snapshot: &SessionSnapshot) {
    if let Err(error) = store.save(snapshot) {
        tracing::warn!(%error, path = %store.path().display(), "failed to save session snapshot");
    }
}
