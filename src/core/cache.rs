use crate::core::models::Snapshot;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Holds the one snapshot currently served to readers.
///
/// Shared by `Arc` between the updater, which is the only writer, and the HTTP
/// handlers. A snapshot is swapped as a whole, so a reader always sees the
/// timestamp and the records of the same update.
#[derive(Default)]
pub struct SnapshotCache {
    inner: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Option<Arc<Snapshot>> {
        let current = self.inner.read().await.clone();
        if current.is_none() {
            debug!("Snapshot cache is empty");
        }
        current
    }

    pub async fn set(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        let mut current = self.inner.write().await;
        debug!(
            update_id = snapshot.update.id,
            currencies = snapshot.currencies.len(),
            "Snapshot cache SET"
        );
        *current = Some(snapshot);
    }
}
