use std::sync::Arc;

use anyhow::Result;
use tracing::{error, warn};

use crate::daemon::{
    storage::{entities::SessionEntity, session_store::SessionStore},
    sync::client::SyncClient,
};

use super::module::SnapshotProcessor;

/// Saving module. Appends every snapshot to the local session log and, when
/// sync is configured, dispatches a push that never blocks the processing
/// loop. A failed push parks the snapshot in the retry queue.
pub struct LocalSaver {
    store: Arc<dyn SessionStore>,
    client: Option<Arc<dyn SyncClient>>,
}

impl LocalSaver {
    pub fn new(store: Arc<dyn SessionStore>, client: Option<Arc<dyn SyncClient>>) -> Self {
        Self { store, client }
    }

    fn dispatch_sync(&self, entry: SessionEntity) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let store = self.store.clone();
        // Completion is observed whenever the push resolves; duplicate queue
        // entries from overlapping saves are tolerated and drain through the
        // retry cycle.
        tokio::spawn(async move {
            if let Err(e) = client.push_session(&entry).await {
                warn!("Sync for session {} failed, queueing for retry: {e}", entry.date);
                if let Err(e) = store.enqueue_retry(entry).await {
                    error!("Failed to enqueue session for retry {e:?}");
                }
            }
        });
    }
}

impl SnapshotProcessor for LocalSaver {
    async fn process_next(&mut self, snapshot: SessionEntity) -> Result<()> {
        self.store.append_session(snapshot.clone()).await?;
        self.dispatch_sync(snapshot);
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}
