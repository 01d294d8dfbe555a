use std::{sync::Arc, time::Duration};

use anyhow::Result;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{daemon::storage::session_store::SessionStore, utils::clock::Clock};

use super::client::SyncClient;

/// Periodically re-attempts snapshots whose sync failed. Entries are retried
/// on every cycle until a push succeeds, with no backoff and no attempt
/// cutoff: the queue trades bounded retry cost for eventual consistency.
pub struct RetrySyncModule {
    store: Arc<dyn SessionStore>,
    client: Arc<dyn SyncClient>,
    shutdown: CancellationToken,
    retry_frequency: Duration,
    clock: Box<dyn Clock>,
}

impl RetrySyncModule {
    pub fn new(
        store: Arc<dyn SessionStore>,
        client: Arc<dyn SyncClient>,
        shutdown: CancellationToken,
        retry_frequency: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            store,
            client,
            shutdown,
            retry_frequency,
            clock,
        }
    }

    async fn retry_cycle(&self) {
        let queue = match self.store.list_retry_queue().await {
            Ok(queue) => queue,
            Err(e) => {
                error!("Can't read the retry queue {e:?}");
                return;
            }
        };
        if queue.is_empty() {
            return;
        }
        debug!("Retrying {} queued sessions", queue.len());

        // Each entry is attempted independently; a failure just leaves the
        // entry in place for the next cycle.
        join_all(queue.into_iter().map(|entry| {
            let store = self.store.clone();
            let client = self.client.clone();
            async move {
                match client.push_session(&entry).await {
                    Ok(()) => match store.remove_retry_entry(&entry).await {
                        Ok(()) => info!("Retried sync for session {} succeeded", entry.date),
                        Err(e) => {
                            error!("Failed to drop synced session from the queue {e:?}")
                        }
                    },
                    Err(e) => warn!("Retry for session {} failed again: {e}", entry.date),
                }
            }
        }))
        .await;
    }

    /// Executes the retry event loop.
    pub async fn run(self) -> Result<()> {
        let mut retry_point = self.clock.instant() + self.retry_frequency;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(retry_point) => {
                    retry_point += self.retry_frequency;
                    self.retry_cycle().await;
                }
            }
        }
    }
}
