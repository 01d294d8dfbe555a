use anyhow::Result;
use module::SnapshotProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use super::storage::entities::SessionEntity;

pub mod local_save;
pub mod module;

/// Receives snapshots from the collector and hands them to a processor. A
/// failed snapshot is logged and dropped; the next autosave carries the same
/// cumulative totals anyway.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<SessionEntity>,
    processor: Processor,
}

impl<P: SnapshotProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<SessionEntity>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(snapshot) = self.receiver.recv().await {
            debug!("Processing snapshot {:?}", snapshot);
            match self.processor.process_next(snapshot.clone()).await {
                Ok(_) => {
                    info!("Processed snapshot {:?}", snapshot)
                }
                Err(e) => {
                    error!("Error processing snapshot {:?}: {e:?}", snapshot)
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}
