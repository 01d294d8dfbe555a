use anyhow::Result;

use crate::daemon::storage::entities::SessionEntity;

/// Represents a snapshot processor. This abstracts what happens to a
/// snapshot once the collector emits it: local persistence, remote sync, or
/// both.
pub trait SnapshotProcessor {
    fn process_next(
        &mut self,
        snapshot: SessionEntity,
    ) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
