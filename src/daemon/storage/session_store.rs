use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

use super::entities::SessionEntity;

pub const SESSIONS_FILE: &str = "sessions.json";
pub const RETRY_QUEUE_FILE: &str = "retry_queue.json";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access session log {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session log {path} holds corrupt data")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_owned(),
        source,
    }
}

/// Interface for abstracting storage of session snapshots. Two independent
/// append-only logs: the main session log and the retry queue of snapshots
/// whose remote sync failed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates empty logs when absent. Idempotent, never truncates an
    /// existing log.
    async fn initialize(&self) -> Result<(), PersistenceError>;

    async fn append_session(&self, entry: SessionEntity) -> Result<(), PersistenceError>;

    /// All entries in file order, oldest first.
    async fn list_sessions(&self) -> Result<Vec<SessionEntity>, PersistenceError>;

    async fn enqueue_retry(&self, entry: SessionEntity) -> Result<(), PersistenceError>;

    async fn list_retry_queue(&self) -> Result<Vec<SessionEntity>, PersistenceError>;

    /// Removes the first entry that is structurally equal to `entry`. Absence
    /// of a match is a no-op, not an error.
    async fn remove_retry_entry(&self, entry: &SessionEntity) -> Result<(), PersistenceError>;
}

/// The main realization of [SessionStore]. Each log is a JSON document whose
/// root is an array of [SessionEntity]. Every operation loads the full
/// document and rewrites it under an exclusive advisory lock; there is no
/// fsync or journal, so a crash mid-write can still lose the tail.
pub struct JsonSessionStore {
    sessions_path: PathBuf,
    retry_path: PathBuf,
}

impl JsonSessionStore {
    pub fn new(log_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&log_dir)?;

        Ok(Self {
            sessions_path: log_dir.join(SESSIONS_FILE),
            retry_path: log_dir.join(RETRY_QUEUE_FILE),
        })
    }

    async fn create_empty(path: &Path) -> Result<(), PersistenceError> {
        match File::options().write(true).create_new(true).open(path).await {
            Ok(mut file) => {
                file.write_all(b"[]\n").await.map_err(io_error(path))?;
                file.flush().await.map_err(io_error(path))?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(io_error(path)(e)),
        }
    }

    fn parse_document(path: &Path, contents: &str) -> Result<Vec<SessionEntity>, PersistenceError> {
        // An empty file reads as an empty log. Might be left behind by a
        // shutdown cutting off the rewrite.
        if contents.trim().is_empty() {
            return Ok(vec![]);
        }
        serde_json::from_str(contents).map_err(|source| PersistenceError::Corrupt {
            path: path.to_owned(),
            source,
        })
    }

    async fn load(path: &Path) -> Result<Vec<SessionEntity>, PersistenceError> {
        debug!("Loading log {path:?}");
        let mut file = match File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_error(path)(e)),
        };
        file.lock_shared().map_err(io_error(path))?;
        let mut contents = String::new();
        let read = file.read_to_string(&mut contents).await;
        file.unlock_async().await.map_err(io_error(path))?;
        read.map_err(io_error(path))?;

        Self::parse_document(path, &contents)
    }

    /// Load full document, mutate, save full document. The exclusive lock
    /// spans the whole read-modify-write.
    async fn update(
        path: &Path,
        mutate: impl FnOnce(&mut Vec<SessionEntity>) + Send,
    ) -> Result<(), PersistenceError> {
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await
            .map_err(io_error(path))?;
        file.lock_exclusive().map_err(io_error(path))?;
        let result = Self::update_locked(path, &mut file, mutate).await;
        file.unlock_async().await.map_err(io_error(path))?;
        result
    }

    async fn update_locked(
        path: &Path,
        file: &mut File,
        mutate: impl FnOnce(&mut Vec<SessionEntity>),
    ) -> Result<(), PersistenceError> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .await
            .map_err(io_error(path))?;
        let mut entries = Self::parse_document(path, &contents)?;

        mutate(&mut entries);

        let mut buffer =
            serde_json::to_vec_pretty(&entries).map_err(|source| PersistenceError::Corrupt {
                path: path.to_owned(),
                source,
            })?;
        buffer.push(b'\n');

        file.rewind().await.map_err(io_error(path))?;
        file.set_len(0).await.map_err(io_error(path))?;
        file.write_all(&buffer).await.map_err(io_error(path))?;
        file.flush().await.map_err(io_error(path))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn initialize(&self) -> Result<(), PersistenceError> {
        Self::create_empty(&self.sessions_path).await?;
        Self::create_empty(&self.retry_path).await?;
        Ok(())
    }

    async fn append_session(&self, entry: SessionEntity) -> Result<(), PersistenceError> {
        debug!("Appending session {entry:?}");
        Self::update(&self.sessions_path, |entries| entries.push(entry)).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionEntity>, PersistenceError> {
        Self::load(&self.sessions_path).await
    }

    async fn enqueue_retry(&self, entry: SessionEntity) -> Result<(), PersistenceError> {
        debug!("Enqueueing failed sync {entry:?}");
        Self::update(&self.retry_path, |entries| entries.push(entry)).await
    }

    async fn list_retry_queue(&self) -> Result<Vec<SessionEntity>, PersistenceError> {
        Self::load(&self.retry_path).await
    }

    async fn remove_retry_entry(&self, entry: &SessionEntity) -> Result<(), PersistenceError> {
        Self::update(&self.retry_path, |entries| {
            if let Some(position) = entries.iter().position(|e| e == entry) {
                entries.remove(position);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;

    fn entry(date: &str, active: f64, idle: f64) -> SessionEntity {
        SessionEntity::new(date.into(), active, idle)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_owned())?;
        store.initialize().await?;
        store.initialize().await?;

        assert_eq!(store.list_sessions().await?, vec![]);
        assert_eq!(store.list_retry_queue().await?, vec![]);
        Ok(())
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_log() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_owned())?;
        store.initialize().await?;
        store
            .append_session(entry("2024-01-01 09:00:00", 1.0, 0.5))
            .await?;

        store.initialize().await?;

        assert_eq!(
            store.list_sessions().await?,
            vec![entry("2024-01-01 09:00:00", 1.0, 0.5)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_append_then_list_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_owned())?;
        store.initialize().await?;

        store
            .append_session(entry("2024-01-01 09:00:00", 0.5, 0.25))
            .await?;
        store
            .append_session(entry("2024-01-01 10:00:00", 1.5, 0.25))
            .await?;

        // Reload through a fresh store instance to prove the data survives.
        let reloaded = JsonSessionStore::new(dir.path().to_owned())?;
        let sessions = reloaded.list_sessions().await?;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions.last(), Some(&entry("2024-01-01 10:00:00", 1.5, 0.25)));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_log_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_owned())?;

        assert_eq!(store.list_sessions().await?, vec![]);
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_queue_enqueue_and_remove() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_owned())?;
        store.initialize().await?;

        let first = entry("2024-01-01 09:00:00", 1.0, 0.5);
        let second = entry("2024-01-01 10:00:00", 2.0, 0.5);
        store.enqueue_retry(first.clone()).await?;
        store.enqueue_retry(second.clone()).await?;

        store.remove_retry_entry(&first).await?;
        assert_eq!(store.list_retry_queue().await?, vec![second.clone()]);

        // Removing an entry that is no longer queued is a no-op.
        store.remove_retry_entry(&first).await?;
        assert_eq!(store.list_retry_queue().await?, vec![second]);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_matches_structural_equality() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_owned())?;
        store.initialize().await?;

        let queued = entry("2024-01-01 09:00:00", 1.0, 0.5);
        store.enqueue_retry(queued.clone()).await?;

        // Same date, different totals: must not match.
        store
            .remove_retry_entry(&entry("2024-01-01 09:00:00", 1.0, 0.75))
            .await?;
        assert_eq!(store.list_retry_queue().await?, vec![queued]);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_log_surfaces_error() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(SESSIONS_FILE), "{ not a session log")?;
        let store = JsonSessionStore::new(dir.path().to_owned())?;

        let listed = store.list_sessions().await;
        assert!(matches!(listed, Err(PersistenceError::Corrupt { .. })));

        let appended = store
            .append_session(entry("2024-01-01 09:00:00", 1.0, 0.5))
            .await;
        assert!(matches!(appended, Err(PersistenceError::Corrupt { .. })));
        Ok(())
    }
}
