use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::daemon::storage::entities::SessionEntity;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to reach the sync server")]
    Transport(#[from] reqwest::Error),
    #[error("sync server answered with status {0}")]
    Status(StatusCode),
}

/// The wire shape of a session, shared by push and fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeSessionDto {
    pub username: String,
    pub date: String,
    pub active_time: f64,
    pub idle_time: f64,
}

impl TimeSessionDto {
    pub fn from_session(username: &str, entry: &SessionEntity) -> Self {
        Self {
            username: username.to_owned(),
            date: entry.date.clone(),
            active_time: entry.active_hours,
            idle_time: entry.idle_hours,
        }
    }
}

/// Contract for pushing snapshots to the remote server and fetching the
/// authoritative "today" record on startup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Sends one snapshot. Succeeds only on a 2xx response; every other
    /// outcome is an error for the caller to queue for retry. Never retries
    /// internally.
    async fn push_session(&self, entry: &SessionEntity) -> Result<(), SyncError>;

    /// Today's snapshot for the configured user, or `None`. Network errors,
    /// non-2xx statuses and unparseable bodies all read as absence of data.
    async fn fetch_today_session(&self) -> Option<TimeSessionDto>;
}

pub struct HttpSyncClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
}

impl HttpSyncClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            username: username.into(),
        }
    }

    async fn try_fetch_today(&self) -> Result<TimeSessionDto, SyncError> {
        let response = self
            .http
            .get(format!("{}/api/timesessions/today", self.base_url))
            .query(&[("username", self.username.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SyncClient for HttpSyncClient {
    #[instrument(skip(self, entry), fields(date = %entry.date))]
    async fn push_session(&self, entry: &SessionEntity) -> Result<(), SyncError> {
        let body = TimeSessionDto::from_session(&self.username, entry);
        let response = self
            .http
            .post(format!("{}/api/timesessions", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Sync server rejected the session with status {status}");
            return Err(SyncError::Status(status));
        }
        debug!("Session synced");
        Ok(())
    }

    async fn fetch_today_session(&self) -> Option<TimeSessionDto> {
        match self.try_fetch_today().await {
            Ok(session) => Some(session),
            Err(e) => {
                // Treated as "no remote data"; the caller falls back to the
                // local log.
                debug!("No remote session for today: {e}");
                None
            }
        }
    }
}
