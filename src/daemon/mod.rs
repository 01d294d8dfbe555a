use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Local};
use collection::{collector::ActivityCollectionModule, idle::IdleEvaluator, state::ActivityState};
use config::TrackerConfig;
use processing::{local_save::LocalSaver, ProcessingModule};
use storage::{
    entities::SessionEntity,
    session_store::{JsonSessionStore, SessionStore},
};
use sync::{
    client::{HttpSyncClient, SyncClient},
    retry::RetrySyncModule,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    idle_api::{GenericIdleMonitor, IdleMonitor},
    utils::{
        clock::{Clock, DefaultClock},
        time::{day_prefix, hours_to_duration},
    },
};

pub mod args;
pub mod collection;
pub mod config;
pub mod processing;
pub mod shutdown;
pub mod storage;
pub mod sync;

const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config: TrackerConfig) -> Result<()> {
    std::env::set_current_dir("/")?;

    let store: Arc<dyn SessionStore> = Arc::new(JsonSessionStore::new(dir.join("sessions"))?);
    store.initialize().await?;

    let client: Option<Arc<dyn SyncClient>> = config.server.as_ref().map(|server| {
        Arc::new(HttpSyncClient::new(
            server.url.clone(),
            server.username.clone(),
        )) as Arc<dyn SyncClient>
    });

    let state = recover_state(client.as_deref(), store.as_ref(), DefaultClock.time()).await;

    let monitor = GenericIdleMonitor::new()?;

    let (sender, receiver) = mpsc::channel::<SessionEntity>(10);
    let shutdown_token = CancellationToken::new();

    let collector = create_collector(
        sender,
        Box::new(monitor),
        &shutdown_token,
        &config,
        state,
        DefaultClock,
    );

    let processor = ProcessingModule::new(receiver, LocalSaver::new(store.clone(), client.clone()));

    let retry = client.map(|client| {
        RetrySyncModule::new(
            store.clone(),
            client,
            shutdown_token.clone(),
            Duration::from_secs(config.tracker.retry_interval_secs),
            Box::new(DefaultClock),
        )
    });

    let (_, collection_result, processing_result, retry_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        collector.run(),
        processor.run(),
        async {
            match retry {
                Some(module) => module.run().await,
                None => Ok(()),
            }
        },
    );

    if let Err(collection_result) = collection_result {
        error!("Collection module got an error {:?}", collection_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    if let Err(retry_result) = retry_result {
        error!("Retry module got an error {:?}", retry_result);
    }

    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<SessionEntity>,
    monitor: Box<dyn IdleMonitor>,
    shutdown_token: &CancellationToken,
    config: &TrackerConfig,
    state: ActivityState,
    clock: impl Clock,
) -> ActivityCollectionModule {
    ActivityCollectionModule::new(
        sender,
        monitor,
        shutdown_token.clone(),
        IdleEvaluator::from_seconds(config.tracker.idle_threshold_secs),
        state,
        DEFAULT_SAMPLE_INTERVAL,
        Duration::from_secs(config.tracker.autosave_interval_secs),
        Box::new(clock),
    )
}

/// Startup recovery. The server's "today" record is authoritative when it
/// exists; otherwise the latest today-dated entry of the local log seeds the
/// totals; otherwise the day starts at zero. Every failure along the way
/// falls through to the next step — recovery never blocks startup.
async fn recover_state(
    client: Option<&dyn SyncClient>,
    store: &dyn SessionStore,
    now: DateTime<Local>,
) -> ActivityState {
    if let Some(client) = client {
        if let Some(remote) = client.fetch_today_session().await {
            info!("Recovered today's totals from the server");
            return ActivityState::with_totals(
                now,
                hours_to_duration(remote.active_time),
                hours_to_duration(remote.idle_time),
            );
        }
    }

    match store.list_sessions().await {
        Ok(sessions) => {
            let today = day_prefix(now.date_naive());
            if let Some(last) = sessions
                .iter()
                .filter(|s| s.day_prefix() == today)
                .max_by(|a, b| a.date.cmp(&b.date))
            {
                info!("Recovered today's totals from the local log ({})", last.date);
                return ActivityState::with_totals(
                    now,
                    hours_to_duration(last.active_hours),
                    hours_to_duration(last.idle_hours),
                );
            }
        }
        Err(e) => {
            warn!("Couldn't read the session log during recovery {e:?}");
        }
    }

    ActivityState::new(now)
}

#[cfg(test)]
mod daemon_tests {
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use tempfile::tempdir;
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            storage::session_store::SESSIONS_FILE,
            sync::client::{MockSyncClient, TimeSessionDto},
        },
        idle_api::MockIdleMonitor,
        utils::logging::TEST_LOGGING,
    };

    use super::*;

    fn test_start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2018, 7, 4, 12, 0, 0).unwrap()
    }

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Local>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Local> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: tokio::time::Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    fn session(date: &str, active: f64, idle: f64) -> SessionEntity {
        SessionEntity::new(date.into(), active, idle)
    }

    /// Very simple smoke test to check that the tracking pipeline saves
    /// snapshots end to end.
    #[tokio::test]
    async fn smoke_test_daemon_pipeline() -> Result<()> {
        *TEST_LOGGING;
        let mut monitor = MockIdleMonitor::new();
        monitor.expect_idle_time_ms().returning(|| Ok(0));

        let shutdown_token = CancellationToken::new();
        let (sender, receiver) = mpsc::channel::<SessionEntity>(10);
        let test_clock = TestClock {
            start_time: test_start(),
            reference: Instant::now(),
        };

        let collector = ActivityCollectionModule::new(
            sender,
            Box::new(monitor),
            shutdown_token.clone(),
            IdleEvaluator::from_seconds(10),
            ActivityState::new(test_clock.time()),
            Duration::from_millis(50),
            Duration::from_millis(120),
            Box::new(test_clock.clone()),
        );

        let dir = tempdir()?;
        let store = Arc::new(JsonSessionStore::new(dir.path().to_path_buf())?);
        let processor = ProcessingModule::new(receiver, LocalSaver::new(store.clone(), None));

        let (_, collection_result, processing_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(400)).await;
                shutdown_token.cancel()
            },
            collector.run(),
            processor.run(),
        );

        collection_result?;
        processing_result?;

        let sessions = store.list_sessions().await?;
        assert!(sessions.len() >= 2, "expected snapshots, got {sessions:?}");
        assert!(sessions.iter().all(|s| s.date.starts_with("2018-07-04")));
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_prefers_remote_record() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_path_buf())?;
        let now = test_start();
        store
            .append_session(session("2018-07-04 09:00:00", 0.25, 0.25))
            .await?;

        let mut client = MockSyncClient::new();
        client.expect_fetch_today_session().returning(|| {
            Some(TimeSessionDto {
                username: "user1".into(),
                date: "2018-07-04 11:00:00".into(),
                active_time: 3.5,
                idle_time: 1.0,
            })
        });

        let state = recover_state(Some(&client as &dyn SyncClient), &store, now).await;

        assert_eq!(state.total_active(), ChronoDuration::minutes(210));
        assert_eq!(state.total_idle(), ChronoDuration::minutes(60));
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_picks_latest_local_entry_for_today() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_path_buf())?;
        let now = test_start();
        store
            .append_session(session("2018-07-03 23:00:00", 7.0, 2.0))
            .await?;
        store
            .append_session(session("2018-07-04 09:00:00", 0.5, 0.25))
            .await?;
        store
            .append_session(session("2018-07-04 10:00:00", 1.5, 0.25))
            .await?;

        let mut client = MockSyncClient::new();
        client.expect_fetch_today_session().returning(|| None);

        let state = recover_state(Some(&client as &dyn SyncClient), &store, now).await;

        assert_eq!(state.total_active(), ChronoDuration::minutes(90));
        assert_eq!(state.total_idle(), ChronoDuration::minutes(15));
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_starts_at_zero_without_data() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonSessionStore::new(dir.path().to_path_buf())?;
        store
            .append_session(session("2018-07-03 23:00:00", 7.0, 2.0))
            .await?;

        let state = recover_state(None, &store, test_start()).await;

        assert_eq!(state.total_active(), ChronoDuration::zero());
        assert_eq!(state.total_idle(), ChronoDuration::zero());
        assert!(!state.is_idle());
        Ok(())
    }

    #[tokio::test]
    async fn test_recovery_swallows_store_errors() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(SESSIONS_FILE), "{ not a log")?;
        let store = JsonSessionStore::new(dir.path().to_path_buf())?;

        let state = recover_state(None, &store, test_start()).await;

        assert_eq!(state.total_active(), ChronoDuration::zero());
        assert_eq!(state.total_idle(), ChronoDuration::zero());
        Ok(())
    }
}
