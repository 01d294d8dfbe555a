use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    daemon::storage::entities::SessionEntity, idle_api::IdleMonitor, utils::clock::Clock,
};

use super::{
    idle::IdleEvaluator,
    state::{ActivityState, Transition},
};

/// Owns the activity state and drives the tracking cadences: the 1-second
/// idle sample, the 1-second real-time tick, and the autosave tick that
/// emits a cumulative snapshot towards the processing module.
pub struct ActivityCollectionModule {
    next: mpsc::Sender<SessionEntity>,
    monitor: Box<dyn IdleMonitor>,
    shutdown: CancellationToken,
    evaluator: IdleEvaluator,
    state: ActivityState,
    sample_frequency: Duration,
    autosave_frequency: Duration,
    clock: Box<dyn Clock>,
}

impl ActivityCollectionModule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        next: mpsc::Sender<SessionEntity>,
        monitor: Box<dyn IdleMonitor>,
        shutdown: CancellationToken,
        evaluator: IdleEvaluator,
        state: ActivityState,
        sample_frequency: Duration,
        autosave_frequency: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            monitor,
            shutdown,
            evaluator,
            state,
            sample_frequency,
            autosave_frequency,
            clock,
        }
    }

    fn on_sample(&mut self) {
        let now = self.clock.time();
        match self.monitor.idle_time_ms() {
            Ok(idle_ms) => {
                let idle = self.evaluator.is_idle(idle_ms);
                match self.state.observe_sample(idle, now) {
                    Some(Transition::WentIdle) => info!("User went idle"),
                    Some(Transition::BecameActive) => info!("User is active again"),
                    None => {}
                }
            }
            Err(e) => {
                error!("Encountered an error during idle sampling {e:?}")
            }
        }
    }

    fn on_realtime_tick(&mut self) {
        let now = self.clock.time();
        let live = self.state.tick(now);
        if self.state.roll_day_if_needed(now) {
            info!("New day {}, totals reset", self.state.current_date());
        }
        debug!(
            "{} for {}s, totals: {}m active, {}m idle",
            if self.state.is_idle() { "idle" } else { "active" },
            live.num_seconds(),
            self.state.total_active().num_minutes(),
            self.state.total_idle().num_minutes(),
        );
    }

    async fn dispatch_snapshot(&mut self) -> Result<()> {
        let snapshot = self.state.snapshot(self.clock.time());
        debug!("Sending snapshot {:?}", snapshot);
        self.next
            .send(snapshot)
            .await
            .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        Ok(())
    }

    /// Executes the collection event loop. The three cadences keep
    /// independent deadlines but share one task, so their handlers
    /// interleave and never run concurrently.
    pub async fn run(mut self) -> Result<()> {
        let start = self.clock.instant();
        let mut sample_point = start + self.sample_frequency;
        let mut display_point = start + self.sample_frequency;
        let mut autosave_point = start + self.autosave_frequency;
        loop {
            let wake_point = sample_point.min(display_point).min(autosave_point);
            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which
                // means we also drop the sender channel and consequently stop
                // the processing module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(wake_point) => ()
            }

            let reached = self.clock.instant();
            if reached >= sample_point {
                sample_point += self.sample_frequency;
                self.on_sample();
            }
            if reached >= display_point {
                display_point += self.sample_frequency;
                self.on_realtime_tick();
            }
            if reached >= autosave_point {
                autosave_point += self.autosave_frequency;
                self.dispatch_snapshot().await?;
            }
        }
    }
}
