use chrono::{DateTime, Duration, Local, NaiveDate};

use crate::{
    daemon::storage::entities::SessionEntity,
    utils::time::{duration_to_hours, format_session_date},
};

/// State change produced by an idle sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentIdle,
    BecameActive,
}

/// In-memory activity totals for the current calendar day.
///
/// The user is in exactly one of two states, Active or Idle, decided by input
/// recency. Elapsed time is attributed to the state it was spent in: the span
/// since `last_activity` is added to the active total when the user goes
/// idle, and to the idle total when input returns. While the user stays
/// active, whole minutes are additionally rolled into the active total on the
/// real-time tick so a crash never loses more than a minute of counted time.
/// Idle time is not quantized that way; it accrues as the real number of
/// elapsed seconds at the transition point. The asymmetry is intentional and
/// matches the recorded behavior this tracker replicates.
///
/// Both totals only grow within a day and reset to zero exactly at the day
/// rollover.
pub struct ActivityState {
    is_idle: bool,
    last_activity: DateTime<Local>,
    total_active: Duration,
    total_idle: Duration,
    current_date: NaiveDate,
}

impl ActivityState {
    /// Fresh state, Active, zero totals.
    pub fn new(now: DateTime<Local>) -> Self {
        Self::with_totals(now, Duration::zero(), Duration::zero())
    }

    /// State seeded with totals recovered from a previous session of the
    /// same day.
    pub fn with_totals(now: DateTime<Local>, total_active: Duration, total_idle: Duration) -> Self {
        Self {
            is_idle: false,
            last_activity: now,
            total_active,
            total_idle,
            current_date: now.date_naive(),
        }
    }

    /// Consumes one idle-duration sample. Returns the transition the sample
    /// caused, if any.
    pub fn observe_sample(&mut self, idle: bool, now: DateTime<Local>) -> Option<Transition> {
        if idle {
            if self.is_idle {
                return None;
            }
            // Stop counting active time at the moment idleness was detected.
            self.total_active += now - self.last_activity;
            self.last_activity = now;
            self.is_idle = true;
            Some(Transition::WentIdle)
        } else {
            if !self.is_idle {
                return None;
            }
            self.total_idle += now - self.last_activity;
            self.last_activity = now;
            self.is_idle = false;
            Some(Transition::BecameActive)
        }
    }

    /// Real-time tick. In the Active state, rolls whole elapsed minutes into
    /// the active total and advances `last_activity` past them. Returns the
    /// remaining elapsed time since `last_activity` for live display.
    pub fn tick(&mut self, now: DateTime<Local>) -> Duration {
        if !self.is_idle {
            let minutes = (now - self.last_activity).num_minutes();
            if minutes >= 1 {
                self.total_active += Duration::minutes(minutes);
                self.last_activity += Duration::minutes(minutes);
            }
        }
        now - self.last_activity
    }

    /// Resets totals when the local calendar date has moved past
    /// `current_date`. Fractional time not yet attributed to either total is
    /// discarded with the old day.
    pub fn roll_day_if_needed(&mut self, now: DateTime<Local>) -> bool {
        if now.date_naive() == self.current_date {
            return false;
        }
        self.current_date = now.date_naive();
        self.total_active = Duration::zero();
        self.total_idle = Duration::zero();
        self.last_activity = now;
        true
    }

    /// A point-in-time session record of the accumulated totals.
    pub fn snapshot(&self, now: DateTime<Local>) -> SessionEntity {
        SessionEntity::new(
            format_session_date(now),
            duration_to_hours(self.total_active),
            duration_to_hours(self.total_idle),
        )
    }

    pub fn is_idle(&self) -> bool {
        self.is_idle
    }

    pub fn total_active(&self) -> Duration {
        self.total_active
    }

    pub fn total_idle(&self) -> Duration {
        self.total_idle
    }

    pub fn current_date(&self) -> NaiveDate {
        self.current_date
    }
}
