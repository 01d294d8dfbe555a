use serde::Deserialize;
use serde::Serialize;

/// The struct used for storing session snapshots on disk. Each snapshot is a
/// cumulative pair of active/idle hour totals for the day it was taken in,
/// stamped with the local wall-clock time of the save. Records are immutable
/// once written and only ever appended.
#[derive(PartialEq, PartialOrd, Debug, Serialize, Deserialize, Clone)]
pub struct SessionEntity {
    /// Local date-time of the snapshot, `%Y-%m-%d %H:%M:%S`. Lexicographic
    /// order of this field matches chronological order.
    pub date: String,
    /// Accumulated active hours, rounded to 2 decimal places.
    pub active_hours: f64,
    /// Accumulated idle hours, rounded to 2 decimal places.
    pub idle_hours: f64,
}

impl SessionEntity {
    pub fn new(date: String, active_hours: f64, idle_hours: f64) -> Self {
        Self {
            date,
            active_hours,
            idle_hours,
        }
    }

    /// The `%Y-%m-%d` prefix of the snapshot date.
    pub fn day_prefix(&self) -> &str {
        &self.date[..self.date.len().min(10)]
    }
}
