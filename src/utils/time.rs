use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Format used for session dates in the local log and on the wire.
/// Lexicographic order of these strings matches chronological order.
pub const SESSION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DAY_PREFIX_FORMAT: &str = "%Y-%m-%d";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

pub fn format_session_date(moment: DateTime<Local>) -> String {
    moment.format(SESSION_DATE_FORMAT).to_string()
}

pub fn parse_session_date(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, SESSION_DATE_FORMAT)
}

/// This is the standard way of converting a date to its session-log prefix.
pub fn day_prefix(date: NaiveDate) -> String {
    date.format(DAY_PREFIX_FORMAT).to_string()
}

/// Converts an accumulated duration to hours rounded to 2 decimal places,
/// which is the precision session records are stored with.
pub fn duration_to_hours(duration: Duration) -> f64 {
    (duration.num_milliseconds() as f64 / MILLIS_PER_HOUR * 100.0).round() / 100.0
}

pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * MILLIS_PER_HOUR).round() as i64)
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    #[test]
    fn test_session_date_round_trip() {
        let parsed = parse_session_date("2024-01-01 09:30:15").unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 30, 15)
                .unwrap()
        );
        assert!(parse_session_date("01/01/2024 09:30").is_err());
    }

    #[test]
    fn test_hour_rounding() {
        assert_eq!(duration_to_hours(Duration::minutes(90)), 1.5);
        // 10 seconds is 0.00277... hours and should collapse to two decimals
        assert_eq!(duration_to_hours(Duration::seconds(10)), 0.0);
        assert_eq!(duration_to_hours(Duration::minutes(10)), 0.17);
        assert_eq!(hours_to_duration(3.5), Duration::minutes(210));
    }

    #[test]
    fn test_next_day_start() {
        let moment = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        assert_eq!(
            next_day_start(moment),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
    }
}
