//! Epoch-millisecond to calendar parts, as the time insert extracts them

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Calendar breakdown of one `start_time`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarParts {
    pub hour: i64,
    pub day: i64,
    /// ISO 8601 week number
    pub week: i64,
    pub month: i64,
    pub year: i64,
    /// 0 = Sunday
    pub weekday: i64,
}

/// `DATEADD(s, ms / 1000, '1970-01-01')` followed by the EXTRACTs
///
/// Division truncates toward zero like integer division in SQL.
pub fn from_epoch_millis(ms: i64) -> Option<CalendarParts> {
    let at: DateTime<Utc> = DateTime::from_timestamp(ms / 1000, 0)?;

    Some(CalendarParts {
        hour: i64::from(at.hour()),
        day: i64::from(at.day()),
        week: i64::from(at.iso_week().week()),
        month: i64::from(at.month()),
        year: i64::from(at.year()),
        weekday: i64::from(at.weekday().num_days_from_sunday()),
    })
}
