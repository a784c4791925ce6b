use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use super::CalendarError;

pub fn resolve_zone(name: &str) -> Result<Tz, CalendarError> {
    name.parse::<Tz>()
        .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
}

/// Attach `zone` to a wall-clock time. Ambiguous times (DST fall-back) take
/// the earlier instant; times inside a DST gap are rejected.
pub fn localize(zone: Tz, local: NaiveDateTime, event: Uuid) -> Result<DateTime<Tz>, CalendarError> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(CalendarError::NonexistentLocalTime {
            event,
            when: local.format("%Y-%m-%d %H:%M:%S").to_string(),
            zone: zone.name().to_string(),
        }),
    }
}

/// Current wall-clock time in `zone`
pub fn now_in(zone: Tz) -> NaiveDateTime {
    Utc::now().with_timezone(&zone).naive_local()
}

pub fn today_in(zone: Tz) -> NaiveDate {
    now_in(zone).date()
}
