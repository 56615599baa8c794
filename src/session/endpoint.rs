//! End-of-range resolution
//!
//! Turns the user's ending request (`now`, `end`, a date or a date-time) into
//! the first batch cursor. Explicit dates and times are read in the
//! instrument's timezone; the resolved cursor is expressed in the local
//! timezone, which is the zone the provider reads request end times in.

use super::{localize, SessionCalendar, SessionError, SessionWindow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use std::str::FromStr;

/// Accepted format of an explicit end date
pub const END_DATE_FORMAT: &str = "%Y%m%d";

/// Accepted format of an explicit end date-time
pub const END_DATE_TIME_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// End-of-range resolution errors
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Date-only input did not match YYYYMMDD
    #[error("malformed end date '{0}': expected YYYYMMDD")]
    MalformedDate(String),

    /// Date-time input did not match YYYYMMDD HH:MM:SS
    #[error("malformed end date-time '{0}': expected YYYYMMDD HH:MM:SS")]
    MalformedDateTime(String),

    /// The calendar has no window to anchor the requested mode
    #[error("no {0} session window available to resolve the end of range")]
    MissingWindow(&'static str),

    /// Localization failure
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Result type for endpoint resolution
pub type EndpointResult<T> = Result<T, EndpointError>;

/// How the end of the requested range is given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndMode {
    /// Up to the present, or the next session's end when it has not started yet
    Now,
    /// End of the most recently completed session
    End,
    /// Given date at the session's closing time
    Date(NaiveDate),
    /// Exact date-time in the instrument's timezone
    DateTime(NaiveDateTime),
}

impl FromStr for EndMode {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "now" => Ok(EndMode::Now),
            "end" => Ok(EndMode::End),
            _ if s.contains(' ') => NaiveDateTime::parse_from_str(s, END_DATE_TIME_FORMAT)
                .map(EndMode::DateTime)
                .map_err(|_| EndpointError::MalformedDateTime(s.to_string())),
            _ => NaiveDate::parse_from_str(s, END_DATE_FORMAT)
                .map(EndMode::Date)
                .map_err(|_| EndpointError::MalformedDate(s.to_string())),
        }
    }
}

/// Resolve the initial request cursor
///
/// `now` carries the local timezone; the returned timestamp is in that zone.
pub fn resolve(
    mode: &EndMode,
    rth_only: bool,
    calendar: &SessionCalendar,
    now: DateTime<Tz>,
) -> EndpointResult<DateTime<Tz>> {
    let local = now.timezone();
    let kind = if rth_only { "regular-hours" } else { "trading" };

    let cursor = match mode {
        EndMode::Now => match calendar.next_session {
            None => {
                calendar
                    .previous(rth_only)
                    .ok_or(EndpointError::MissingWindow(kind))?
                    .end
            }
            Some(_) => match calendar.next(rth_only) {
                Some(upcoming) if now > upcoming.start => now,
                Some(upcoming) => upcoming.end,
                None => {
                    calendar
                        .previous(rth_only)
                        .ok_or(EndpointError::MissingWindow(kind))?
                        .end
                }
            },
        },
        EndMode::End => closing_window(calendar, rth_only, kind)?.end,
        EndMode::Date(date) => {
            let close = closing_window(calendar, rth_only, kind)?.end.time();
            localize(calendar.timezone, date.and_time(close))?
        }
        EndMode::DateTime(date_time) => localize(calendar.timezone, *date_time)?,
    };

    Ok(cursor.with_timezone(&local))
}

fn closing_window<'a>(
    calendar: &'a SessionCalendar,
    rth_only: bool,
    kind: &'static str,
) -> EndpointResult<&'a SessionWindow> {
    calendar
        .previous(rth_only)
        .or_else(|| calendar.next(rth_only))
        .ok_or(EndpointError::MissingWindow(kind))
}
