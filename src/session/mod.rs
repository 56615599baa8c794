//! Trading-session calendar built from contract details
//!
//! The provider describes an instrument's sessions with two schedule strings,
//! one for liquid (regular trading) hours and one for the full trading
//! session. Each holds the previous and the next trading day:
//!
//! ```text
//! 20140222:CLOSED;20140224:0930-1600
//! ```
//!
//! [`parse_schedule`] turns one such string into at most two
//! [`SessionWindow`]s localized into the instrument's timezone, and
//! [`SessionCalendar`] bundles the four windows of a contract.

pub mod endpoint;

use crate::provider::ContractDetails;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tracing::debug;

const CLOSED_MARKER: &str = "CLOSED";

/// Session calendar errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Schedule segment matches neither `date:CLOSED` nor `date:HHMM-HHMM`
    #[error("parse error: {0}")]
    ParseError(String),

    /// Provider zone code has no known mapping
    #[error("contract timezone cannot be determined from zone code '{0}'")]
    UnknownTimezone(String),

    /// Both schedule strings were closed
    #[error("contract details define no trading session")]
    NoSession,

    /// Wall-clock time skipped by a daylight-saving transition
    #[error("local time {0} does not exist in timezone {1}")]
    NonexistentLocalTime(NaiveDateTime, Tz),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// One trading or liquid-hours segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    /// Segment start in the instrument's timezone
    pub start: DateTime<Tz>,
    /// Segment end in the instrument's timezone
    pub end: DateTime<Tz>,
}

/// Map a provider zone code to a timezone
///
/// Only `EST` (US Eastern) is known; anything else means the contract's
/// timezone cannot be determined.
pub fn timezone_for_code(code: &str) -> SessionResult<Tz> {
    match code.trim() {
        "EST" => Ok(chrono_tz::US::Eastern),
        other => Err(SessionError::UnknownTimezone(other.to_string())),
    }
}

/// Attach `tz` to a wall-clock time, taking the earlier instant when the time is ambiguous
pub fn localize(tz: Tz, naive: NaiveDateTime) -> SessionResult<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or(SessionError::NonexistentLocalTime(naive, tz))
}

/// Parse a two-segment schedule string into (previous, next) windows
///
/// Closed segments yield `None`. A range whose end is not after its start
/// (an overnight session) ends on the following day.
pub fn parse_schedule(
    raw: &str,
    tz: Tz,
) -> SessionResult<(Option<SessionWindow>, Option<SessionWindow>)> {
    let mut segments = raw.split(';');
    let first = segments.next().unwrap_or_default();
    let second = segments.next().ok_or_else(|| {
        SessionError::ParseError(format!("expected two ';'-separated segments in '{raw}'"))
    })?;

    Ok((parse_segment(first, tz)?, parse_segment(second, tz)?))
}

fn parse_segment(segment: &str, tz: Tz) -> SessionResult<Option<SessionWindow>> {
    let segment = segment.trim();
    let malformed = || SessionError::ParseError(format!("malformed schedule segment '{segment}'"));

    let (date, hours) = segment.split_once(':').ok_or_else(malformed)?;
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| malformed())?;

    if hours == CLOSED_MARKER {
        return Ok(None);
    }

    let (start, end) = hours.split_once('-').ok_or_else(malformed)?;
    let start = NaiveTime::parse_from_str(start, "%H%M").map_err(|_| malformed())?;
    let end = NaiveTime::parse_from_str(end, "%H%M").map_err(|_| malformed())?;

    let start = date.and_time(start);
    let mut end = date.and_time(end);
    if end <= start {
        end += Duration::days(1);
    }

    Ok(Some(SessionWindow {
        start: localize(tz, start)?,
        end: localize(tz, end)?,
    }))
}

/// The four session windows of a contract plus its timezone
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCalendar {
    /// Instrument timezone
    pub timezone: Tz,
    /// Most recent regular-trading-hours window
    pub previous_rth: Option<SessionWindow>,
    /// Upcoming regular-trading-hours window
    pub next_rth: Option<SessionWindow>,
    /// Most recent full-session window
    pub previous_session: Option<SessionWindow>,
    /// Upcoming full-session window
    pub next_session: Option<SessionWindow>,
}

impl SessionCalendar {
    /// Build the calendar from provider contract details
    pub fn from_details(details: &ContractDetails) -> SessionResult<Self> {
        let timezone = timezone_for_code(&details.time_zone_id)?;
        let (previous_rth, next_rth) = parse_schedule(&details.liquid_hours, timezone)?;
        let (previous_session, next_session) = parse_schedule(&details.trading_hours, timezone)?;

        if previous_session.is_none() && next_session.is_none() {
            return Err(SessionError::NoSession);
        }

        debug!(
            timezone = %timezone,
            previous_rth = ?previous_rth,
            previous_session = ?previous_session,
            "Session calendar parsed"
        );

        Ok(Self {
            timezone,
            previous_rth,
            next_rth,
            previous_session,
            next_session,
        })
    }

    /// Most recent window, RTH or full session
    pub fn previous(&self, rth_only: bool) -> Option<&SessionWindow> {
        if rth_only {
            self.previous_rth.as_ref()
        } else {
            self.previous_session.as_ref()
        }
    }

    /// Upcoming window, RTH or full session
    pub fn next(&self, rth_only: bool) -> Option<&SessionWindow> {
        if rth_only {
            self.next_rth.as_ref()
        } else {
            self.next_session.as_ref()
        }
    }
}
