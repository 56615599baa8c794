//! Session calendar and end-of-range resolution through the public API

use chrono::TimeZone;
use chrono_tz::US::Eastern;
use tws_history_downloader::provider::ContractDetails;
use tws_history_downloader::session::endpoint::{self, EndMode, EndpointError};
use tws_history_downloader::session::{SessionCalendar, SessionError};

fn details(liquid: &str, trading: &str) -> ContractDetails {
    ContractDetails {
        time_zone_id: "EST".to_string(),
        liquid_hours: liquid.to_string(),
        trading_hours: trading.to_string(),
    }
}

fn fmt(dt: chrono::DateTime<chrono_tz::Tz>) -> String {
    dt.format("%Y%m%d %H:%M:%S").to_string()
}

#[test]
fn test_weekend_schedule_resolves_to_friday_close() {
    // Saturday: nothing today, Monday upcoming
    let calendar = SessionCalendar::from_details(&details(
        "20140222:CLOSED;20140224:0930-1600",
        "20140222:CLOSED;20140224:0400-2000",
    ))
    .unwrap();
    assert!(calendar.previous(true).is_none());

    let now = Eastern.with_ymd_and_hms(2014, 2, 22, 12, 0, 0).unwrap();
    let end = endpoint::resolve(&EndMode::End, true, &calendar, now).unwrap();
    assert_eq!(fmt(end), "20140224 16:00:00");

    let now_cursor = endpoint::resolve(&EndMode::Now, true, &calendar, now).unwrap();
    assert_eq!(fmt(now_cursor), "20140224 16:00:00");
}

#[test]
fn test_full_session_and_rth_windows_differ() {
    let calendar = SessionCalendar::from_details(&details(
        "20140221:0930-1600;20140224:0930-1600",
        "20140221:0400-2000;20140224:0400-2000",
    ))
    .unwrap();
    let now = Eastern.with_ymd_and_hms(2014, 2, 22, 12, 0, 0).unwrap();

    let rth = endpoint::resolve(&EndMode::End, true, &calendar, now).unwrap();
    let full = endpoint::resolve(&EndMode::End, false, &calendar, now).unwrap();
    assert_eq!(fmt(rth), "20140221 16:00:00");
    assert_eq!(fmt(full), "20140221 20:00:00");
}

#[test]
fn test_overnight_session_closes_next_morning() {
    let calendar = SessionCalendar::from_details(&details(
        "20140221:1700-0800;20140224:1700-0800",
        "20140221:1700-0800;20140224:1700-0800",
    ))
    .unwrap();
    let window = calendar.previous(false).unwrap();
    assert_eq!(fmt(window.start), "20140221 17:00:00");
    assert_eq!(fmt(window.end), "20140222 08:00:00");
}

#[test]
fn test_explicit_date_in_local_zone() {
    let calendar = SessionCalendar::from_details(&details(
        "20140221:0930-1600;20140224:0930-1600",
        "20140221:0400-2000;20140224:0400-2000",
    ))
    .unwrap();
    let now = chrono_tz::Europe::London
        .with_ymd_and_hms(2014, 2, 22, 12, 0, 0)
        .unwrap();

    let mode: EndMode = "20140214".parse().unwrap();
    let cursor = endpoint::resolve(&mode, true, &calendar, now).unwrap();
    assert_eq!(cursor.timezone(), chrono_tz::Europe::London);
    assert_eq!(fmt(cursor), "20140214 21:00:00");
}

#[test]
fn test_calendar_errors() {
    let unknown = ContractDetails {
        time_zone_id: "CTT".to_string(),
        ..details("20140221:0930-1600;20140224:0930-1600", "20140221:0400-2000;20140224:0400-2000")
    };
    assert!(matches!(
        SessionCalendar::from_details(&unknown),
        Err(SessionError::UnknownTimezone(code)) if code == "CTT"
    ));

    let closed = details("20140222:CLOSED;20140223:CLOSED", "20140222:CLOSED;20140223:CLOSED");
    assert!(matches!(
        SessionCalendar::from_details(&closed),
        Err(SessionError::NoSession)
    ));

    assert!(matches!(
        "2014/02/21".parse::<EndMode>(),
        Err(EndpointError::MalformedDate(_))
    ));
}
