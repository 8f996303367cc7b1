//! `en-GB` style rendering of hub timestamps.
//!
//! Hub timestamps are ISO 8601 strings. They are rendered as
//! `dd Mon yyyy, HH:MM:SS` in either the local zone or UTC. Input that does not
//! parse renders as `Invalid Date`, so a bad timestamp never hides the rest of
//! the line.
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Rendering of a timestamp that could not be parsed.
pub const INVALID_DATE: &str = "Invalid Date";

/// `en-GB` short month names. September is `Sept` in this locale.
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sept", "Oct", "Nov", "Dec",
];

/// Naive layouts accepted when the timestamp carries no offset.
const NAIVE_LAYOUTS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Zone timestamps are displayed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    /// The machine's local zone.
    #[default]
    Local,
    /// Coordinated universal time.
    Utc,
}

/// Parse a hub timestamp into `zone`.
///
/// - With an offset (`Z`, `+02:00`) the instant is converted into `zone`.
/// - Without an offset the wall-clock time is taken to be in `zone`.
/// - A bare date is midnight UTC.
pub fn parse_timestamp<Tz: TimeZone>(raw: &str, zone: &Tz) -> Option<DateTime<Tz>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(zone));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return zone.from_local_datetime(&naive).earliest();
        }
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).with_timezone(zone))
}

/// Render an already parsed instant.
pub fn format_datetime<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    format!(
        "{:02} {} {}, {:02}:{:02}:{:02}",
        value.day(),
        MONTHS[value.month0() as usize],
        value.year(),
        value.hour(),
        value.minute(),
        value.second()
    )
}

/// Render `raw` in `zone`, or [`INVALID_DATE`].
pub fn format_timestamp(raw: &str, zone: DisplayZone) -> String {
    let formatted = match zone {
        DisplayZone::Local => parse_timestamp(raw, &Local).map(|dt| format_datetime(&dt)),
        DisplayZone::Utc => parse_timestamp(raw, &Utc).map(|dt| format_datetime(&dt)),
    };
    formatted.unwrap_or_else(|| String::from(INVALID_DATE))
}
