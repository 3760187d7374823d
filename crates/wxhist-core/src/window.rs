//! Station-local day windows.
//!
//! Every station is processed against its own calendar: "yesterday" and
//! "today" are local dates in the station timezone, converted back to UTC
//! instants to filter the daily store.
//!
//! The rollup window for a day runs from local midnight to the configured end
//! hour of that same day (noon by default). Rows after the end hour stay in
//! the daily store until the next day's pass picks them up through the
//! remaining-rows sweep.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use time::{Date, Month, OffsetDateTime};

use wxhist_types::Station;

use crate::error::{Error, Result};

/// Default local hour closing the rollup window.
pub const DEFAULT_WINDOW_END_HOUR: u8 = 12;

/// How far a local time is pushed forward when it falls in a DST gap.
const GAP_STEP_MINUTES: i64 = 30;
const GAP_MAX_STEPS: i64 = 6;

/// A station timezone: an IANA zone or a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl LocalZone {
    /// Local calendar date at `instant`.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            LocalZone::Named(tz) => instant.with_timezone(tz).date_naive(),
            LocalZone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    /// UTC instant of a local wall-clock time.
    ///
    /// Ambiguous times (DST fall-back) resolve to the earliest instant. Times
    /// inside a DST gap move forward to the first valid local time.
    pub fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            LocalZone::Named(tz) => earliest_valid(tz, local),
            LocalZone::Fixed(offset) => earliest_valid(offset, local),
        }
    }
}

fn earliest_valid<Z: TimeZone>(zone: &Z, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    (0..=GAP_MAX_STEPS).find_map(|step| {
        let shifted = local + TimeDelta::minutes(GAP_STEP_MINUTES * step);
        zone.from_local_datetime(&shifted)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

impl FromStr for LocalZone {
    type Err = Error;

    /// Accepts IANA names (`Europe/Paris`), `UTC`/`Z`, and offsets such as
    /// `+02:00`, `-0330`, `UTC+2`, `GMT-3:30` or `UTC+5.5`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = |message: &str| Error::InvalidTimezone {
            timezone: s.to_string(),
            message: message.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("timezone is empty"));
        }
        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(LocalZone::Named(Tz::UTC));
        }
        if let Ok(tz) = trimmed.parse::<Tz>() {
            return Ok(LocalZone::Named(tz));
        }

        let seconds = parse_offset_seconds(trimmed)
            .ok_or_else(|| invalid("not an IANA zone name or UTC offset"))?;
        FixedOffset::east_opt(seconds)
            .map(LocalZone::Fixed)
            .ok_or_else(|| invalid("offset out of range"))
    }
}

impl fmt::Display for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalZone::Named(tz) => write!(f, "{}", tz.name()),
            LocalZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

fn parse_offset_seconds(s: &str) -> Option<i32> {
    let upper = s.to_ascii_uppercase();
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);
    let (sign, digits) = match rest.as_bytes().first()? {
        b'+' => (1, &rest[1..]),
        b'-' => (-1, &rest[1..]),
        _ => return None,
    };

    let seconds = if let Some((hours, minutes)) = digits.split_once(':') {
        let hours: i32 = hours.parse().ok()?;
        let minutes: i32 = minutes.parse().ok()?;
        if minutes >= 60 {
            return None;
        }
        hours * 3600 + minutes * 60
    } else if digits.contains('.') {
        let hours: f64 = digits.parse().ok()?;
        (hours * 3600.0).round() as i32
    } else if digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()) {
        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        if minutes >= 60 {
            return None;
        }
        hours * 3600 + minutes * 60
    } else {
        digits.parse::<i32>().ok()? * 3600
    };

    if seconds > 14 * 3600 {
        return None;
    }
    Some(sign * seconds)
}

/// The rollup window of one station for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Local calendar date the window summarizes ("yesterday").
    pub day: Date,
    /// Local midnight starting `day`, in UTC.
    pub start: OffsetDateTime,
    /// Local end hour of `day`, in UTC. Also the sweep cutoff.
    pub end: OffsetDateTime,
    /// Local midnight starting the current day, in UTC.
    pub today_start: OffsetDateTime,
}

impl DayWindow {
    /// Window over yesterday, as seen in `zone` at `now`.
    ///
    /// `end_hour` must be in `1..=24`; 24 closes the window at the last
    /// second of the day.
    pub fn yesterday(zone: &LocalZone, now: OffsetDateTime, end_hour: u8) -> Result<Self> {
        if !(1..=24).contains(&end_hour) {
            return Err(Error::InvalidWindow(format!(
                "end hour {} is outside 1..=24",
                end_hour
            )));
        }

        let now_utc = DateTime::<Utc>::from_timestamp(now.unix_timestamp(), 0)
            .ok_or_else(|| Error::InvalidWindow(format!("timestamp {} out of range", now)))?;
        let today = zone.local_date(now_utc);
        let yesterday = today
            .pred_opt()
            .ok_or_else(|| Error::InvalidWindow(format!("no day before {}", today)))?;

        let end_local = if end_hour == 24 {
            yesterday.and_hms_opt(23, 59, 59)
        } else {
            yesterday.and_hms_opt(u32::from(end_hour), 0, 0)
        };

        let instant = |local: Option<NaiveDateTime>| -> Result<OffsetDateTime> {
            let local = local.ok_or_else(|| Error::InvalidWindow("invalid local time".into()))?;
            let utc = zone.to_utc(local).ok_or_else(|| {
                Error::InvalidWindow(format!("{} does not exist in {}", local, zone))
            })?;
            to_offset_date_time(utc)
        };

        Ok(Self {
            day: to_date(yesterday)?,
            start: instant(yesterday.and_hms_opt(0, 0, 0))?,
            end: instant(end_local)?,
            today_start: instant(today.and_hms_opt(0, 0, 0))?,
        })
    }

    /// Window over yesterday in the station's own timezone.
    pub fn for_station(station: &Station, now: OffsetDateTime, end_hour: u8) -> Result<Self> {
        let zone: LocalZone = station.timezone.parse()?;
        Self::yesterday(&zone, now, end_hour)
    }

    /// Cutoff for both sweeps: rows at or before it are deleted.
    pub fn cutoff(&self) -> OffsetDateTime {
        self.end
    }

    /// Returns `true` if `instant` falls inside the window (bounds inclusive).
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn to_offset_date_time(utc: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(utc.timestamp())
        .map_err(|e| Error::InvalidWindow(e.to_string()))
}

fn to_date(date: NaiveDate) -> Result<Date> {
    let month = u8::try_from(date.month())
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(|| Error::InvalidWindow(format!("invalid month in {}", date)))?;
    let day = u8::try_from(date.day())
        .map_err(|_| Error::InvalidWindow(format!("invalid day in {}", date)))?;
    Date::from_calendar_date(date.year(), month, day)
        .map_err(|e| Error::InvalidWindow(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_parse_named_zones() {
        assert_eq!(
            "Europe/Paris".parse::<LocalZone>().unwrap(),
            LocalZone::Named(Tz::Europe__Paris)
        );
        assert_eq!("UTC".parse::<LocalZone>().unwrap(), LocalZone::Named(Tz::UTC));
        assert_eq!("z".parse::<LocalZone>().unwrap(), LocalZone::Named(Tz::UTC));
    }

    #[test]
    fn test_parse_fixed_offsets() {
        let east = |s| FixedOffset::east_opt(s).map(LocalZone::Fixed).unwrap();
        assert_eq!("+02:00".parse::<LocalZone>().unwrap(), east(7200));
        assert_eq!("-0330".parse::<LocalZone>().unwrap(), east(-12600));
        assert_eq!("UTC+2".parse::<LocalZone>().unwrap(), east(7200));
        assert_eq!("UTC-3:30".parse::<LocalZone>().unwrap(), east(-12600));
        assert_eq!("GMT+5.5".parse::<LocalZone>().unwrap(), east(19800));
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["", "Mars/Olympus", "UTC+25", "+02:75", "UTC*2"] {
            let err = input.parse::<LocalZone>().unwrap_err();
            assert!(matches!(err, Error::InvalidTimezone { .. }), "{}", input);
        }
    }

    #[test]
    fn test_window_utc() {
        let zone = LocalZone::Named(Tz::UTC);
        let window = DayWindow::yesterday(&zone, datetime!(2024-06-02 09:30 UTC), 12).unwrap();

        assert_eq!(window.day, date!(2024 - 06 - 01));
        assert_eq!(window.start, datetime!(2024-06-01 00:00 UTC));
        assert_eq!(window.end, datetime!(2024-06-01 12:00 UTC));
        assert_eq!(window.today_start, datetime!(2024-06-02 00:00 UTC));
        assert_eq!(window.cutoff(), window.end);
    }

    #[test]
    fn test_window_follows_station_zone() {
        let station = Station::new("st", "Paris", "Europe/Paris");
        // 10:00 UTC is noon local time in summer
        let window = DayWindow::for_station(&station, datetime!(2024-06-02 10:00 UTC), 12).unwrap();

        assert_eq!(window.day, date!(2024 - 06 - 01));
        assert_eq!(window.start, datetime!(2024-05-31 22:00 UTC));
        assert_eq!(window.end, datetime!(2024-06-01 10:00 UTC));
        assert_eq!(window.today_start, datetime!(2024-06-01 22:00 UTC));
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        let zone: LocalZone = "-05:00".parse().unwrap();
        // Still June 1st locally
        let window = DayWindow::yesterday(&zone, datetime!(2024-06-02 02:00 UTC), 12).unwrap();

        assert_eq!(window.day, date!(2024 - 05 - 31));
        assert_eq!(window.start, datetime!(2024-05-31 05:00 UTC));
    }

    #[test]
    fn test_end_of_day_window() {
        let zone = LocalZone::Named(Tz::UTC);
        let window = DayWindow::yesterday(&zone, datetime!(2024-06-02 09:30 UTC), 24).unwrap();
        assert_eq!(window.end, datetime!(2024-06-01 23:59:59 UTC));
        assert!(window.contains(datetime!(2024-06-01 18:00 UTC)));
        assert!(!window.contains(window.today_start));
    }

    #[test]
    fn test_invalid_end_hour() {
        let zone = LocalZone::Named(Tz::UTC);
        for hour in [0, 25] {
            let err =
                DayWindow::yesterday(&zone, datetime!(2024-06-02 09:30 UTC), hour).unwrap_err();
            assert!(matches!(err, Error::InvalidWindow(_)));
        }
    }

    #[test]
    fn test_midnight_in_dst_gap() {
        // Sao Paulo skipped from 00:00 to 01:00 on 2018-11-04
        let zone: LocalZone = "America/Sao_Paulo".parse().unwrap();
        let window = DayWindow::yesterday(&zone, datetime!(2018-11-05 12:00 UTC), 12).unwrap();

        assert_eq!(window.day, date!(2018 - 11 - 04));
        assert_eq!(window.start, datetime!(2018-11-04 03:00 UTC));
        assert_eq!(window.end, datetime!(2018-11-04 14:00 UTC));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let zone = LocalZone::Named(Tz::UTC);
        let window = DayWindow::yesterday(&zone, datetime!(2024-06-02 09:30 UTC), 12).unwrap();
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(datetime!(2024-06-01 12:00:01 UTC)));
    }
}
