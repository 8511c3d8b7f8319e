//! Civil calendar windows at a fixed UTC-3 offset
//!
//! Congregations record meetings by civil date. Storage holds UTC instants, so
//! every conversion applies one fixed offset with no daylight saving:
//! civil midnight is `UTC + 3h`, and reading an instant back subtracts 3h
//! before taking calendar fields.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::error::ServiceError;

/// Hours the civil calendar lags behind UTC
pub const CIVIL_OFFSET_HOURS: i64 = 3;

/// Inclusive UTC instant range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// A civil date with its weekday (0 = Sunday .. 6 = Saturday)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CivilDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub weekday: u32,
}

impl CivilDate {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            weekday: date.weekday().num_days_from_sunday(),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

impl std::fmt::Display for CivilDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Parse a boundary date string (`YYYY-MM-DD`)
pub fn parse_civil_date(value: &str) -> Result<NaiveDate, ServiceError> {
    if value.len() != 10 {
        return Err(ServiceError::InvalidInput(format!("date must be YYYY-MM-DD, got '{}'", value)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ServiceError::InvalidInput(format!("date must be YYYY-MM-DD, got '{}'", value)))
}

pub fn format_civil_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn civil_to_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    (date.and_time(time) + Duration::hours(CIVIL_OFFSET_HOURS)).and_utc()
}

/// UTC range covering civil 00:00:00.000 through 23:59:59.999 of `date`
pub fn day_window(date: NaiveDate) -> TimeRange {
    TimeRange {
        start: civil_to_utc(date, NaiveTime::default()),
        end: civil_to_utc(date, end_of_day()),
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default()
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, ServiceError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ServiceError::InvalidInput(format!("invalid month {}-{}", year, month)))
}

/// Number of days in a month, taken as "day 0 of the next month"
pub fn days_in_month(year: i32, month: u32) -> Result<u32, ServiceError> {
    first_of_month(year, month)?;
    let (next_year, next_month) = if month == 12 {
        let next = year
            .checked_add(1)
            .ok_or_else(|| ServiceError::InvalidInput(format!("invalid month {}-{}", year, month)))?;
        (next, 1)
    } else {
        (year, month + 1)
    };
    let last = first_of_month(next_year, next_month)?
        .pred_opt()
        .ok_or_else(|| ServiceError::InvalidInput(format!("invalid month {}-{}", year, month)))?;
    Ok(last.day())
}

/// UTC range from the first civil day's start to the last civil day's end
pub fn month_window(year: i32, month: u32) -> Result<TimeRange, ServiceError> {
    let first = first_of_month(year, month)?;
    let last_day = days_in_month(year, month)?;
    let last = NaiveDate::from_ymd_opt(year, month, last_day)
        .ok_or_else(|| ServiceError::InvalidInput(format!("invalid month {}-{}", year, month)))?;

    Ok(TimeRange {
        start: day_window(first).start,
        end: day_window(last).end,
    })
}

/// Every civil date of a month, in order
pub fn month_dates(year: i32, month: u32) -> Result<Vec<NaiveDate>, ServiceError> {
    let first = first_of_month(year, month)?;
    let count = days_in_month(year, month)?;
    Ok(first.iter_days().take(count as usize).collect())
}

/// Read a UTC instant back as a civil date
pub fn to_civil_date(instant: DateTime<Utc>) -> CivilDate {
    let civil = instant.naive_utc() - Duration::hours(CIVIL_OFFSET_HOURS);
    CivilDate::from_date(civil.date())
}
