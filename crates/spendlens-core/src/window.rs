//! Window resolution
//!
//! Turns a rolling "last N days" request or a calendar `YYYY-MM` request into
//! a concrete half-open [`TimeWindow`], and derives the period immediately
//! preceding it. The billing API treats `start` as inclusive and `end` as
//! exclusive, so a calendar month ends on the first day of the next month.

use crate::error::{Result, SpendlensError};
use crate::types::{TimeWindow, WindowKind};
use chrono::{Datelike, Duration, NaiveDate, Utc};

/// Longest rolling window accepted
pub const MAX_ROLLING_DAYS: i64 = 365;

/// Window covering the `days` days before `today`
///
/// `end` is `today` (exclusive), so the current, still-accruing day is left out.
pub fn rolling_window(days: i64, today: NaiveDate) -> Result<TimeWindow> {
    if !(1..=MAX_ROLLING_DAYS).contains(&days) {
        return Err(SpendlensError::validation(format!(
            "Days must be between 1 and {MAX_ROLLING_DAYS}, got {days}"
        )));
    }

    Ok(TimeWindow {
        start: today - Duration::days(days),
        end: today,
        days,
        kind: WindowKind::Rolling,
        label: rolling_label(days),
    })
}

/// Rolling window ending on the current UTC date
pub fn rolling_window_from_today(days: i64) -> Result<TimeWindow> {
    rolling_window(days, Utc::now().date_naive())
}

/// Window covering one calendar month
pub fn calendar_month_window(year: i32, month: u32) -> Result<TimeWindow> {
    if !(1..=12).contains(&month) {
        return Err(SpendlensError::validation(format!(
            "month must be 1..12, got {month}"
        )));
    }

    let start = first_of_month(year, month)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = first_of_month(next_year, next_month)?;

    Ok(TimeWindow {
        start,
        end,
        days: (end - start).num_days(),
        kind: WindowKind::CalendarMonth,
        label: format!("{year:04}-{month:02}"),
    })
}

/// The period of equal length immediately preceding `window`
///
/// Rolling windows shift back by their own length; calendar months step back
/// one month, wrapping January to December of the previous year.
pub fn previous_period(window: &TimeWindow) -> Result<TimeWindow> {
    match window.kind {
        WindowKind::Rolling => Ok(TimeWindow {
            start: window.start - Duration::days(window.days),
            end: window.start,
            days: window.days,
            kind: WindowKind::Rolling,
            label: window.label.clone(),
        }),
        WindowKind::CalendarMonth => {
            let (year, month) = previous_month(window.start.year(), window.start.month());
            calendar_month_window(year, month)
        }
    }
}

/// The month before `(year, month)`
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Parse `YYYY-MM` into `(year, month)`
pub fn parse_month(value: &str) -> Result<(i32, u32)> {
    let invalid = || SpendlensError::validation(format!("Invalid month '{value}', expected YYYY-MM"));

    let (year_str, month_str) = value.trim().split_once('-').ok_or_else(invalid)?;
    let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(year_str, 4) || !digits(month_str, 2) {
        return Err(invalid());
    }
    let year: i32 = year_str.parse().map_err(|_| invalid())?;
    let month: u32 = month_str.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    Ok((year, month))
}

fn rolling_label(days: i64) -> String {
    format!("last {days} days")
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| SpendlensError::validation(format!("year {year} is out of range")))
}
