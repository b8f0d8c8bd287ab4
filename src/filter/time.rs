//! Relative and calendar time windows.
//!
//! "Now" always comes from a [`Clock`] so compiled predicates are
//! reproducible in tests.

use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Source of the current time, in UTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Unit of an `in_last` / `in_next` amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl RelativeUnit {
    /// Fixed hour multiplier; months and years are not calendar-aware.
    pub fn hours(&self) -> i64 {
        match self {
            RelativeUnit::Hour => 1,
            RelativeUnit::Day => 24,
            RelativeUnit::Week => 168,
            RelativeUnit::Month => 720,
            RelativeUnit::Year => 8760,
        }
    }
}

impl FromStr for RelativeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HOUR" => Ok(RelativeUnit::Hour),
            "DAY" => Ok(RelativeUnit::Day),
            "WEEK" => Ok(RelativeUnit::Week),
            "MONTH" => Ok(RelativeUnit::Month),
            "YEAR" => Ok(RelativeUnit::Year),
            _ => Err(format!("unknown time unit '{s}', expected HOUR, DAY, WEEK, MONTH or YEAR")),
        }
    }
}

/// Calendar unit of an `in_calendar_*` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarUnit {
    Day,
    Week,
    Month,
    Year,
}

/// Whether a relative window extends before or after now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Past,
    Future,
}

/// A span of time. Which ends are inclusive depends on how it was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// `amount` units before or after `now`: `(now - d, now]` for the past,
/// `[now, now + d)` for the future. `None` when the span overflows.
pub fn relative_window(
    now: NaiveDateTime,
    amount: i64,
    unit: RelativeUnit,
    direction: Direction,
) -> Option<Window> {
    let span = TimeDelta::try_hours(amount.checked_mul(unit.hours())?)?;
    match direction {
        Direction::Past => Some(Window {
            start: now.checked_sub_signed(span)?,
            end: now,
        }),
        Direction::Future => Some(Window {
            start: now,
            end: now.checked_add_signed(span)?,
        }),
    }
}

/// The calendar unit `offset` units away from the one containing `now`,
/// from its first instant to its last microsecond, both inclusive.
pub fn calendar_window(unit: CalendarUnit, offset: i64, now: NaiveDateTime) -> Option<Window> {
    let today = now.date();
    let (first, last) = match unit {
        CalendarUnit::Day => {
            let day = today.checked_add_signed(TimeDelta::try_days(offset)?)?;
            (day, day)
        }
        CalendarUnit::Week => {
            let monday = today
                .checked_sub_signed(TimeDelta::try_days(today.weekday().num_days_from_monday() as i64)?)?
                .checked_add_signed(TimeDelta::try_weeks(offset)?)?;
            (monday, monday.checked_add_signed(TimeDelta::try_days(6)?)?)
        }
        CalendarUnit::Month => {
            let current = today.with_day(1)?;
            let first = shift_months(current, offset)?;
            let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
            (first, last)
        }
        CalendarUnit::Year => {
            let year = i32::try_from(i64::from(today.year()).checked_add(offset)?).ok()?;
            (
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year, 12, 31)?,
            )
        }
    };
    Some(Window {
        start: first.and_hms_opt(0, 0, 0)?,
        end: last.and_hms_micro_opt(23, 59, 59, 999_999)?,
    })
}

fn shift_months(date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    let months = Months::new(u32::try_from(offset.unsigned_abs()).ok()?);
    if offset >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    }
}
