//! Calendar helpers for cutting a year into whole weekday-to-weekday periods.
use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Days from Monday, as used by the period definitions (Monday = 0)
fn day_number(weekday: Weekday) -> i64 {
    i64::from(weekday.num_days_from_monday())
}

/// The first `weekday` on or after `d`
pub fn next_weekday(d: NaiveDate, weekday: Weekday) -> NaiveDate {
    let mut days_ahead = day_number(weekday) - day_number(d.weekday());
    if days_ahead < 0 {
        days_ahead += 7;
    }
    d + Duration::days(days_ahead)
}

/// The last `weekday` on or before `d`.
///
/// When `d` falls earlier in the week than `weekday`, the following `weekday` is returned instead.
/// Periods are only formed from days with data, so this never extends a year.
pub fn prev_weekday(d: NaiveDate, weekday: Weekday) -> NaiveDate {
    let days_behind = day_number(d.weekday()) - day_number(weekday);
    d - Duration::days(days_behind)
}

/// A repeating run of days, from `first` to `last` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPattern {
    /// Day the period starts on
    pub first: Weekday,
    /// Day the period ends on
    pub last: Weekday,
}

impl Default for PeriodPattern {
    /// Friday to Thursday
    fn default() -> Self {
        Self {
            first: Weekday::Fri,
            last: Weekday::Thu,
        }
    }
}

impl PeriodPattern {
    /// Number of days in a period
    pub fn len(&self) -> usize {
        let days = (day_number(self.last) - day_number(self.first) + 8).rem_euclid(7);
        if days == 0 {
            7
        } else {
            // Between 1 and 6
            usize::try_from(days).unwrap_or(7)
        }
    }

    /// Whether the period has no days, which never happens
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether a day of the week is part of the period
    pub fn contains(&self, weekday: Weekday) -> bool {
        let offset = (day_number(weekday) - day_number(self.first)).rem_euclid(7);
        usize::try_from(offset).is_ok_and(|offset| offset < self.len())
    }

    /// First and last day of the whole periods within `start..=end`
    pub fn trim(&self, start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        (next_weekday(start, self.first), prev_weekday(end, self.last))
    }
}
