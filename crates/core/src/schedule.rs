// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ISO-8601 recurring-interval schedules
//!
//! A schedule string has the form `R[n]/<start>/<duration>`:
//! - `R` alone repeats forever, `R5` fires five times
//! - `<start>` is an RFC 3339 instant with offset (`2012-06-04T19:25:16-07:00`)
//! - `<duration>` is `PnYnMnWnDTnHnMnS`; years count as 365 days and months
//!   as 30 days, and any component may carry a decimal fraction

use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Errors from parsing schedule strings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("expected R[n]/<start>/<duration>, got {0:?}")]
    Shape(String),
    #[error("invalid recurrence count {0:?}")]
    Recurrence(String),
    #[error("invalid start instant {0:?}: {1}")]
    Start(String, String),
    #[error("invalid duration {0:?}")]
    Duration(String),
    #[error("duration must be positive: {0:?}")]
    ZeroDuration(String),
}

/// Parse an ISO-8601 duration (`P1DT2H`, `PT5M`, `PT0.5S`, `P2W`)
pub fn parse_iso_duration(s: &str) -> Result<Duration, ScheduleError> {
    let err = || ScheduleError::Duration(s.to_string());
    let body = s.strip_prefix('P').ok_or_else(err)?;
    if body.is_empty() {
        return Err(err());
    }

    let (date_part, time_part) = match body.split_once('T') {
        Some((_, "")) => return Err(err()),
        Some((d, t)) => (d, Some(t)),
        None => (body, None),
    };

    let mut seconds = 0.0;
    let mut components = 0;
    for (value, unit) in components_of(date_part).ok_or_else(err)? {
        seconds += value
            * match unit {
                'Y' => 365.0 * SECONDS_PER_DAY,
                'M' => 30.0 * SECONDS_PER_DAY,
                'W' => 7.0 * SECONDS_PER_DAY,
                'D' => SECONDS_PER_DAY,
                _ => return Err(err()),
            };
        components += 1;
    }
    if let Some(time_part) = time_part {
        for (value, unit) in components_of(time_part).ok_or_else(err)? {
            seconds += value
                * match unit {
                    'H' => 3600.0,
                    'M' => 60.0,
                    'S' => 1.0,
                    _ => return Err(err()),
                };
            components += 1;
        }
    }
    if components == 0 {
        return Err(err());
    }

    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis > i64::MAX as f64 {
        return Err(err());
    }
    Ok(Duration::milliseconds(millis as i64))
}

/// Split `1Y2M3D` into `[(1.0, 'Y'), (2.0, 'M'), (3.0, 'D')]`
fn components_of(s: &str) -> Option<Vec<(f64, char)>> {
    let mut out = Vec::new();
    let mut number = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
        } else {
            if number.is_empty() {
                return None;
            }
            out.push((number.parse().ok()?, c));
            number.clear();
        }
    }
    if !number.is_empty() {
        return None;
    }
    Some(out)
}

/// A parsed `R[n]/start/duration` schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringSchedule {
    /// Number of occurrences; `None` is unbounded
    pub repeat: Option<u64>,
    pub start: DateTime<FixedOffset>,
    pub period: Duration,
}

impl RecurringSchedule {
    /// Time to wait from `now` until the next occurrence.
    ///
    /// An instant landing exactly on an occurrence waits for the following
    /// one. Returns `None` once a bounded schedule is exhausted.
    pub fn next_wait(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_occurrence(now).map(|at| at - now)
    }

    /// The next occurrence strictly after `now` (or `start` if still ahead)
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = self.start.with_timezone(&Utc);
        if self.repeat == Some(0) {
            return None;
        }
        if now < start {
            return Some(start);
        }

        let period_ms = self.period.num_milliseconds();
        if period_ms <= 0 {
            return None;
        }
        let elapsed_ms = (now - start).num_milliseconds();
        let k = elapsed_ms / period_ms + 1;
        if let Some(n) = self.repeat {
            if k as u64 >= n {
                return None;
            }
        }
        Some(start + Duration::milliseconds(k.checked_mul(period_ms)?))
    }
}

impl FromStr for RecurringSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [recurrence, start, duration] = parts.as_slice() else {
            return Err(ScheduleError::Shape(s.to_string()));
        };

        let count = recurrence
            .strip_prefix('R')
            .ok_or_else(|| ScheduleError::Recurrence(recurrence.to_string()))?;
        let repeat = if count.is_empty() {
            None
        } else {
            Some(
                count
                    .parse::<u64>()
                    .map_err(|_| ScheduleError::Recurrence(recurrence.to_string()))?,
            )
        };

        let start = DateTime::parse_from_rfc3339(start)
            .map_err(|e| ScheduleError::Start(start.to_string(), e.to_string()))?;

        let period = parse_iso_duration(duration)?;
        if period <= Duration::zero() {
            return Err(ScheduleError::ZeroDuration(duration.to_string()));
        }

        Ok(Self {
            repeat,
            start,
            period,
        })
    }
}

impl fmt::Display for RecurringSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repeat {
            Some(n) => write!(f, "R{}", n)?,
            None => f.write_str("R")?,
        }
        let millis = self.period.num_milliseconds();
        if millis % 1000 == 0 {
            write!(f, "/{}/PT{}S", self.start.to_rfc3339(), millis / 1000)
        } else {
            write!(f, "/{}/PT{}.{:03}S", self.start.to_rfc3339(), millis / 1000, millis % 1000)
        }
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
