// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recurring schedules
//!
//! A schedule is an ISO-8601-style repeating interval (`R[n]/start/period`)
//! plus an optional minimum delta between consecutive firings. Fire times
//! are produced lazily; the minimum delta throttles against the previous
//! *actual* firing, which bounds catch-up bursts after the engine lagged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while parsing a schedule. A job with a malformed schedule
/// is treated as schedule-less; event and auto-start triggers still apply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("malformed repeating interval {value:?}: {reason}")]
    Interval { value: String, reason: String },
    #[error("malformed start instant {value:?}")]
    Start { value: String },
    #[error("malformed duration {value:?}: {reason}")]
    Duration { value: String, reason: String },
    #[error("period must be positive")]
    ZeroPeriod,
}

/// Raw schedule as persisted on a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Repeating interval: `R[n]/start/period`, n = 0 or absent = unbounded
    pub iso8601: String,
    /// Minimum delta between consecutive firings, ISO-8601 duration
    #[serde(default)]
    pub min_delta: Option<String>,
}

impl Schedule {
    pub fn new(iso8601: impl Into<String>) -> Self {
        Self {
            iso8601: iso8601.into(),
            min_delta: None,
        }
    }

    pub fn with_min_delta(mut self, delta: impl Into<String>) -> Self {
        self.min_delta = Some(delta.into());
        self
    }

    /// Parse into a validated schedule, failing fast on malformed input
    pub fn parse(&self) -> Result<ParsedSchedule, ScheduleError> {
        let (repeat, start, period) = parse_repeating_interval(&self.iso8601)?;
        let min_delta = match &self.min_delta {
            Some(s) => parse_iso_duration(s)?,
            None => Duration::ZERO,
        };
        Ok(ParsedSchedule {
            repeat,
            start,
            period,
            min_delta,
        })
    }
}

/// A validated schedule ready to produce fire times
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSchedule {
    /// Number of occurrences, `None` = unbounded
    pub repeat: Option<u64>,
    pub start: DateTime<Utc>,
    pub period: Duration,
    pub min_delta: Duration,
}

impl ParsedSchedule {
    /// Fire times from the first occurrence
    pub fn fire_times(&self) -> FireTimes {
        FireTimes {
            remaining: self.repeat,
            next_raw: self.start,
            period: chrono_duration(self.period),
            min_delta: chrono_duration(self.min_delta),
            last_fired: None,
        }
    }

    /// Fire times strictly after the given instant. Raw occurrences at or
    /// before it are consumed: they were scheduled in the past and are
    /// deemed already handled.
    pub fn fire_times_after(&self, after: DateTime<Utc>) -> FireTimes {
        let mut times = self.fire_times();
        while times.remaining != Some(0) && times.next_raw <= after {
            if let Some(n) = &mut times.remaining {
                *n -= 1;
            }
            times.next_raw += times.period;
        }
        times
    }
}

/// Lazy sequence of fire instants.
///
/// Iteration assumes each yielded instant was the actual firing time; when
/// the engine fires late it reports the real time with [`FireTimes::record_fired`]
/// so the minimum delta throttles against reality, not the plan.
#[derive(Debug, Clone)]
pub struct FireTimes {
    remaining: Option<u64>,
    next_raw: DateTime<Utc>,
    period: chrono::Duration,
    min_delta: chrono::Duration,
    last_fired: Option<DateTime<Utc>>,
}

impl FireTimes {
    /// Record the actual firing instant of the last yielded time
    pub fn record_fired(&mut self, actual: DateTime<Utc>) {
        match self.last_fired {
            Some(last) if last >= actual => {}
            _ => self.last_fired = Some(actual),
        }
    }

    /// Occurrences left to emit, `None` = unbounded
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }
}

impl Iterator for FireTimes {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        match &mut self.remaining {
            Some(0) => return None,
            Some(n) => *n -= 1,
            None => {}
        }

        let mut fire = self.next_raw;
        if let Some(last) = self.last_fired {
            let floor = last + self.min_delta;
            if fire < floor {
                fire = floor;
            }
        }

        self.next_raw += self.period;
        self.last_fired = Some(fire);
        Some(fire)
    }
}

/// Parse `R[n]/start/period`
fn parse_repeating_interval(
    value: &str,
) -> Result<(Option<u64>, DateTime<Utc>, Duration), ScheduleError> {
    let interval_err = |reason: &str| ScheduleError::Interval {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 3 {
        return Err(interval_err("expected R[n]/start/period"));
    }

    let repeat_part = parts[0];
    if !repeat_part.starts_with('R') {
        return Err(interval_err("missing R designator"));
    }
    let repeat = match &repeat_part[1..] {
        "" | "0" => None,
        digits => Some(
            digits
                .parse::<u64>()
                .map_err(|_| interval_err("repetition count is not a number"))?,
        ),
    };

    let start = DateTime::parse_from_rfc3339(parts[1])
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ScheduleError::Start {
            value: parts[1].to_string(),
        })?;

    let period = parse_iso_duration(parts[2])?;
    if period.is_zero() {
        return Err(ScheduleError::ZeroPeriod);
    }

    Ok((repeat, start, period))
}

/// Parse an ISO-8601 duration: `P[nW][nD][T[nH][nM][n[.f]S]]`.
///
/// Years and months are rejected - a schedule period must be a fixed span.
pub fn parse_iso_duration(value: &str) -> Result<Duration, ScheduleError> {
    let duration_err = |reason: &str| ScheduleError::Duration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let body = value
        .strip_prefix('P')
        .ok_or_else(|| duration_err("missing P designator"))?;
    if body.is_empty() {
        return Err(duration_err("empty duration"));
    }

    let mut total = Duration::ZERO;
    let mut in_time = false;
    let mut number = String::new();
    let mut saw_component = false;

    for ch in body.chars() {
        match ch {
            'T' => {
                if in_time || !number.is_empty() {
                    return Err(duration_err("misplaced T designator"));
                }
                in_time = true;
            }
            '0'..='9' | '.' => number.push(ch),
            designator => {
                if number.is_empty() {
                    return Err(duration_err("designator without a value"));
                }
                let n: f64 = number
                    .parse()
                    .map_err(|_| duration_err("value is not a number"))?;
                number.clear();
                saw_component = true;

                let seconds = match (in_time, designator) {
                    (false, 'W') => n * 7.0 * 86_400.0,
                    (false, 'D') => n * 86_400.0,
                    (true, 'H') => n * 3_600.0,
                    (true, 'M') => n * 60.0,
                    (true, 'S') => n,
                    (false, 'Y') | (false, 'M') => {
                        return Err(duration_err("calendar units are not supported"))
                    }
                    _ => return Err(duration_err("unknown designator")),
                };
                total += Duration::try_from_secs_f64(seconds)
                    .map_err(|_| duration_err("value out of range"))?;
            }
        }
    }

    if !number.is_empty() {
        return Err(duration_err("trailing value without designator"));
    }
    if !saw_component {
        return Err(duration_err("empty duration"));
    }
    Ok(total)
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
