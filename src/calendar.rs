//! Working-hour calendar arithmetic.
//!
//! Maps between wall-clock instants and elapsed working hours under the
//! project's working-day policy: a fixed day start time, a default capacity,
//! optional per-date capacity overrides, and weekend skipping. Overrides
//! fully replace both the default capacity and the weekend decision.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

use crate::error::{DagrError, Result};
use crate::models::ProjectConfig;

/// Tolerance for working-hour comparisons.
pub const EPSILON: f64 = 1e-9;

/// Search bound when walking forward through zero-capacity days.
pub const MAX_SEARCH_DAYS: u32 = 10_000;

fn hours_to_duration(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

fn duration_to_hours(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 3_600_000.0
}

/// A pure view over the project configuration that performs all
/// working-time arithmetic. Cheap to construct; holds no state.
#[derive(Clone, Copy, Debug)]
pub struct Calendar<'a> {
    config: &'a ProjectConfig,
}

impl<'a> Calendar<'a> {
    pub fn new(config: &'a ProjectConfig) -> Self {
        Self { config }
    }

    /// Working capacity of a date, in hours.
    pub fn capacity(&self, date: NaiveDate) -> f64 {
        if let Some(&hours) = self.config.capacity_overrides.get(&date) {
            return hours;
        }
        if self.config.skip_weekends
            && matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
        {
            return 0.0;
        }
        self.config.hours_per_day
    }

    /// First working instant of a date.
    pub fn day_start(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.config.day_start_time)
    }

    /// Last working instant of a date: day start plus that day's capacity.
    ///
    /// For a zero-capacity date this equals the day start.
    pub fn end_of_working_day(&self, date: NaiveDate) -> NaiveDateTime {
        self.day_start(date) + hours_to_duration(self.capacity(date))
    }

    /// Shift an instant forward to the next moment with positive remaining
    /// capacity: into the working window of its own day, or to the start of
    /// the next day with capacity.
    pub fn snap_forward(&self, t: NaiveDateTime) -> Result<NaiveDateTime> {
        let mut current = t;
        for _ in 0..MAX_SEARCH_DAYS {
            let date = current.date();
            if self.capacity(date) > EPSILON {
                let start = self.day_start(date);
                if current < start {
                    return Ok(start);
                }
                if current < self.end_of_working_day(date) {
                    return Ok(current);
                }
            }
            current = self.day_start(next_day(date)?);
        }
        Err(DagrError::UnschedulableHorizon(MAX_SEARCH_DAYS))
    }

    /// First instant of the first day with positive capacity at or after
    /// the configured project start.
    pub fn project_start_instant(&self) -> Result<NaiveDateTime> {
        self.snap_forward(self.config.start_datetime)
    }

    /// Advance an instant by `hours` of working time.
    ///
    /// With `hours == 0` this returns the task's real starting instant: the
    /// input shifted forward to the next moment with positive capacity.
    pub fn add_working_hours(&self, t: NaiveDateTime, hours: f64) -> Result<NaiveDateTime> {
        let mut remaining = hours.max(0.0);
        let mut current = self.snap_forward(t)?;
        if remaining <= EPSILON {
            return Ok(current);
        }
        for _ in 0..MAX_SEARCH_DAYS {
            let day_end = self.end_of_working_day(current.date());
            let available = duration_to_hours(day_end - current);
            if remaining <= available + EPSILON {
                return Ok(current + hours_to_duration(remaining));
            }
            remaining -= available;
            current = self.snap_forward(self.day_start(next_day(current.date())?))?;
        }
        Err(DagrError::UnschedulableHorizon(MAX_SEARCH_DAYS))
    }

    /// Count working hours between two instants (zero when `end <= start`).
    pub fn working_hours_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<f64> {
        if end <= start {
            return Ok(0.0);
        }
        let mut total = 0.0;
        let mut current = self.snap_forward(start)?;
        for _ in 0..MAX_SEARCH_DAYS {
            if current >= end {
                return Ok(total);
            }
            let day_end = self.end_of_working_day(current.date());
            let effective = day_end.min(end);
            total += duration_to_hours(effective - current).max(0.0);
            if day_end >= end {
                return Ok(total);
            }
            current = self.snap_forward(self.day_start(next_day(current.date())?))?;
        }
        Err(DagrError::UnschedulableHorizon(MAX_SEARCH_DAYS))
    }

    /// Working hours from the project start instant to `t`.
    pub fn elapsed_hours(&self, t: NaiveDateTime) -> Result<f64> {
        self.working_hours_between(self.project_start_instant()?, t)
    }

    /// Working-hour offset of a date's deadline instant (end of that
    /// working day) from the project start.
    pub fn deadline_offset(&self, date: NaiveDate) -> Result<f64> {
        self.elapsed_hours(self.end_of_working_day(date))
    }

    /// Working-hour offset of the first working instant at or after the
    /// start of `date`. Used for `proposed_start` floors.
    pub fn date_start_offset(&self, date: NaiveDate) -> Result<f64> {
        let instant = self.snap_forward(self.day_start(date))?;
        self.elapsed_hours(instant)
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt()
        .ok_or(DagrError::UnschedulableHorizon(MAX_SEARCH_DAYS))
}
