// ==========================================
// Job-Shop APS - Work calendar
// ==========================================
// Single source of truth for working-time semantics:
// - Working days are Monday-Friday
// - Mon-Thu window 07:45-17:45, Friday 07:45-16:45
// - Lunch break 13:00-14:00 produces nothing
// Every other component routes calendar questions through here.
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance when comparing unit quantities
const UNITS_EPSILON: f64 = 1e-9;

// ==========================================
// WorkCalendar - shift policy value
// ==========================================
// Stateless and injectable; tests can substitute alternate shift
// schedules without touching globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCalendar {
    pub workday_start: NaiveTime, // 07:45
    pub workday_end: NaiveTime,   // 17:45 Mon-Thu
    pub friday_end: NaiveTime,    // 16:45
    pub break_start: NaiveTime,   // 13:00
    pub break_end: NaiveTime,     // 14:00
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self {
            workday_start: NaiveTime::from_hms_opt(7, 45, 0).unwrap(),
            workday_end: NaiveTime::from_hms_opt(17, 45, 0).unwrap(),
            friday_end: NaiveTime::from_hms_opt(16, 45, 0).unwrap(),
            break_start: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            break_end: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        }
    }
}

// ==========================================
// WorkInterval - one contiguous productive sub-window
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Units produced inside this interval
    pub units: f64,
    /// Units still outstanding after this interval
    pub remaining_units: f64,
}

// ==========================================
// QuantityConversion - result of quantity -> intervals
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityConversion {
    pub intervals: Vec<WorkInterval>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// First instant at which follow-up work could begin
    pub next_available: NaiveDateTime,
}

// ==========================================
// CalendarError
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    /// Rate must be strictly positive; carries a same-day fallback
    /// next-available timestamp so callers always have a usable instant.
    #[error("production rate must be greater than zero (got {rate})")]
    InvalidRate {
        rate: f64,
        next_available: NaiveDateTime,
    },
}

impl CalendarError {
    /// Fallback next-available instant carried by the error
    pub fn next_available(&self) -> NaiveDateTime {
        match self {
            CalendarError::InvalidRate { next_available, .. } => *next_available,
        }
    }
}

impl WorkCalendar {
    /// Monday-Friday are working days
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        date.weekday().num_days_from_monday() < 5
    }

    /// First working day strictly after `date`
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date + Duration::days(1);
        while !self.is_working_day(next) {
            next += Duration::days(1);
        }
        next
    }

    /// Closing time of the workday (shorter on Fridays)
    pub fn workday_end_time(&self, date: NaiveDate) -> NaiveTime {
        if date.weekday().num_days_from_monday() == 4 {
            self.friday_end
        } else {
            self.workday_end
        }
    }

    /// Productive hours of the day (window minus the lunch break)
    pub fn work_hours(&self, date: NaiveDate) -> f64 {
        let window = self.workday_end_time(date) - self.workday_start;
        let brk = self.break_end - self.break_start;
        (window - brk).num_minutes() as f64 / 60.0
    }

    /// Advance an instant to the next valid working instant
    ///
    /// Weekends move to Monday's opening, pre-shift times to the same
    /// day's opening, post-shift times to the next working day's opening,
    /// and lunch-break times to the end of the break. An instant already
    /// inside a working window is returned unchanged.
    pub fn next_working_instant(&self, dt: NaiveDateTime) -> NaiveDateTime {
        let mut current = dt;
        loop {
            let date = current.date();
            if !self.is_working_day(date) {
                current = self.next_working_day(date).and_time(self.workday_start);
                continue;
            }
            let day_end = self.workday_end_time(date);
            let t = current.time();
            if t < self.workday_start {
                return date.and_time(self.workday_start);
            }
            if t >= day_end {
                current = self.next_working_day(date).and_time(self.workday_start);
                continue;
            }
            if t >= self.break_start && t < self.break_end {
                return date.and_time(self.break_end);
            }
            return current;
        }
    }

    /// Convert a quantity at a production rate into working intervals
    ///
    /// Walks forward from `start` (advanced to a working instant first),
    /// emitting one interval per contiguous productive sub-window and
    /// subtracting `hours x rate` until the quantity is exhausted. The
    /// final interval is clipped at the exact exhaustion instant.
    ///
    /// # Errors
    /// `CalendarError::InvalidRate` when `rate_per_hour <= 0`; callers must
    /// check this before using the interval list.
    pub fn convert_quantity(
        &self,
        start: NaiveDateTime,
        quantity: f64,
        rate_per_hour: f64,
    ) -> Result<QuantityConversion, CalendarError> {
        if rate_per_hour <= 0.0 {
            return Err(CalendarError::InvalidRate {
                rate: rate_per_hour,
                next_available: start,
            });
        }

        let mut cursor = self.next_working_instant(start);
        let mut remaining = quantity;
        let mut intervals: Vec<WorkInterval> = Vec::new();

        while remaining > UNITS_EPSILON {
            cursor = self.next_working_instant(cursor);
            let date = cursor.date();
            let day_end = self.workday_end_time(date);

            // Current productive window: up to the break, or up to day close
            let window_end = if cursor.time() < self.break_start {
                date.and_time(self.break_start)
            } else {
                date.and_time(day_end)
            };

            let hours = (window_end - cursor).num_seconds() as f64 / 3600.0;
            let producible = hours * rate_per_hour;
            let units = remaining.min(producible);

            let end = if producible - units > UNITS_EPSILON {
                // Quantity runs out mid-window: clip at the exhaustion instant
                let secs = (units / rate_per_hour * 3600.0).round() as i64;
                cursor + Duration::seconds(secs)
            } else {
                window_end
            };

            remaining = (remaining - units).max(0.0);
            intervals.push(WorkInterval {
                start: cursor,
                end,
                units,
                remaining_units: remaining,
            });
            cursor = end;
        }

        let (start_date, end_date, next_available) = match (intervals.first(), intervals.last()) {
            (Some(first), Some(last)) => (first.start.date(), last.end.date(), last.end),
            _ => (cursor.date(), cursor.date(), cursor),
        };

        Ok(QuantityConversion {
            intervals,
            start_date,
            end_date,
            next_available,
        })
    }
}
