// ==========================================
// Job-Shop APS - Fragmenter
// ==========================================
// Responsibility: slice a finalized timeline into one record per
// (process step, calendar day), with quantities attributed per day.
//
// Daily attribution rules:
// - span inside one day: interval units verbatim
// - first day of a multi-day span: minutes to day close / nominal day
// - last day: symmetric fraction from day open
// - full intermediate days: even split across days spanned
// The nominal day divisor stays at 8h on Fridays as well, matching the
// upstream system's observable quantities (see DESIGN.md).
// ==========================================

use crate::calendar::WorkCalendar;
use crate::config::ScheduleConfig;
use crate::engine::timeline::ProgramTimeline;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::instrument;

// ==========================================
// DayFragment - one (step, date) slice
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct DayFragment {
    pub step_id: i64,
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub quantity: f64,
}

// ==========================================
// Fragmenter
// ==========================================
pub struct Fragmenter<'a> {
    calendar: &'a WorkCalendar,
    nominal_day_hours: f64,
}

impl<'a> Fragmenter<'a> {
    pub fn new(calendar: &'a WorkCalendar, config: &ScheduleConfig) -> Self {
        Self {
            calendar,
            nominal_day_hours: config.nominal_fragment_day_hours,
        }
    }

    /// Partition a finalized timeline into daily fragments
    ///
    /// Same-day contributions of one step (e.g. the two sides of the
    /// lunch break) are summed into a single fragment whose window
    /// widens to the earliest start and latest end observed. Output is
    /// ordered by (date, step).
    #[instrument(skip(self, timeline), fields(steps_count = timeline.steps.len()))]
    pub fn fragment(&self, timeline: &ProgramTimeline) -> Vec<DayFragment> {
        let mut by_key: BTreeMap<(NaiveDate, i64), DayFragment> = BTreeMap::new();

        for step in &timeline.steps {
            for interval in &step.intervals {
                self.slice_span(
                    step.step_id,
                    interval.start,
                    interval.end,
                    interval.units,
                    &mut by_key,
                );
            }
        }

        by_key.into_values().collect()
    }

    /// Attribute one (start, end, units) span across the days it touches
    fn slice_span(
        &self,
        step_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
        units: f64,
        out: &mut BTreeMap<(NaiveDate, i64), DayFragment>,
    ) {
        let first_day = start.date();
        let last_day = end.date();
        let mut day = first_day;

        while day <= last_day {
            if !self.calendar.is_working_day(day) {
                day += Duration::days(1);
                continue;
            }

            let day_open = day.and_time(self.calendar.workday_start);
            let day_close = day.and_time(self.calendar.workday_end_time(day));

            let (frag_start, frag_end, quantity) = if day == first_day && day == last_day {
                (start, end, units)
            } else if day == first_day {
                let hours = ((day_close - start).num_seconds() as f64 / 3600.0).max(0.0);
                (start, day_close, hours / self.nominal_day_hours * units)
            } else if day == last_day {
                let hours = ((end - day_open).num_seconds() as f64 / 3600.0).max(0.0);
                (day_open, end, hours / self.nominal_day_hours * units)
            } else {
                let days_spanned = (last_day - first_day).num_days() + 1;
                (day_open, day_close, units / days_spanned as f64)
            };

            out.entry((day, step_id))
                .and_modify(|frag| {
                    frag.quantity += quantity;
                    if frag_start < frag.start {
                        frag.start = frag_start;
                    }
                    if frag_end > frag.end {
                        frag.end = frag_end;
                    }
                })
                .or_insert(DayFragment {
                    step_id,
                    date: day,
                    start: frag_start,
                    end: frag_end,
                    quantity,
                });

            day += Duration::days(1);
        }
    }
}
