// ==========================================
// Job-Shop APS - Production scheduler
// ==========================================
// Orchestrates the core engines for one program:
// cascade -> conflict resolution -> projection / fragmentation.
// Pure over WorkOrderInput values; persistence lives in the api layer.
// ==========================================

use crate::calendar::WorkCalendar;
use crate::config::ScheduleConfig;
use crate::domain::WorkOrderInput;
use crate::engine::fragmenter::{DayFragment, Fragmenter};
use crate::engine::timeline::{ProgramTimeline, SchedulingError, TimelineBuilder};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Timestamp format used by timeline read models
pub const TIMELINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// Timeline read model
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineProcess {
    pub id: String,
    pub label: String,
    pub position: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineGroup {
    pub id: String,
    pub order_code: u32,
    pub description: String,
    pub processes: Vec<TimelineProcess>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: String,
    pub group_id: String,
    pub process_id: String,
    pub name: String,
    pub start_time: String, // ISO, TIMELINE_TIME_FORMAT
    pub end_time: String,
    pub total_quantity: f64,
    pub interval_quantity: f64,
    pub remaining_quantity: f64,
    pub rate_per_hour: f64,
    pub machine: String,
    pub operator: String,
    pub assigned: bool,
    pub is_continuation: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineData {
    pub groups: Vec<TimelineGroup>,
    pub items: Vec<TimelineItem>,
}

// ==========================================
// ProductionScheduler
// ==========================================
pub struct ProductionScheduler {
    calendar: WorkCalendar,
    config: ScheduleConfig,
}

impl ProductionScheduler {
    pub fn new(calendar: WorkCalendar, config: ScheduleConfig) -> Self {
        Self { calendar, config }
    }

    pub fn calendar(&self) -> &WorkCalendar {
        &self.calendar
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Build the conflict-free timeline for a program
    #[instrument(skip(self, orders), fields(orders_count = orders.len()))]
    pub fn build_timeline(
        &self,
        orders: &[WorkOrderInput],
        start_date: NaiveDate,
    ) -> Result<ProgramTimeline, SchedulingError> {
        let start = start_date.and_time(self.calendar.workday_start);
        let timeline = TimelineBuilder::new(&self.calendar, &self.config).build(orders, start)?;
        info!(
            steps_count = timeline.steps.len(),
            rounds = timeline.rounds,
            "timeline built"
        );
        Ok(timeline)
    }

    /// Project a finalized timeline into the UI/reporting read model
    ///
    /// One group per work order, one item per (step, day) with the day's
    /// contributions merged, carrying ISO timestamps and display labels.
    pub fn timeline_data(
        &self,
        orders: &[WorkOrderInput],
        timeline: &ProgramTimeline,
    ) -> TimelineData {
        let mut groups: Vec<TimelineGroup> = Vec::new();

        let mut sorted: Vec<&WorkOrderInput> = orders.iter().collect();
        sorted.sort_by_key(|o| (o.priority, o.order_id));

        for order in &sorted {
            let mut processes: Vec<TimelineProcess> = order
                .steps
                .iter()
                .filter(|s| s.is_schedulable())
                .map(|s| TimelineProcess {
                    id: format!("proc_{}", s.step_id),
                    label: s.process_label.clone(),
                    position: s.position,
                })
                .collect();
            processes.sort_by_key(|p| p.position);

            groups.push(TimelineGroup {
                id: format!("ot_{}", order.order_id),
                order_code: order.order_code,
                description: order.description.clone(),
                processes,
            });
        }

        let mut items: Vec<TimelineItem> = Vec::new();
        for step in &timeline.steps {
            // Group this step's intervals per day, widening the window and
            // keeping the remaining quantity after the day's last interval
            let mut per_day: BTreeMap<NaiveDate, (NaiveDateTime, NaiveDateTime, f64, f64)> =
                BTreeMap::new();
            for interval in &step.intervals {
                per_day
                    .entry(interval.start.date())
                    .and_modify(|(start, end, units, remaining)| {
                        if interval.start < *start {
                            *start = interval.start;
                        }
                        if interval.end > *end {
                            *end = interval.end;
                        }
                        *units += interval.units;
                        *remaining = interval.remaining_units;
                    })
                    .or_insert((
                        interval.start,
                        interval.end,
                        interval.units,
                        interval.remaining_units,
                    ));
            }

            for (day, (start, end, units, remaining)) in per_day {
                items.push(TimelineItem {
                    id: format!("item_{}_{}", step.step_id, day.format("%Y%m%d")),
                    group_id: format!("ot_{}", step.order_id),
                    process_id: format!("proc_{}", step.step_id),
                    name: format!(
                        "{} - {:.0} of {:.0} units",
                        step.process_label, units, step.quantity
                    ),
                    start_time: start.format(TIMELINE_TIME_FORMAT).to_string(),
                    end_time: end.format(TIMELINE_TIME_FORMAT).to_string(),
                    total_quantity: step.quantity,
                    interval_quantity: units,
                    remaining_quantity: remaining,
                    rate_per_hour: step.rate_per_hour,
                    machine: step
                        .machine_label
                        .clone()
                        .unwrap_or_else(|| "Unassigned".to_string()),
                    operator: step
                        .operator_name
                        .clone()
                        .unwrap_or_else(|| "Unassigned".to_string()),
                    assigned: step.operator_name.is_some(),
                    is_continuation: false,
                });
            }
        }

        TimelineData { groups, items }
    }

    /// Derive the program end date from a finalized timeline
    ///
    /// The latest interval end, snapped forward to a working instant when
    /// it lands outside working hours; the start date when the timeline
    /// is empty.
    pub fn program_end_date(&self, start_date: NaiveDate, timeline: &ProgramTimeline) -> NaiveDate {
        let Some(latest) = timeline.latest_end() else {
            return start_date;
        };

        let date = latest.date();
        if !self.calendar.is_working_day(date) {
            return self.calendar.next_working_day(date);
        }
        if latest.time() > self.calendar.workday_end_time(date) {
            return self.calendar.next_working_day(date);
        }
        date
    }

    /// Slice a finalized timeline into daily fragments
    pub fn fragment(&self, timeline: &ProgramTimeline) -> Vec<DayFragment> {
        Fragmenter::new(&self.calendar, &self.config).fragment(timeline)
    }

    /// Working days in [start, end], inclusive
    pub fn working_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut day = start;
        while day <= end {
            if self.calendar.is_working_day(day) {
                days.push(day);
            }
            day += Duration::days(1);
        }
        days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProcessStepInput;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn order_fixture() -> WorkOrderInput {
        WorkOrderInput {
            order_id: 1,
            order_code: 1001,
            description: "Bracket run".to_string(),
            priority: 1,
            steps: vec![
                ProcessStepInput {
                    step_id: 1,
                    position: 10,
                    process_label: "CORTE".to_string(),
                    machine_id: Some(1),
                    machine_label: Some("M1".to_string()),
                    operator_name: Some("ana".to_string()),
                    quantity: 100.0,
                    rate_per_hour: 10.0,
                },
                ProcessStepInput {
                    step_id: 2,
                    position: 20,
                    process_label: "PLEGADO".to_string(),
                    machine_id: Some(2),
                    machine_label: Some("M2".to_string()),
                    operator_name: None,
                    quantity: 0.0, // unschedulable
                    rate_per_hour: 15.0,
                },
            ],
        }
    }

    #[test]
    fn test_timeline_data_projection() {
        let scheduler = ProductionScheduler::new(WorkCalendar::default(), ScheduleConfig::default());
        let orders = vec![order_fixture()];
        let timeline = scheduler.build_timeline(&orders, date(2)).unwrap();
        let data = scheduler.timeline_data(&orders, &timeline);

        assert_eq!(data.groups.len(), 1);
        let group = &data.groups[0];
        assert_eq!(group.id, "ot_1");
        assert_eq!(group.order_code, 1001);
        // Unschedulable step is absent from the group
        assert_eq!(group.processes.len(), 1);

        // 100 units at 10/hr: 90 on Monday, 10 on Tuesday -> 2 day-items
        assert_eq!(data.items.len(), 2);
        let monday = &data.items[0];
        assert_eq!(monday.start_time, "2025-06-02 07:45:00");
        assert_eq!(monday.end_time, "2025-06-02 17:45:00");
        assert!((monday.interval_quantity - 90.0).abs() < 1e-9);
        assert_eq!(monday.name, "CORTE - 90 of 100 units");
        assert_eq!(monday.machine, "M1");
        assert!(monday.assigned);

        let tuesday = &data.items[1];
        assert_eq!(tuesday.end_time, "2025-06-03 08:45:00");
        assert!((tuesday.interval_quantity - 10.0).abs() < 1e-9);
        assert!((tuesday.remaining_quantity - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_program_end_date_snaps_forward() {
        let scheduler = ProductionScheduler::new(WorkCalendar::default(), ScheduleConfig::default());
        let orders = vec![order_fixture()];
        let timeline = scheduler.build_timeline(&orders, date(2)).unwrap();
        // Work ends Tuesday 08:45 -> Tuesday
        assert_eq!(scheduler.program_end_date(date(2), &timeline), date(3));

        // Empty timeline falls back to the start date
        let empty = scheduler.build_timeline(&[], date(2)).unwrap();
        assert_eq!(scheduler.program_end_date(date(2), &empty), date(2));
    }

    #[test]
    fn test_working_days_skip_weekends() {
        let scheduler = ProductionScheduler::new(WorkCalendar::default(), ScheduleConfig::default());
        // Jun 5 2025 (Thu) .. Jun 10 (Tue): Sat 7 and Sun 8 drop out
        let days = scheduler.working_days(date(5), date(10));
        assert_eq!(days, vec![date(5), date(6), date(9), date(10)]);
    }
}
