// ==========================================
// Job-Shop APS - Timeline builder
// ==========================================
// Responsibility: conflict-free per-process timeline across all work
// orders of one program
// Input: work orders sorted by program priority + ideal cascades
// Output: ScheduledStep list with final starts/ends/intervals
//
// Resolution is a fixed-point sweep: commit steps into each machine's
// timeline in priority order, push conflicting steps forward, then
// propagate every displacement to the same order's downstream steps.
// Monotonic advance invariant: a step's start never decreases, so the
// sweep always terminates; the round cap is a defensive net that turns
// non-termination bugs into an explicit error instead of a hang.
// ==========================================

use crate::calendar::{CalendarError, WorkCalendar, WorkInterval};
use crate::config::ScheduleConfig;
use crate::domain::WorkOrderInput;
use crate::engine::availability::{CommittedInterval, MachineTimelineState};
use crate::engine::cascade::CascadeCalculator;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, instrument, warn};

// ==========================================
// SchedulingError
// ==========================================
#[derive(Error, Debug)]
pub enum SchedulingError {
    /// The displacement sweep exceeded its round cap. Unreachable under
    /// the monotonic advance invariant; surfaced instead of looping.
    #[error("machine displacement did not converge after {rounds} rounds (cap {cap})")]
    DisplacementDiverged { rounds: usize, cap: usize },

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

// ==========================================
// ScheduledStep - one finalized route step
// ==========================================
#[derive(Debug, Clone)]
pub struct ScheduledStep {
    pub step_id: i64,
    pub order_id: i64,
    pub order_code: u32,
    pub position: u32,
    pub process_label: String,
    pub machine_id: Option<i64>,
    pub machine_label: Option<String>,
    pub operator_name: Option<String>,
    pub priority: u32,
    pub quantity: f64,
    pub rate_per_hour: f64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub intervals: Vec<WorkInterval>,
}

// ==========================================
// ProgramTimeline
// ==========================================
#[derive(Debug, Clone)]
pub struct ProgramTimeline {
    /// Steps ordered by (order priority, route position)
    pub steps: Vec<ScheduledStep>,
    /// Displacement rounds the build needed to converge
    pub rounds: usize,
}

impl ProgramTimeline {
    /// Latest interval end across the whole timeline
    pub fn latest_end(&self) -> Option<NaiveDateTime> {
        self.steps.iter().map(|s| s.end).max()
    }
}

// ==========================================
// TimelineBuilder
// ==========================================
pub struct TimelineBuilder<'a> {
    calendar: &'a WorkCalendar,
    config: &'a ScheduleConfig,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(calendar: &'a WorkCalendar, config: &'a ScheduleConfig) -> Self {
        Self { calendar, config }
    }

    /// Build the conflict-free timeline for a full program
    #[instrument(skip(self, orders), fields(orders_count = orders.len()))]
    pub fn build(
        &self,
        orders: &[WorkOrderInput],
        program_start: NaiveDateTime,
    ) -> Result<ProgramTimeline, SchedulingError> {
        let setup = self.config.setup_buffer();

        // Priority ascending; order id breaks ties deterministically
        let mut sorted: Vec<&WorkOrderInput> = orders.iter().collect();
        sorted.sort_by_key(|o| (o.priority, o.order_id));

        // Ideal cascades per order, flattened into scheduled steps with a
        // successor index per same-order chain
        let cascade = CascadeCalculator::new(self.calendar, setup);
        let mut steps: Vec<ScheduledStep> = Vec::new();
        let mut successor: Vec<Option<usize>> = Vec::new();

        for order in &sorted {
            let windows = cascade.compute_cascade(&order.steps, program_start);

            let mut route: Vec<_> = order.steps.iter().collect();
            route.sort_by_key(|s| s.position);

            let mut prev_idx: Option<usize> = None;
            for step in route {
                let Some(window) = windows.get(&step.step_id) else {
                    continue; // unschedulable step: absent from the timeline
                };
                let idx = steps.len();
                steps.push(ScheduledStep {
                    step_id: step.step_id,
                    order_id: order.order_id,
                    order_code: order.order_code,
                    position: step.position,
                    process_label: step.process_label.clone(),
                    machine_id: step.machine_id,
                    machine_label: step.machine_label.clone(),
                    operator_name: step.operator_name.clone(),
                    priority: order.priority,
                    quantity: step.quantity,
                    rate_per_hour: step.rate_per_hour,
                    start: window.start,
                    end: window.end,
                    intervals: window.intervals.clone(),
                });
                successor.push(None);
                if let Some(p) = prev_idx {
                    successor[p] = Some(idx);
                }
                prev_idx = Some(idx);
            }
        }

        if steps.is_empty() {
            return Ok(ProgramTimeline { steps, rounds: 0 });
        }

        // Fixed-point displacement sweep
        let cap = (self.config.displacement_round_cap_factor * steps.len()).max(8);
        let mut rounds = 0usize;

        loop {
            rounds += 1;
            if rounds > cap {
                warn!(rounds, cap, "displacement sweep exceeded its round cap");
                return Err(SchedulingError::DisplacementDiverged { rounds, cap });
            }

            let mut displaced: Vec<usize> = Vec::new();

            // Machine sweep: rebuild every machine timeline from scratch,
            // committing in priority order; conflicting steps move forward
            let mut machines = MachineTimelineState::new();
            let mut by_machine: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
            for (idx, step) in steps.iter().enumerate() {
                if let Some(machine_id) = step.machine_id {
                    by_machine.entry(machine_id).or_default().push(idx);
                }
            }
            for indices in by_machine.values_mut() {
                indices.sort_by_key(|&i| (steps[i].priority, steps[i].order_id, steps[i].position));
            }

            for (machine_id, indices) in &by_machine {
                let timeline = machines.timeline_mut(*machine_id);
                for &idx in indices {
                    let mut moved = false;
                    loop {
                        let check = timeline.check_conflict(
                            steps[idx].start,
                            steps[idx].end,
                            steps[idx].priority,
                            setup,
                        );
                        if !check.has_conflict {
                            break;
                        }
                        // Priority-ordered commits mean the proposal never
                        // outranks a committed step here; it always moves
                        self.reschedule(&mut steps[idx], check.next_free_start)?;
                        moved = true;
                    }
                    timeline.commit(CommittedInterval {
                        step_id: steps[idx].step_id,
                        order_id: steps[idx].order_id,
                        priority: steps[idx].priority,
                        start: steps[idx].start,
                        end: steps[idx].end,
                    });
                    if moved {
                        displaced.push(idx);
                    }
                }
            }

            // Cascade propagation: a displaced step pushes its same-order
            // successors past its new end (plus setup), chain-deep
            let mut cascade_moved = false;
            for &idx in &displaced {
                let mut current = idx;
                while let Some(next) = successor[current] {
                    let min_start = steps[current].end + setup;
                    if steps[next].start >= min_start {
                        break;
                    }
                    self.reschedule(&mut steps[next], min_start)?;
                    cascade_moved = true;
                    current = next;
                }
            }

            if displaced.is_empty() && !cascade_moved {
                debug_assert!(machines.is_overlap_free(setup));
                debug!(rounds, steps_count = steps.len(), "timeline converged");
                return Ok(ProgramTimeline { steps, rounds });
            }
        }
    }

    /// Move a step forward and recompute its intervals
    ///
    /// Never moves a step earlier than its current start (monotonic
    /// advance invariant).
    fn reschedule(
        &self,
        step: &mut ScheduledStep,
        at: NaiveDateTime,
    ) -> Result<(), SchedulingError> {
        let target = if at > step.start { at } else { step.start };
        let conv = self
            .calendar
            .convert_quantity(target, step.quantity, step.rate_per_hour)?;
        step.start = conv
            .intervals
            .first()
            .map(|i| i.start)
            .unwrap_or_else(|| self.calendar.next_working_instant(target));
        step.end = conv.next_available;
        step.intervals = conv.intervals;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProcessStepInput;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn order(order_id: i64, priority: u32, steps: Vec<ProcessStepInput>) -> WorkOrderInput {
        WorkOrderInput {
            order_id,
            order_code: 1000 + order_id as u32,
            description: format!("Order {}", order_id),
            priority,
            steps,
        }
    }

    fn step(id: i64, position: u32, machine: i64, quantity: f64, rate: f64) -> ProcessStepInput {
        ProcessStepInput {
            step_id: id,
            position,
            process_label: format!("P{}", position),
            machine_id: Some(machine),
            machine_label: Some(format!("M{}", machine)),
            operator_name: None,
            quantity,
            rate_per_hour: rate,
        }
    }

    #[test]
    fn test_lower_priority_is_displaced_past_end_plus_setup() {
        let cal = WorkCalendar::default();
        let cfg = ScheduleConfig::default();
        let builder = TimelineBuilder::new(&cal, &cfg);

        // Both orders want machine 1 from Monday 07:45; 20 units at 10/hr
        // is two hours of work
        let orders = vec![
            order(1, 1, vec![step(1, 10, 1, 20.0, 10.0)]),
            order(2, 2, vec![step(2, 10, 1, 20.0, 10.0)]),
        ];
        let timeline = builder.build(&orders, dt(2, 7, 45)).unwrap();

        let s1 = timeline.steps.iter().find(|s| s.step_id == 1).unwrap();
        let s2 = timeline.steps.iter().find(|s| s.step_id == 2).unwrap();

        assert_eq!(s1.start, dt(2, 7, 45));
        assert_eq!(s1.end, dt(2, 9, 45));
        // Priority 2 starts after priority 1's end + 30 minute setup
        assert_eq!(s2.start, dt(2, 10, 15));
        assert_eq!(s2.end, dt(2, 12, 15));
    }

    #[test]
    fn test_displacement_propagates_to_downstream_steps() {
        let cal = WorkCalendar::default();
        let cfg = ScheduleConfig::default();
        let builder = TimelineBuilder::new(&cal, &cfg);

        // Order 2's first step loses machine 1 to order 1; its second step
        // (machine 2, otherwise free) must still respect the chain
        let orders = vec![
            order(1, 1, vec![step(1, 10, 1, 45.0, 10.0)]),
            order(
                2,
                2,
                vec![step(2, 10, 1, 20.0, 10.0), step(3, 20, 2, 20.0, 10.0)],
            ),
        ];
        let timeline = builder.build(&orders, dt(2, 7, 45)).unwrap();

        let s1 = timeline.steps.iter().find(|s| s.step_id == 1).unwrap();
        let s2 = timeline.steps.iter().find(|s| s.step_id == 2).unwrap();
        let s3 = timeline.steps.iter().find(|s| s.step_id == 3).unwrap();

        // 45 units at 10/hr from 07:45 exhaust at 12:15
        assert_eq!(s1.end, dt(2, 12, 15));
        // Step 2 pushed past step 1's end + setup; 20 units straddle lunch
        assert_eq!(s2.start, dt(2, 12, 45));
        assert_eq!(s2.end, dt(2, 15, 45));
        // Chain propagation: step 3 starts only after step 2 ends + setup
        assert_eq!(s3.start, dt(2, 16, 15));
        assert_eq!(s3.end, dt(3, 8, 15));
    }

    #[test]
    fn test_no_machine_steps_keep_cascade_dates() {
        let cal = WorkCalendar::default();
        let cfg = ScheduleConfig::default();
        let builder = TimelineBuilder::new(&cal, &cfg);

        let mut free_step = step(1, 10, 1, 20.0, 10.0);
        free_step.machine_id = None;
        free_step.machine_label = None;

        let orders = vec![order(1, 1, vec![free_step])];
        let timeline = builder.build(&orders, dt(2, 7, 45)).unwrap();
        assert_eq!(timeline.steps[0].start, dt(2, 7, 45));
        assert_eq!(timeline.rounds, 1);
    }

    #[test]
    fn test_empty_program_builds_empty_timeline() {
        let cal = WorkCalendar::default();
        let cfg = ScheduleConfig::default();
        let builder = TimelineBuilder::new(&cal, &cfg);
        let timeline = builder.build(&[], dt(2, 7, 45)).unwrap();
        assert!(timeline.steps.is_empty());
    }
}
