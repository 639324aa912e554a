// ==========================================
// Job-Shop APS - Cascade calculator
// ==========================================
// Responsibility: ideal (machine-unconstrained) timeline for one
// work order's route
// Rule: a downstream step may start as soon as the upstream step has
// produced enough units for it to run at its own rate without starving
// ==========================================

use crate::calendar::{WorkCalendar, WorkInterval};
use crate::domain::ProcessStepInput;
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

// ==========================================
// StepWindow - ideal window of one step
// ==========================================
#[derive(Debug, Clone)]
pub struct StepWindow {
    pub step_id: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub intervals: Vec<WorkInterval>,
}

// ==========================================
// CascadeCalculator
// ==========================================
pub struct CascadeCalculator<'a> {
    calendar: &'a WorkCalendar,
    setup_buffer: Duration,
}

impl<'a> CascadeCalculator<'a> {
    pub fn new(calendar: &'a WorkCalendar, setup_buffer: Duration) -> Self {
        Self {
            calendar,
            setup_buffer,
        }
    }

    /// Compute the ideal cascade for an ordered route
    ///
    /// Step 0 starts at `program_start`. Step i starts once its
    /// predecessor has produced `min(rate_i, quantity_i)` units
    /// (`hours = needed / rate_pred` from the predecessor's start),
    /// plus the setup/handoff buffer. Ends come from the work calendar.
    ///
    /// Steps with a non-positive rate or quantity get no entry; later
    /// steps chain from the closest valid predecessor.
    pub fn compute_cascade(
        &self,
        steps: &[ProcessStepInput],
        program_start: NaiveDateTime,
    ) -> BTreeMap<i64, StepWindow> {
        let mut windows: BTreeMap<i64, StepWindow> = BTreeMap::new();
        let mut prev: Option<(&ProcessStepInput, NaiveDateTime)> = None; // (step, start)

        let mut ordered: Vec<&ProcessStepInput> = steps.iter().collect();
        ordered.sort_by_key(|s| s.position);

        for step in ordered {
            if !step.is_schedulable() {
                continue;
            }

            let start = match prev {
                None => program_start,
                Some((pred, pred_start)) => {
                    let needed_units = step.rate_per_hour.min(step.quantity);
                    let hours = needed_units / pred.rate_per_hour;
                    let lead = Duration::seconds((hours * 3600.0).round() as i64);
                    pred_start + lead + self.setup_buffer
                }
            };

            let conv = match self.calendar.convert_quantity(start, step.quantity, step.rate_per_hour) {
                Ok(conv) => conv,
                Err(_) => continue,
            };

            let window_start = conv
                .intervals
                .first()
                .map(|i| i.start)
                .unwrap_or_else(|| self.calendar.next_working_instant(start));

            windows.insert(
                step.step_id,
                StepWindow {
                    step_id: step.step_id,
                    start: window_start,
                    end: conv.next_available,
                    intervals: conv.intervals,
                },
            );
            prev = Some((step, window_start));
        }

        windows
    }
}
