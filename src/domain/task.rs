// ==========================================
// Job-Shop APS - Daily task domain models
// ==========================================
// FragmentedTask is the durable daily unit of work: one row per
// (process step, calendar date). Continuations form a singly-linked
// chain through parent_task_id - at most one parent, never a cycle -
// with an explicit depth counter.
// ==========================================

use crate::domain::types::{ExecutionState, ReportState, TaskState};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// FragmentedTask
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentedTask {
    pub task_id: i64,
    pub step_id: i64,
    pub program_id: i64,
    pub parent_task_id: Option<i64>, // continuation chain, fan-in 1
    pub operator_id: Option<i64>,

    pub task_date: NaiveDate,
    pub planned_start: Option<NaiveDateTime>,
    pub planned_end: Option<NaiveDateTime>,

    pub quantity_assigned: f64,
    pub quantity_carried_over: f64, // pending quantity inherited from prior days
    pub quantity_completed: f64,
    pub kilos_produced: f64,
    pub units_produced: f64,

    pub state: TaskState,
    pub is_continuation: bool,
    pub fragmentation_depth: i32,
    pub observations: String,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FragmentedTask {
    /// Total quantity expected for the day (planned plus carry-over)
    pub fn total_day_quantity(&self) -> f64 {
        self.quantity_assigned + self.quantity_carried_over
    }

    /// Quantity still outstanding for the day
    pub fn pending_quantity(&self) -> f64 {
        (self.total_day_quantity() - self.quantity_completed).max(0.0)
    }

    /// Completion percentage, clamped to [0, 100]
    pub fn completion_percent(&self) -> f64 {
        let total = self.total_day_quantity();
        if total <= 0.0 {
            return 0.0;
        }
        (self.quantity_completed / total * 100.0).clamp(0.0, 100.0)
    }

    /// Whether the day quantity has been fully produced
    pub fn is_fulfilled(&self) -> bool {
        self.quantity_completed >= self.total_day_quantity()
    }
}

// ==========================================
// TaskExecution - production history entry
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub execution_id: i64,
    pub task_id: i64,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub quantity_produced: f64,
    pub operator_id: Option<i64>,
    pub state: ExecutionState,
}

// ==========================================
// DailyReport - per (program, date) sign-off record
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub report_id: i64,
    pub program_id: i64,
    pub report_date: NaiveDate,
    pub state: ReportState,
    pub closed_by: Option<String>,
    pub closed_at: Option<NaiveDateTime>,
    pub closing_notes: String,
}

impl DailyReport {
    pub fn is_closed(&self) -> bool {
        self.state == ReportState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn task(assigned: f64, carried: f64, completed: f64) -> FragmentedTask {
        let now = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        FragmentedTask {
            task_id: 1,
            step_id: 1,
            program_id: 1,
            parent_task_id: None,
            operator_id: None,
            task_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            planned_start: None,
            planned_end: None,
            quantity_assigned: assigned,
            quantity_carried_over: carried,
            quantity_completed: completed,
            kilos_produced: 0.0,
            units_produced: 0.0,
            state: TaskState::Pending,
            is_continuation: false,
            fragmentation_depth: 0,
            observations: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_day_quantities() {
        let t = task(80.0, 20.0, 60.0);
        assert_eq!(t.total_day_quantity(), 100.0);
        assert_eq!(t.pending_quantity(), 40.0);
        assert_eq!(t.completion_percent(), 60.0);
        assert!(!t.is_fulfilled());
    }

    #[test]
    fn test_completion_percent_is_clamped() {
        // Over-production must not exceed 100%
        let t = task(50.0, 0.0, 75.0);
        assert_eq!(t.completion_percent(), 100.0);
        assert_eq!(t.pending_quantity(), 0.0);
        assert!(t.is_fulfilled());

        // Zero expected quantity reports zero, not NaN
        let t = task(0.0, 0.0, 0.0);
        assert_eq!(t.completion_percent(), 0.0);
    }
}
