// ==========================================
// Job-Shop APS - Supervisor API
// ==========================================
// Daily supervision over fragmented tasks: the per-date report view,
// production entry, day close with continuations, and the advisory
// edit lock. Every mutation is one transaction against the program-day
// ledger; a closed day rejects all further mutation.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ScheduleConfig;
use crate::domain::types::{ExecutionState, TaskState};
use crate::domain::{FragmentedTask, TaskExecution};
use crate::engine::ProductionScheduler;
use crate::repository::error::RepositoryError;
use crate::repository::task_repo::{is_open_with_pending, ExecutionDraft};
use crate::repository::{
    DayCloseOutcome, ProgramRepository, SupervisorReportRepository, TaskRepository,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

// ==========================================
// View / input types
// ==========================================

/// One task row of the daily supervisor view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub task_id: i64,
    pub step_id: i64,
    pub order_code: u32,
    pub order_description: String,
    pub process_label: String,
    pub machine_code: Option<String>,
    pub operator_name: Option<String>,
    pub quantity_assigned: f64,
    pub quantity_carried_over: f64,
    pub total_day_quantity: f64,
    pub quantity_completed: f64,
    pub pending_quantity: f64,
    pub kilos_produced: f64,
    pub kilos_planned: f64,
    pub state: TaskState,
    pub completion_percent: f64,
    pub is_continuation: bool,
    pub observations: String,
}

/// Daily report view for one (program, date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySupervisorReport {
    pub program_id: i64,
    pub program_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub date: NaiveDate,
    pub is_working_day: bool,
    pub tasks: Vec<TaskRow>,
}

/// Production figures reported for one task
#[derive(Debug, Clone, Default)]
pub struct ProductionEntry {
    pub kilos_produced: Option<f64>,
    pub units_produced: Option<f64>,
    pub operator_id: Option<i64>,
    pub observations: Option<String>,
    pub state: Option<TaskState>,
}

/// Aggregate task counts for one (program, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub completion_percent: f64,
}

/// One unfinished task a day close would continue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTaskPreview {
    pub task_id: i64,
    pub order_code: u32,
    pub process_label: String,
    pub pending_quantity: f64,
    pub completion_percent: f64,
}

/// Day-close preview: computed without committing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayClosePreview {
    pub date: NaiveDate,
    pub next_working_day: NaiveDate,
    pub pending_tasks: Vec<PendingTaskPreview>,
}

// ==========================================
// SupervisorApi
// ==========================================
pub struct SupervisorApi {
    scheduler: Arc<ProductionScheduler>,
    programs: Arc<ProgramRepository>,
    tasks: Arc<TaskRepository>,
    reports: Arc<SupervisorReportRepository>,
    config: ScheduleConfig,
}

impl SupervisorApi {
    pub fn new(
        scheduler: Arc<ProductionScheduler>,
        programs: Arc<ProgramRepository>,
        tasks: Arc<TaskRepository>,
        reports: Arc<SupervisorReportRepository>,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            scheduler,
            programs,
            tasks,
            reports,
            config,
        }
    }

    // ==========================================
    // Daily report view
    // ==========================================

    /// The supervisor view for one date
    ///
    /// Without an explicit date: the first date with tasks, else the
    /// first working day of the program.
    pub fn report_for_date(
        &self,
        program_id: i64,
        date: Option<NaiveDate>,
    ) -> ApiResult<DailySupervisorReport> {
        let program = self.programs.find(program_id)?;
        let calendar = self.scheduler.calendar();

        let date = match date {
            Some(d) => d,
            None => match self.tasks.first_task_date(program_id)? {
                Some(d) => d,
                None if calendar.is_working_day(program.start_date) => program.start_date,
                None => calendar.next_working_day(program.start_date),
            },
        };

        let is_working_day = calendar.is_working_day(date);
        let tasks = if is_working_day {
            self.tasks
                .tasks_with_context(program_id, date)?
                .into_iter()
                .map(|row| TaskRow {
                    task_id: row.task.task_id,
                    step_id: row.task.step_id,
                    order_code: row.order_code,
                    order_description: row.order_description,
                    process_label: row.process_label,
                    machine_code: row.machine_code,
                    operator_name: row.operator_name,
                    quantity_assigned: row.task.quantity_assigned,
                    quantity_carried_over: row.task.quantity_carried_over,
                    total_day_quantity: row.task.total_day_quantity(),
                    quantity_completed: row.task.quantity_completed,
                    pending_quantity: row.task.pending_quantity(),
                    kilos_produced: row.task.kilos_produced,
                    kilos_planned: row.task.quantity_assigned * row.unit_weight_kg,
                    state: row.task.state,
                    completion_percent: row.task.completion_percent(),
                    is_continuation: row.task.is_continuation,
                    observations: row.task.observations.clone(),
                })
                .collect()
        } else {
            Vec::new() // non-working days carry no tasks
        };

        Ok(DailySupervisorReport {
            program_id,
            program_name: program.name,
            start_date: program.start_date,
            end_date: program.end_date,
            date,
            is_working_day,
            tasks,
        })
    }

    /// Aggregate counts for one date
    pub fn daily_summary(&self, program_id: i64, date: NaiveDate) -> ApiResult<DailySummary> {
        let tasks = self.tasks.tasks_for_date(program_id, date)?;
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.state == TaskState::Completed).count();
        let in_progress = tasks
            .iter()
            .filter(|t| t.state == TaskState::InProgress)
            .count();
        let pending = tasks.iter().filter(|t| t.state == TaskState::Pending).count();
        let completion_percent = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Ok(DailySummary {
            total,
            completed,
            in_progress,
            pending,
            completion_percent,
        })
    }

    // ==========================================
    // Production entry
    // ==========================================

    /// Record produced quantities against one task
    ///
    /// Units may be reported directly or derived from produced kilos via
    /// the order's unit weight. The task completes once the day quantity
    /// is covered. Rejected when the day is closed or the report is
    /// locked by another editor.
    #[instrument(skip(self, entry))]
    pub fn register_production(
        &self,
        task_id: i64,
        actor: &str,
        entry: ProductionEntry,
    ) -> ApiResult<FragmentedTask> {
        let row = self.tasks.task_with_context(task_id)?;
        let mut task = row.task;
        let now = Local::now().naive_local();

        // A closed day gates all mutation of its fragments
        if let Some(report) = self.tasks.daily_report(task.program_id, task.task_date)? {
            if report.is_closed() {
                return Err(ApiError::DayAlreadyClosed {
                    date: task.task_date,
                });
            }
        }

        // Advisory edit lock
        let supervisor = self.reports.get_or_create(task.program_id, now)?;
        if !supervisor.can_edit(actor, now) {
            return Err(ApiError::ReportLocked {
                editor: supervisor.current_editor.unwrap_or_default(),
            });
        }

        let units = match (entry.units_produced, entry.kilos_produced) {
            (Some(units), _) => Some(units),
            (None, Some(kilos)) if row.unit_weight_kg > 0.0 => {
                Some((kilos / row.unit_weight_kg).round())
            }
            (None, Some(_)) => None, // kilos without a unit weight: keep units untouched
            (None, None) => None,
        };

        if let Some(kilos) = entry.kilos_produced {
            if kilos < 0.0 {
                return Err(ApiError::InvalidInput(format!(
                    "kilos_produced must not be negative (got {})",
                    kilos
                )));
            }
            task.kilos_produced = kilos;
        }
        if let Some(units) = units {
            if units < 0.0 {
                return Err(ApiError::InvalidInput(format!(
                    "units_produced must not be negative (got {})",
                    units
                )));
            }
            task.units_produced = units;
            task.quantity_completed = units;
        }
        if let Some(operator_id) = entry.operator_id {
            task.operator_id = Some(operator_id);
        }
        if let Some(observations) = entry.observations {
            task.observations = observations;
        }

        task.state = match entry.state {
            Some(state) => state,
            None if task.is_fulfilled() => TaskState::Completed,
            None => TaskState::InProgress,
        };
        task.updated_at = now;

        let entry_instant = task.task_date.and_time(now.time());
        let execution = ExecutionDraft {
            started_at: entry_instant,
            ended_at: entry_instant,
            quantity_produced: task.quantity_completed,
            operator_id: task.operator_id,
            state: if task.state == TaskState::Completed {
                ExecutionState::Completed
            } else {
                ExecutionState::InProgress
            },
        };
        self.tasks.record_production(&task, &execution)?;

        // Refresh the program completion percentage
        let (total, completed) = self.tasks.completion_stats(task.program_id)?;
        let percent = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        self.reports
            .set_completion_percent(task.program_id, percent, now)?;

        info!(
            task_id,
            completed = task.quantity_completed,
            state = %task.state,
            "production recorded"
        );
        Ok(task)
    }

    /// Production history entries of one date
    pub fn execution_timeline(
        &self,
        program_id: i64,
        date: NaiveDate,
    ) -> ApiResult<Vec<TaskExecution>> {
        Ok(self.tasks.executions_for_date(program_id, date)?)
    }

    /// A task's continuation chain, original first
    pub fn task_genealogy(&self, task_id: i64) -> ApiResult<Vec<FragmentedTask>> {
        Ok(self.tasks.task_chain(task_id)?)
    }

    // ==========================================
    // Day close
    // ==========================================

    /// Compute what a day close would do, without committing
    pub fn preview_finalize_day(
        &self,
        program_id: i64,
        date: NaiveDate,
    ) -> ApiResult<DayClosePreview> {
        if let Some(report) = self.tasks.daily_report(program_id, date)? {
            if report.is_closed() {
                return Err(ApiError::DayAlreadyClosed { date });
            }
        }

        let pending_tasks = self
            .tasks
            .tasks_with_context(program_id, date)?
            .into_iter()
            .filter(|row| is_open_with_pending(&row.task))
            .map(|row| PendingTaskPreview {
                task_id: row.task.task_id,
                order_code: row.order_code,
                process_label: row.process_label,
                pending_quantity: row.task.pending_quantity(),
                completion_percent: row.task.completion_percent(),
            })
            .collect();

        Ok(DayClosePreview {
            date,
            next_working_day: self.scheduler.calendar().next_working_day(date),
            pending_tasks,
        })
    }

    /// Close a day: continue unfinished tasks onto the next working day
    /// and write the CLOSED report, all-or-nothing
    #[instrument(skip(self, notes))]
    pub fn finalize_day(
        &self,
        program_id: i64,
        date: NaiveDate,
        actor: &str,
        notes: &str,
    ) -> ApiResult<DayCloseOutcome> {
        // The program must exist; a bad id must not create orphan reports
        self.programs.find(program_id)?;

        let next_working_day = self.scheduler.calendar().next_working_day(date);
        let now = Local::now().naive_local();

        self.tasks
            .finalize_day(program_id, date, next_working_day, actor, notes, now)
            .map_err(|err| match err {
                RepositoryError::InvalidStateTransition { ref from, .. } if from == "CLOSED" => {
                    ApiError::DayAlreadyClosed { date }
                }
                other => other.into(),
            })
    }

    // ==========================================
    // Edit lock
    // ==========================================

    /// Take the advisory edit lock for the configured duration
    pub fn acquire_edit_lock(&self, program_id: i64, actor: &str) -> ApiResult<bool> {
        let now = Local::now().naive_local();
        self.reports.get_or_create(program_id, now)?;
        let until = now + self.config.edit_lock_duration();
        Ok(self.reports.try_acquire_lock(program_id, actor, now, until)?)
    }

    /// Release the edit lock if held by `actor`
    pub fn release_edit_lock(&self, program_id: i64, actor: &str) -> ApiResult<bool> {
        Ok(self.reports.release_lock(program_id, actor)?)
    }
}
