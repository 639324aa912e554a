// ==========================================
// Job-Shop APS - Program API
// ==========================================
// Business interface over the scheduling engines for one program:
// order assignment, timeline generation, end-date derivation and
// fragment materialization. Inputs are loaded upfront, engine work is
// pure, outputs are written in one batch.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::ProductionProgram;
use crate::engine::{ProductionScheduler, TimelineData, TimelineItem, TIMELINE_TIME_FORMAT};
use crate::repository::{
    ProgramRepository, TaskRepository, WorkOrderRepository,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ==========================================
// Outcome types
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedOrder {
    pub order_code: u32,
    pub reason: String,
}

/// Per-item result of a batch assignment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddOrdersOutcome {
    pub added: Vec<u32>,
    pub rejected: Vec<RejectedOrder>,
}

/// Result of a fragment materialization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentationOutcome {
    pub tasks_written: usize,
    pub reports_created: usize,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineLoadEntry {
    pub order_code: u32,
    pub process_label: String,
    pub estimated_hours: f64,
}

/// Load of one machine inside one program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineLoad {
    pub machine_id: i64,
    pub total_hours: f64,
    pub breakdown: Vec<MachineLoadEntry>,
}

// ==========================================
// ProgramApi
// ==========================================
pub struct ProgramApi {
    scheduler: Arc<ProductionScheduler>,
    programs: Arc<ProgramRepository>,
    orders: Arc<WorkOrderRepository>,
    tasks: Arc<TaskRepository>,
}

impl ProgramApi {
    pub fn new(
        scheduler: Arc<ProductionScheduler>,
        programs: Arc<ProgramRepository>,
        orders: Arc<WorkOrderRepository>,
        tasks: Arc<TaskRepository>,
    ) -> Self {
        Self {
            scheduler,
            programs,
            orders,
            tasks,
        }
    }

    // ==========================================
    // Program lifecycle
    // ==========================================

    /// Create a program starting on `start_date`
    pub fn create_program(
        &self,
        start_date: NaiveDate,
        actor: Option<&str>,
    ) -> ApiResult<ProductionProgram> {
        let now = Local::now().naive_local();
        let program = self.programs.create(start_date, actor, now)?;
        info!(program_id = program.program_id, name = %program.name, "program created");
        Ok(program)
    }

    pub fn get_program(&self, program_id: i64) -> ApiResult<ProductionProgram> {
        Ok(self.programs.find(program_id)?)
    }

    // ==========================================
    // Order assignment
    // ==========================================

    /// Assign one work order to a program
    ///
    /// Rejected synchronously - before any mutation - when the order is
    /// unknown, not in a releasable status, or already assigned.
    pub fn add_work_order(
        &self,
        program_id: i64,
        order_code: u32,
        priority: u32,
    ) -> ApiResult<()> {
        let order = self
            .orders
            .find_by_code(order_code)?
            .ok_or_else(|| ApiError::NotFound(format!("WorkOrder (code={})", order_code)))?;

        if !order.status.is_releasable() {
            return Err(ApiError::IneligibleOrderStatus {
                order_code,
                status: order.status,
            });
        }
        if self.programs.assignment_exists(program_id, order.order_id)? {
            return Err(ApiError::DuplicateAssignment { order_code });
        }

        self.programs.add_order(program_id, order.order_id, priority)?;
        Ok(())
    }

    /// Assign a batch of work orders, reporting per-item outcomes
    ///
    /// Partial failure is never hidden: every rejected order appears in
    /// the outcome with its reason. The derived end date is refreshed
    /// once when at least one order landed.
    #[instrument(skip(self, requests), fields(requests_count = requests.len()))]
    pub fn add_work_orders(
        &self,
        program_id: i64,
        requests: &[(u32, u32)], // (order_code, priority)
    ) -> ApiResult<AddOrdersOutcome> {
        let mut outcome = AddOrdersOutcome::default();

        for &(order_code, priority) in requests {
            match self.add_work_order(program_id, order_code, priority) {
                Ok(()) => outcome.added.push(order_code),
                Err(err) => {
                    warn!(order_code, %err, "order assignment rejected");
                    outcome.rejected.push(RejectedOrder {
                        order_code,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if !outcome.added.is_empty() {
            self.refresh_end_date(program_id)?;
        }

        info!(
            program_id,
            added = outcome.added.len(),
            rejected = outcome.rejected.len(),
            "batch assignment finished"
        );
        Ok(outcome)
    }

    /// Change an assignment's priority and rederive the end date
    pub fn set_priority(&self, program_id: i64, order_id: i64, priority: u32) -> ApiResult<()> {
        self.programs.update_priority(program_id, order_id, priority)?;
        self.refresh_end_date(program_id)?;
        Ok(())
    }

    /// Reassign a step's machine/rate and rederive the end date
    pub fn update_step_assignment(
        &self,
        program_id: i64,
        step_id: i64,
        machine_id: Option<i64>,
        rate_per_hour: Option<f64>,
    ) -> ApiResult<()> {
        self.orders
            .update_step_assignment(step_id, machine_id, rate_per_hour)?;
        self.refresh_end_date(program_id)?;
        Ok(())
    }

    // ==========================================
    // Scheduling operations
    // ==========================================

    /// Derive, persist and return the program end date
    pub fn calculate_program_end_date(&self, program_id: i64) -> ApiResult<NaiveDate> {
        let program = self.programs.find(program_id)?;
        let inputs = self.programs.load_order_inputs(program_id)?;
        let timeline = self.scheduler.build_timeline(&inputs, program.start_date)?;
        let end_date = self.scheduler.program_end_date(program.start_date, &timeline);

        let now = Local::now().naive_local();
        self.programs
            .update_end_date(program_id, end_date, None, now)?;
        Ok(end_date)
    }

    fn refresh_end_date(&self, program_id: i64) -> ApiResult<()> {
        self.calculate_program_end_date(program_id)?;
        Ok(())
    }

    /// Project the program schedule for UI/reporting consumption
    ///
    /// Continuation fragments created by day closes are appended as
    /// full-day items so the timeline shows carried-over work.
    #[instrument(skip(self))]
    pub fn generate_timeline_data(&self, program_id: i64) -> ApiResult<TimelineData> {
        let program = self.programs.find(program_id)?;
        let inputs = self.programs.load_order_inputs(program_id)?;
        let timeline = self.scheduler.build_timeline(&inputs, program.start_date)?;
        let mut data = self.scheduler.timeline_data(&inputs, &timeline);

        // Group ids keyed by order code, for attaching continuation items
        let group_ids: std::collections::HashMap<u32, String> = data
            .groups
            .iter()
            .map(|g| (g.order_code, g.id.clone()))
            .collect();

        let calendar = self.scheduler.calendar();
        for row in self.tasks.continuations_with_context(program_id)? {
            let task = &row.task;
            let day_start = task.task_date.and_time(calendar.workday_start);
            let day_end = task
                .task_date
                .and_time(calendar.workday_end_time(task.task_date));
            data.items.push(TimelineItem {
                id: format!("frag_{}", task.task_id),
                group_id: group_ids.get(&row.order_code).cloned().unwrap_or_default(),
                process_id: format!("proc_{}", task.step_id),
                name: format!("{} (Continuation)", row.process_label),
                start_time: day_start.format(TIMELINE_TIME_FORMAT).to_string(),
                end_time: day_end.format(TIMELINE_TIME_FORMAT).to_string(),
                total_quantity: task.total_day_quantity(),
                interval_quantity: task.total_day_quantity(),
                remaining_quantity: 0.0,
                rate_per_hour: 0.0,
                machine: row
                    .machine_code
                    .clone()
                    .unwrap_or_else(|| "Unassigned".to_string()),
                operator: row
                    .operator_name
                    .clone()
                    .unwrap_or_else(|| "Unassigned".to_string()),
                assigned: row.operator_name.is_some(),
                is_continuation: true,
            });
        }

        Ok(data)
    }

    /// Materialize daily task records for the whole program
    ///
    /// The timeline is rebuilt from current inputs, sliced per day and
    /// written atomically; with `force` every prior task and report of
    /// the program is deleted first (full replace). Re-running in forced
    /// mode with unchanged inputs yields the same rows.
    #[instrument(skip(self))]
    pub fn create_fragmented_tasks(
        &self,
        program_id: i64,
        force: bool,
    ) -> ApiResult<FragmentationOutcome> {
        let program = self.programs.find(program_id)?;
        let inputs = self.programs.load_order_inputs(program_id)?;

        let timeline = self.scheduler.build_timeline(&inputs, program.start_date)?;
        let fragments = self.scheduler.fragment(&timeline);
        let end_date = self.scheduler.program_end_date(program.start_date, &timeline);
        let report_dates = self.scheduler.working_days(program.start_date, end_date);

        let now = Local::now().naive_local();
        let outcome = self.tasks.replace_program_tasks(
            program_id,
            &fragments,
            &report_dates,
            force,
            now,
        )?;
        self.programs
            .update_end_date(program_id, end_date, None, now)?;

        info!(
            program_id,
            tasks_written = outcome.tasks_written,
            reports_created = outcome.reports_created,
            %end_date,
            "fragmented tasks materialized"
        );
        Ok(FragmentationOutcome {
            tasks_written: outcome.tasks_written,
            reports_created: outcome.reports_created,
            end_date,
        })
    }

    // ==========================================
    // Machine load
    // ==========================================

    /// Hours of work one machine carries inside a program
    pub fn machine_load(&self, program_id: i64, machine_id: i64) -> ApiResult<MachineLoad> {
        let inputs = self.programs.load_order_inputs(program_id)?;

        let mut breakdown = Vec::new();
        let mut total_hours = 0.0;
        for order in &inputs {
            for step in &order.steps {
                if step.machine_id != Some(machine_id) || !step.is_schedulable() {
                    continue;
                }
                let hours = step.quantity / step.rate_per_hour;
                breakdown.push(MachineLoadEntry {
                    order_code: order.order_code,
                    process_label: step.process_label.clone(),
                    estimated_hours: (hours * 100.0).round() / 100.0,
                });
                total_hours += hours;
            }
        }

        Ok(MachineLoad {
            machine_id,
            total_hours: (total_hours * 100.0).round() / 100.0,
            breakdown,
        })
    }
}
