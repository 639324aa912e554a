// ==========================================
// Job-Shop APS - Daily task repository
// ==========================================
// Owns the program-day ledger: fragmented_task, task_execution and
// daily_report. The two multi-row flows (fragment replacement, day
// close) each run inside a single transaction - they either commit
// whole or leave the ledger untouched.
// ==========================================

use crate::domain::types::{ExecutionState, ReportState, TaskState};
use crate::domain::{DailyReport, FragmentedTask, TaskExecution};
use crate::engine::DayFragment;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{fmt_date, fmt_datetime};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::info;

// ==========================================
// Outcome / row types
// ==========================================

/// Result of a fragment replacement run
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceOutcome {
    pub tasks_written: usize,
    pub reports_created: usize,
}

/// One task processed by a day close
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTask {
    pub task_id: i64,
    pub continuation_task_id: i64,
    pub pending_quantity: f64,
}

/// Result of a committed day close
#[derive(Debug, Clone, PartialEq)]
pub struct DayCloseOutcome {
    pub closed: Vec<ClosedTask>,
    pub next_working_day: NaiveDate,
}

/// A task joined with its order/process/machine context
#[derive(Debug, Clone)]
pub struct TaskContextRow {
    pub task: FragmentedTask,
    pub order_code: u32,
    pub order_description: String,
    pub process_label: String,
    pub machine_code: Option<String>,
    pub unit_weight_kg: f64,
    pub operator_name: Option<String>,
}

/// Values for one production history entry
#[derive(Debug, Clone)]
pub struct ExecutionDraft {
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub quantity_produced: f64,
    pub operator_id: Option<i64>,
    pub state: ExecutionState,
}

// ==========================================
// TaskRepository
// ==========================================
pub struct TaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaskRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    const TASK_COLUMNS: &'static str = "task_id, step_id, program_id, parent_task_id, operator_id, \
        task_date, planned_start, planned_end, quantity_assigned, quantity_carried_over, \
        quantity_completed, kilos_produced, units_produced, state, is_continuation, \
        fragmentation_depth, observations, created_at, updated_at";

    fn map_task(row: &Row) -> rusqlite::Result<FragmentedTask> {
        let state_raw: String = row.get(13)?;
        let state = TaskState::from_str(&state_raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, e.into()))?;
        Ok(FragmentedTask {
            task_id: row.get(0)?,
            step_id: row.get(1)?,
            program_id: row.get(2)?,
            parent_task_id: row.get(3)?,
            operator_id: row.get(4)?,
            task_date: row.get(5)?,
            planned_start: row.get(6)?,
            planned_end: row.get(7)?,
            quantity_assigned: row.get(8)?,
            quantity_carried_over: row.get(9)?,
            quantity_completed: row.get(10)?,
            kilos_produced: row.get(11)?,
            units_produced: row.get(12)?,
            state,
            is_continuation: row.get(14)?,
            fragmentation_depth: row.get(15)?,
            observations: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }

    fn map_report(row: &Row) -> rusqlite::Result<DailyReport> {
        let state_raw: String = row.get(3)?;
        let state = ReportState::from_str(&state_raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
        Ok(DailyReport {
            report_id: row.get(0)?,
            program_id: row.get(1)?,
            report_date: row.get(2)?,
            state,
            closed_by: row.get(4)?,
            closed_at: row.get(5)?,
            closing_notes: row.get(6)?,
        })
    }

    // ==========================================
    // Fragment replacement (atomic)
    // ==========================================

    /// Write a program's daily fragments and reports in one transaction
    ///
    /// `force` first deletes every prior task and report of the program
    /// (full replace, not incremental merge). Without `force`, fragments
    /// upsert by (step, date) - update-or-create resets the planned
    /// window, assigned quantity and progress, like a fresh plan.
    /// Daily reports are get-or-create, defaulting to OPEN.
    pub fn replace_program_tasks(
        &self,
        program_id: i64,
        fragments: &[DayFragment],
        report_dates: &[NaiveDate],
        force: bool,
        now: NaiveDateTime,
    ) -> RepositoryResult<ReplaceOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        if force {
            tx.execute(
                "DELETE FROM fragmented_task WHERE program_id = ?1",
                params![program_id],
            )?;
            tx.execute(
                "DELETE FROM daily_report WHERE program_id = ?1",
                params![program_id],
            )?;
        }

        let mut tasks_written = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO fragmented_task
                       (step_id, program_id, task_date, planned_start, planned_end,
                        quantity_assigned, quantity_carried_over, quantity_completed,
                        state, is_continuation, fragmentation_depth, created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, 'PENDING', 0, 0, ?7, ?7)
                   ON CONFLICT(step_id, task_date) DO UPDATE SET
                       planned_start = ?4,
                       planned_end = ?5,
                       quantity_assigned = ?6,
                       quantity_carried_over = 0,
                       quantity_completed = 0,
                       state = 'PENDING',
                       is_continuation = 0,
                       updated_at = ?7"#,
            )?;
            for fragment in fragments {
                stmt.execute(params![
                    fragment.step_id,
                    program_id,
                    fmt_date(fragment.date),
                    fmt_datetime(fragment.start),
                    fmt_datetime(fragment.end),
                    fragment.quantity,
                    fmt_datetime(now),
                ])?;
                tasks_written += 1;
            }
        }

        let mut reports_created = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"INSERT OR IGNORE INTO daily_report (program_id, report_date, state)
                   VALUES (?1, ?2, 'OPEN')"#,
            )?;
            for date in report_dates {
                reports_created += stmt.execute(params![program_id, fmt_date(*date)])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(program_id, tasks_written, reports_created, "program fragments replaced");
        Ok(ReplaceOutcome {
            tasks_written,
            reports_created,
        })
    }

    // ==========================================
    // Day close (atomic)
    // ==========================================

    /// Close one program day: continue unfinished tasks and write the
    /// CLOSED report, all-or-nothing
    ///
    /// Open tasks with positive pending quantity become CONTINUED; the
    /// remainder lands on `next_working_day`, as a new child fragment or
    /// accumulated into an already-planned fragment for the same step.
    pub fn finalize_day(
        &self,
        program_id: i64,
        date: NaiveDate,
        next_working_day: NaiveDate,
        closed_by: &str,
        notes: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<DayCloseOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        // A closed day never reopens and never double-processes
        let existing_state: Option<String> = tx
            .query_row(
                "SELECT state FROM daily_report WHERE program_id = ?1 AND report_date = ?2",
                params![program_id, fmt_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        if existing_state.as_deref() == Some("CLOSED") {
            return Err(RepositoryError::InvalidStateTransition {
                from: "CLOSED".to_string(),
                to: "CLOSED".to_string(),
            });
        }

        let open_tasks: Vec<FragmentedTask> = {
            let mut stmt = tx.prepare(&format!(
                r#"SELECT {} FROM fragmented_task
                   WHERE program_id = ?1 AND task_date = ?2
                     AND state IN ('PENDING', 'IN_PROGRESS')
                   ORDER BY task_id"#,
                Self::TASK_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![program_id, fmt_date(date)], Self::map_task)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut closed = Vec::new();
        for task in &open_tasks {
            let pending = task.pending_quantity();
            if pending <= 0.0 {
                continue;
            }

            tx.execute(
                "UPDATE fragmented_task SET state = 'CONTINUED', updated_at = ?2 WHERE task_id = ?1",
                params![task.task_id, fmt_datetime(now)],
            )?;

            // A fragment may already be planned for (step, next day); the
            // remainder then accumulates as carried-over quantity instead
            // of violating the (step, date) uniqueness
            let existing_next: Option<i64> = tx
                .query_row(
                    "SELECT task_id FROM fragmented_task WHERE step_id = ?1 AND task_date = ?2",
                    params![task.step_id, fmt_date(next_working_day)],
                    |row| row.get(0),
                )
                .optional()?;

            let continuation_task_id = match existing_next {
                Some(next_id) => {
                    tx.execute(
                        r#"UPDATE fragmented_task
                           SET quantity_carried_over = quantity_carried_over + ?2,
                               updated_at = ?3
                           WHERE task_id = ?1"#,
                        params![next_id, pending, fmt_datetime(now)],
                    )?;
                    next_id
                }
                None => {
                    tx.execute(
                        r#"INSERT INTO fragmented_task
                               (step_id, program_id, parent_task_id, task_date,
                                quantity_assigned, state, is_continuation,
                                fragmentation_depth, created_at, updated_at)
                           VALUES (?1, ?2, ?3, ?4, ?5, 'PENDING', 1, ?6, ?7, ?7)"#,
                        params![
                            task.step_id,
                            program_id,
                            task.task_id,
                            fmt_date(next_working_day),
                            pending,
                            task.fragmentation_depth + 1,
                            fmt_datetime(now),
                        ],
                    )?;
                    tx.last_insert_rowid()
                }
            };

            closed.push(ClosedTask {
                task_id: task.task_id,
                continuation_task_id,
                pending_quantity: pending,
            });
        }

        tx.execute(
            r#"INSERT INTO daily_report
                   (program_id, report_date, state, closed_by, closed_at, closing_notes)
               VALUES (?1, ?2, 'CLOSED', ?3, ?4, ?5)
               ON CONFLICT(program_id, report_date) DO UPDATE SET
                   state = 'CLOSED', closed_by = ?3, closed_at = ?4, closing_notes = ?5"#,
            params![
                program_id,
                fmt_date(date),
                closed_by,
                fmt_datetime(now),
                notes
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            program_id,
            %date,
            continued = closed.len(),
            "day closed"
        );
        Ok(DayCloseOutcome {
            closed,
            next_working_day,
        })
    }

    // ==========================================
    // Production entry (atomic)
    // ==========================================

    /// Persist a task's updated progress together with its history entry
    pub fn record_production(
        &self,
        task: &FragmentedTask,
        execution: &ExecutionDraft,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r#"UPDATE fragmented_task
               SET operator_id = ?2, quantity_completed = ?3, kilos_produced = ?4,
                   units_produced = ?5, state = ?6, observations = ?7, updated_at = ?8
               WHERE task_id = ?1"#,
            params![
                task.task_id,
                task.operator_id,
                task.quantity_completed,
                task.kilos_produced,
                task.units_produced,
                task.state.to_string(),
                task.observations,
                fmt_datetime(task.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "FragmentedTask".to_string(),
                id: task.task_id.to_string(),
            });
        }

        tx.execute(
            r#"INSERT INTO task_execution
                   (task_id, started_at, ended_at, quantity_produced, operator_id, state)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                task.task_id,
                fmt_datetime(execution.started_at),
                fmt_datetime(execution.ended_at),
                execution.quantity_produced,
                execution.operator_id,
                execution.state.to_string(),
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    // ==========================================
    // Queries
    // ==========================================

    pub fn find_task(&self, task_id: i64) -> RepositoryResult<FragmentedTask> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM fragmented_task WHERE task_id = ?1",
                Self::TASK_COLUMNS
            ),
            params![task_id],
            Self::map_task,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "FragmentedTask".to_string(),
            id: task_id.to_string(),
        })
    }

    pub fn tasks_for_date(
        &self,
        program_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<FragmentedTask>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM fragmented_task
               WHERE program_id = ?1 AND task_date = ?2
               ORDER BY task_id"#,
            Self::TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![program_id, fmt_date(date)], Self::map_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn tasks_for_program(&self, program_id: i64) -> RepositoryResult<Vec<FragmentedTask>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM fragmented_task
               WHERE program_id = ?1
               ORDER BY task_date, fragmentation_depth, task_id"#,
            Self::TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![program_id], Self::map_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Continuation fragments of a program, for timeline merging
    pub fn continuation_tasks(&self, program_id: i64) -> RepositoryResult<Vec<FragmentedTask>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM fragmented_task
               WHERE program_id = ?1 AND is_continuation = 1
               ORDER BY task_date, task_id"#,
            Self::TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![program_id], Self::map_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Earliest date with tasks, used as the default report date
    pub fn first_task_date(&self, program_id: i64) -> RepositoryResult<Option<NaiveDate>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT MIN(task_date) FROM fragmented_task WHERE program_id = ?1",
                params![program_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        raw.map(|s| crate::repository::parse_date(&s)).transpose()
    }

    /// Tasks of one date joined with order/process/machine context
    pub fn tasks_with_context(
        &self,
        program_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TaskContextRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"{} WHERE t.program_id = ?1 AND t.task_date = ?2
               ORDER BY w.order_code, s.position"#,
            Self::CONTEXT_SELECT
        ))?;
        let rows = stmt
            .query_map(params![program_id, fmt_date(date)], Self::map_context)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    const CONTEXT_SELECT: &'static str =
        r#"SELECT t.task_id, t.step_id, t.program_id, t.parent_task_id, t.operator_id,
                  t.task_date, t.planned_start, t.planned_end, t.quantity_assigned,
                  t.quantity_carried_over, t.quantity_completed, t.kilos_produced,
                  t.units_produced, t.state, t.is_continuation, t.fragmentation_depth,
                  t.observations, t.created_at, t.updated_at,
                  w.order_code, w.description, s.process_label, m.machine_code,
                  w.unit_weight_kg, o.name
           FROM fragmented_task t
           JOIN process_step s ON s.step_id = t.step_id
           JOIN work_order w ON w.order_id = s.order_id
           LEFT JOIN machine m ON m.machine_id = s.machine_id
           LEFT JOIN operator o ON o.operator_id = t.operator_id"#;

    fn map_context(row: &Row) -> rusqlite::Result<TaskContextRow> {
        let task = Self::map_task(row)?;
        Ok(TaskContextRow {
            task,
            order_code: row.get::<_, i64>(19)? as u32,
            order_description: row.get(20)?,
            process_label: row.get(21)?,
            machine_code: row.get(22)?,
            unit_weight_kg: row.get(23)?,
            operator_name: row.get(24)?,
        })
    }

    /// One task joined with its order/process/machine context
    pub fn task_with_context(&self, task_id: i64) -> RepositoryResult<TaskContextRow> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("{} WHERE t.task_id = ?1", Self::CONTEXT_SELECT),
            params![task_id],
            Self::map_context,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "FragmentedTask".to_string(),
            id: task_id.to_string(),
        })
    }

    /// Continuation fragments joined with context, for timeline merging
    pub fn continuations_with_context(
        &self,
        program_id: i64,
    ) -> RepositoryResult<Vec<TaskContextRow>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"{} WHERE t.program_id = ?1 AND t.is_continuation = 1
               ORDER BY t.task_date, t.task_id"#,
            Self::CONTEXT_SELECT
        ))?;
        let rows = stmt
            .query_map(params![program_id], Self::map_context)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Follow a continuation chain downward from one task
    ///
    /// Fan-in is 1 (a fragment has at most one parent), so the chain is a
    /// simple list that terminates at the fragment without children.
    pub fn task_chain(&self, task_id: i64) -> RepositoryResult<Vec<FragmentedTask>> {
        let first = self.find_task(task_id)?;
        let mut current_id = first.task_id;
        let mut chain = vec![first];
        loop {
            let next = {
                let conn = self.get_conn()?;
                conn.query_row(
                    &format!(
                        "SELECT {} FROM fragmented_task WHERE parent_task_id = ?1",
                        Self::TASK_COLUMNS
                    ),
                    params![current_id],
                    Self::map_task,
                )
                .optional()?
            };
            match next {
                Some(task) => {
                    current_id = task.task_id;
                    chain.push(task);
                }
                None => break,
            }
        }
        Ok(chain)
    }

    // ==========================================
    // Daily reports
    // ==========================================

    pub fn daily_report(
        &self,
        program_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Option<DailyReport>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                r#"SELECT report_id, program_id, report_date, state, closed_by, closed_at, closing_notes
                   FROM daily_report WHERE program_id = ?1 AND report_date = ?2"#,
                params![program_id, fmt_date(date)],
                Self::map_report,
            )
            .optional()?)
    }

    pub fn reports_for_program(&self, program_id: i64) -> RepositoryResult<Vec<DailyReport>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT report_id, program_id, report_date, state, closed_by, closed_at, closing_notes
               FROM daily_report WHERE program_id = ?1 ORDER BY report_date"#,
        )?;
        let reports = stmt
            .query_map(params![program_id], Self::map_report)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    // ==========================================
    // Executions
    // ==========================================

    pub fn executions_for_date(
        &self,
        program_id: i64,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<TaskExecution>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT e.execution_id, e.task_id, e.started_at, e.ended_at,
                      e.quantity_produced, e.operator_id, e.state
               FROM task_execution e
               JOIN fragmented_task t ON t.task_id = e.task_id
               WHERE t.program_id = ?1 AND t.task_date = ?2
               ORDER BY e.started_at, e.execution_id"#,
        )?;
        let executions = stmt
            .query_map(params![program_id, fmt_date(date)], |row| {
                let state_raw: String = row.get(6)?;
                let state = ExecutionState::from_str(&state_raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into())
                })?;
                Ok(TaskExecution {
                    execution_id: row.get(0)?,
                    task_id: row.get(1)?,
                    started_at: row.get(2)?,
                    ended_at: row.get(3)?,
                    quantity_produced: row.get(4)?,
                    operator_id: row.get(5)?,
                    state,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(executions)
    }

    /// (total, completed) task counts for a program
    pub fn completion_stats(&self, program_id: i64) -> RepositoryResult<(usize, usize)> {
        let conn = self.get_conn()?;
        conn.query_row(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(CASE WHEN state = 'COMPLETED' THEN 1 ELSE 0 END), 0)
               FROM fragmented_task WHERE program_id = ?1"#,
            params![program_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)? as usize,
                    row.get::<_, i64>(1)? as usize,
                ))
            },
        )
        .map_err(Into::into)
    }
}

// Day-close preview uses the same open-task criteria as the committed
// close; keep the filter in one place for both paths.
pub(crate) fn is_open_with_pending(task: &FragmentedTask) -> bool {
    task.state.is_open() && task.pending_quantity() > 0.0
}
