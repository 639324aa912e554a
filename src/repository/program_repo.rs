// ==========================================
// Job-Shop APS - Production program repository
// ==========================================
// Programs, their order assignments, and the boundary loader that
// resolves foreign references into engine input values.
// ==========================================

use crate::domain::{
    ProcessStepInput, ProductionProgram, ProgramOrderAssignment, WorkOrderInput,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{fmt_date, parse_date, parse_datetime};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct ProgramRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProgramRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_program(row: &Row) -> rusqlite::Result<(i64, String, String, String, Option<String>, Option<String>, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn to_program(
        raw: (i64, String, String, String, Option<String>, Option<String>, String, String),
    ) -> RepositoryResult<ProductionProgram> {
        Ok(ProductionProgram {
            program_id: raw.0,
            name: raw.1,
            start_date: parse_date(&raw.2)?,
            end_date: parse_date(&raw.3)?,
            created_by: raw.4,
            modified_by: raw.5,
            created_at: parse_datetime(&raw.6)?,
            updated_at: parse_datetime(&raw.7)?,
        })
    }

    const PROGRAM_COLUMNS: &'static str = "program_id, name, start_date, end_date, created_by, \
                                           modified_by, created_at, updated_at";

    // ==========================================
    // Programs
    // ==========================================

    /// Create a program with a generated name and the default end date
    pub fn create(
        &self,
        start_date: NaiveDate,
        created_by: Option<&str>,
        now: NaiveDateTime,
    ) -> RepositoryResult<ProductionProgram> {
        let name = ProductionProgram::generate_name(now);
        let end_date = ProductionProgram::default_end_date(start_date);

        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO production_program
                   (name, start_date, end_date, created_by, modified_by, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?4, ?5, ?5)"#,
            params![
                name,
                fmt_date(start_date),
                fmt_date(end_date),
                created_by,
                crate::repository::fmt_datetime(now)
            ],
        )?;

        Ok(ProductionProgram {
            program_id: conn.last_insert_rowid(),
            name,
            start_date,
            end_date,
            created_by: created_by.map(|s| s.to_string()),
            modified_by: created_by.map(|s| s.to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find(&self, program_id: i64) -> RepositoryResult<ProductionProgram> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {} FROM production_program WHERE program_id = ?1",
                    Self::PROGRAM_COLUMNS
                ),
                params![program_id],
                Self::map_program,
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "ProductionProgram".to_string(),
                id: program_id.to_string(),
            })?;
        Self::to_program(raw)
    }

    /// Persist a newly derived end date
    ///
    /// The end date is derived, never authoritative input; the derivation
    /// guarantees end >= start, re-checked here defensively.
    pub fn update_end_date(
        &self,
        program_id: i64,
        end_date: NaiveDate,
        modified_by: Option<&str>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let program = self.find(program_id)?;
        if end_date < program.start_date {
            return Err(RepositoryError::ValidationError(format!(
                "end date {} precedes start date {}",
                end_date, program.start_date
            )));
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"UPDATE production_program
               SET end_date = ?2, modified_by = COALESCE(?3, modified_by), updated_at = ?4
               WHERE program_id = ?1"#,
            params![
                program_id,
                fmt_date(end_date),
                modified_by,
                crate::repository::fmt_datetime(now)
            ],
        )?;
        Ok(())
    }

    // ==========================================
    // Order assignments
    // ==========================================

    pub fn assignment_exists(&self, program_id: i64, order_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM program_order WHERE program_id = ?1 AND order_id = ?2",
                params![program_id, order_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn add_order(
        &self,
        program_id: i64,
        order_id: i64,
        priority: u32,
    ) -> RepositoryResult<ProgramOrderAssignment> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO program_order (program_id, order_id, priority) VALUES (?1, ?2, ?3)",
            params![program_id, order_id, priority as i64],
        )?;
        Ok(ProgramOrderAssignment {
            program_id,
            order_id,
            priority,
        })
    }

    pub fn remove_order(&self, program_id: i64, order_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "DELETE FROM program_order WHERE program_id = ?1 AND order_id = ?2",
            params![program_id, order_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProgramOrderAssignment".to_string(),
                id: format!("{}/{}", program_id, order_id),
            });
        }
        Ok(())
    }

    pub fn update_priority(
        &self,
        program_id: i64,
        order_id: i64,
        priority: u32,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE program_order SET priority = ?3 WHERE program_id = ?1 AND order_id = ?2",
            params![program_id, order_id, priority as i64],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProgramOrderAssignment".to_string(),
                id: format!("{}/{}", program_id, order_id),
            });
        }
        Ok(())
    }

    /// Assignments of one program, priority ascending
    pub fn assignments(&self, program_id: i64) -> RepositoryResult<Vec<ProgramOrderAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT program_id, order_id, priority
               FROM program_order
               WHERE program_id = ?1
               ORDER BY priority, order_id"#,
        )?;
        let assignments = stmt
            .query_map(params![program_id], |row| {
                Ok(ProgramOrderAssignment {
                    program_id: row.get(0)?,
                    order_id: row.get(1)?,
                    priority: row.get::<_, i64>(2)? as u32,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assignments)
    }

    // ==========================================
    // Boundary loader
    // ==========================================

    /// Resolve a program's orders, routes, machines and operator labels
    /// into engine input values, priority ascending
    ///
    /// This is the single place where repository rows become
    /// `WorkOrderInput`; engines never see raw rows.
    pub fn load_order_inputs(&self, program_id: i64) -> RepositoryResult<Vec<WorkOrderInput>> {
        let conn = self.get_conn()?;

        // Operator names per step for timeline annotation
        let mut operator_stmt = conn.prepare(
            r#"SELECT a.step_id, o.name
               FROM operator_assignment a
               JOIN operator o ON o.operator_id = a.operator_id
               WHERE a.program_id = ?1"#,
        )?;
        let operator_names: HashMap<i64, String> = operator_stmt
            .query_map(params![program_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut order_stmt = conn.prepare(
            r#"SELECT w.order_id, w.order_code, w.description, p.priority
               FROM program_order p
               JOIN work_order w ON w.order_id = p.order_id
               WHERE p.program_id = ?1
               ORDER BY p.priority, w.order_id"#,
        )?;
        let orders: Vec<(i64, u32, String, u32)> = order_stmt
            .query_map(params![program_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get::<_, i64>(1)? as u32,
                    row.get(2)?,
                    row.get::<_, i64>(3)? as u32,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut step_stmt = conn.prepare(
            r#"SELECT s.step_id, s.position, s.process_label, s.machine_id, m.description,
                      s.quantity_ordered, s.rate_per_hour
               FROM process_step s
               LEFT JOIN machine m ON m.machine_id = s.machine_id
               WHERE s.order_id = ?1
               ORDER BY s.position"#,
        )?;

        let mut inputs = Vec::with_capacity(orders.len());
        for (order_id, order_code, description, priority) in orders {
            let steps = step_stmt
                .query_map(params![order_id], |row| {
                    Ok(ProcessStepInput {
                        step_id: row.get(0)?,
                        position: row.get::<_, i64>(1)? as u32,
                        process_label: row.get(2)?,
                        machine_id: row.get(3)?,
                        machine_label: row.get(4)?,
                        operator_name: None,
                        quantity: row.get(5)?,
                        rate_per_hour: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let steps = steps
                .into_iter()
                .map(|mut s| {
                    s.operator_name = operator_names.get(&s.step_id).cloned();
                    s
                })
                .collect();

            inputs.push(WorkOrderInput {
                order_id,
                order_code,
                description,
                priority,
                steps,
            });
        }

        Ok(inputs)
    }
}
