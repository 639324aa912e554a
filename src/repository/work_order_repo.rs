// ==========================================
// Job-Shop APS - Work order repository
// ==========================================
// Persists work orders and their routes. A released order is immutable
// except for machine/rate reassignment on individual steps.
// ==========================================

use crate::domain::types::OrderStatus;
use crate::domain::{ProcessStep, WorkOrder};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub struct WorkOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_order(row: &Row) -> rusqlite::Result<(i64, u32, String, String, f64)> {
        Ok((
            row.get(0)?,
            row.get::<_, i64>(1)? as u32,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn to_order(raw: (i64, u32, String, String, f64)) -> RepositoryResult<WorkOrder> {
        let status = OrderStatus::from_str(&raw.3)
            .map_err(|e| RepositoryError::FieldValueError {
                field: "status".to_string(),
                message: e,
            })?;
        Ok(WorkOrder {
            order_id: raw.0,
            order_code: raw.1,
            description: raw.2,
            status,
            unit_weight_kg: raw.4,
        })
    }

    fn map_step(row: &Row) -> rusqlite::Result<ProcessStep> {
        Ok(ProcessStep {
            step_id: row.get(0)?,
            order_id: row.get(1)?,
            position: row.get::<_, i64>(2)? as u32,
            process_label: row.get(3)?,
            machine_id: row.get(4)?,
            rate_per_hour: row.get(5)?,
            quantity_ordered: row.get(6)?,
            quantity_completed: row.get(7)?,
            quantity_lost: row.get(8)?,
        })
    }

    const STEP_COLUMNS: &'static str = "step_id, order_id, position, process_label, machine_id, \
                                        rate_per_hour, quantity_ordered, quantity_completed, quantity_lost";

    // ==========================================
    // Work orders
    // ==========================================

    pub fn insert(
        &self,
        order_code: u32,
        description: &str,
        status: OrderStatus,
        unit_weight_kg: f64,
    ) -> RepositoryResult<WorkOrder> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO work_order (order_code, description, status, unit_weight_kg)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![order_code as i64, description, status.to_string(), unit_weight_kg],
        )?;
        Ok(WorkOrder {
            order_id: conn.last_insert_rowid(),
            order_code,
            description: description.to_string(),
            status,
            unit_weight_kg,
        })
    }

    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<WorkOrder> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"SELECT order_id, order_code, description, status, unit_weight_kg
                   FROM work_order WHERE order_id = ?1"#,
                params![order_id],
                Self::map_order,
            )
            .optional()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: order_id.to_string(),
            })?;
        Self::to_order(raw)
    }

    pub fn find_by_code(&self, order_code: u32) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"SELECT order_id, order_code, description, status, unit_weight_kg
                   FROM work_order WHERE order_code = ?1"#,
                params![order_code as i64],
                Self::map_order,
            )
            .optional()?;
        raw.map(Self::to_order).transpose()
    }

    pub fn update_status(&self, order_id: i64, status: OrderStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE work_order SET status = ?2 WHERE order_id = ?1",
            params![order_id, status.to_string()],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // Route steps
    // ==========================================

    #[allow(clippy::too_many_arguments)]
    pub fn add_step(
        &self,
        order_id: i64,
        position: u32,
        process_label: &str,
        machine_id: Option<i64>,
        rate_per_hour: f64,
        quantity_ordered: f64,
    ) -> RepositoryResult<ProcessStep> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO process_step
                   (order_id, position, process_label, machine_id, rate_per_hour, quantity_ordered)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                order_id,
                position as i64,
                process_label,
                machine_id,
                rate_per_hour,
                quantity_ordered
            ],
        )?;
        Ok(ProcessStep {
            step_id: conn.last_insert_rowid(),
            order_id,
            position,
            process_label: process_label.to_string(),
            machine_id,
            rate_per_hour,
            quantity_ordered,
            quantity_completed: 0.0,
            quantity_lost: 0.0,
        })
    }

    pub fn find_step(&self, step_id: i64) -> RepositoryResult<ProcessStep> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM process_step WHERE step_id = ?1",
                Self::STEP_COLUMNS
            ),
            params![step_id],
            Self::map_step,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "ProcessStep".to_string(),
            id: step_id.to_string(),
        })
    }

    /// Route of one order, in position order
    pub fn route(&self, order_id: i64) -> RepositoryResult<Vec<ProcessStep>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM process_step WHERE order_id = ?1 ORDER BY position",
            Self::STEP_COLUMNS
        ))?;
        let steps = stmt
            .query_map(params![order_id], Self::map_step)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    /// Reassign a step's machine and/or production rate
    ///
    /// The one mutation a released order still allows.
    pub fn update_step_assignment(
        &self,
        step_id: i64,
        machine_id: Option<i64>,
        rate_per_hour: Option<f64>,
    ) -> RepositoryResult<()> {
        if let Some(rate) = rate_per_hour {
            if rate < 0.0 {
                return Err(RepositoryError::FieldValueError {
                    field: "rate_per_hour".to_string(),
                    message: format!("must not be negative (got {})", rate),
                });
            }
        }

        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"UPDATE process_step
               SET machine_id = COALESCE(?2, machine_id),
                   rate_per_hour = COALESCE(?3, rate_per_hour)
               WHERE step_id = ?1"#,
            params![step_id, machine_id, rate_per_hour],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProcessStep".to_string(),
                id: step_id.to_string(),
            });
        }
        Ok(())
    }

    /// Record process completion/loss progress on a step
    pub fn update_step_progress(
        &self,
        step_id: i64,
        quantity_completed: f64,
        quantity_lost: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"UPDATE process_step
               SET quantity_completed = ?2, quantity_lost = ?3
               WHERE step_id = ?1"#,
            params![step_id, quantity_completed, quantity_lost],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ProcessStep".to_string(),
                id: step_id.to_string(),
            });
        }
        Ok(())
    }
}
