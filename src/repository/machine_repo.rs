// ==========================================
// Job-Shop APS - Machine & operator repositories
// ==========================================

use crate::domain::{Machine, Operator};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// MachineRepository
// ==========================================
pub struct MachineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<Machine> {
        Ok(Machine {
            machine_id: row.get(0)?,
            machine_code: row.get(1)?,
            description: row.get(2)?,
        })
    }

    pub fn insert(&self, machine_code: &str, description: &str) -> RepositoryResult<Machine> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO machine (machine_code, description) VALUES (?1, ?2)",
            params![machine_code, description],
        )?;
        let machine_id = conn.last_insert_rowid();
        Ok(Machine {
            machine_id,
            machine_code: machine_code.to_string(),
            description: description.to_string(),
        })
    }

    pub fn find_by_id(&self, machine_id: i64) -> RepositoryResult<Machine> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT machine_id, machine_code, description FROM machine WHERE machine_id = ?1",
            params![machine_id],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "Machine".to_string(),
            id: machine_id.to_string(),
        })
    }

    pub fn find_by_code(&self, machine_code: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                "SELECT machine_id, machine_code, description FROM machine WHERE machine_code = ?1",
                params![machine_code],
                Self::map_row,
            )
            .optional()?)
    }

    pub fn find_all(&self) -> RepositoryResult<Vec<Machine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT machine_id, machine_code, description FROM machine ORDER BY machine_code",
        )?;
        let machines = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(machines)
    }
}

// ==========================================
// OperatorRepository
// ==========================================
// Operator assignments are collaborator data: the core reads them to
// annotate timelines, writing only happens through fixture/support paths.
pub struct OperatorRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperatorRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, name: &str) -> RepositoryResult<Operator> {
        let conn = self.get_conn()?;
        conn.execute("INSERT INTO operator (name) VALUES (?1)", params![name])?;
        Ok(Operator {
            operator_id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn find_by_id(&self, operator_id: i64) -> RepositoryResult<Operator> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT operator_id, name FROM operator WHERE operator_id = ?1",
            params![operator_id],
            |row| {
                Ok(Operator {
                    operator_id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "Operator".to_string(),
            id: operator_id.to_string(),
        })
    }

    /// Assign an operator to one step of a program (upsert)
    pub fn assign(&self, program_id: i64, step_id: i64, operator_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO operator_assignment (program_id, step_id, operator_id)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(program_id, step_id) DO UPDATE SET operator_id = ?3"#,
            params![program_id, step_id, operator_id],
        )?;
        Ok(())
    }

    /// Operator display names keyed by step, for one program
    pub fn names_by_step(&self, program_id: i64) -> RepositoryResult<HashMap<i64, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT a.step_id, o.name
               FROM operator_assignment a
               JOIN operator o ON o.operator_id = a.operator_id
               WHERE a.program_id = ?1"#,
        )?;
        let rows = stmt
            .query_map(params![program_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().collect())
    }
}
