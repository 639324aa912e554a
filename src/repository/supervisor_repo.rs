// ==========================================
// Job-Shop APS - Supervisor report repository
// ==========================================
// One record per program: completion percentage plus the advisory,
// time-bounded edit lock. The lock is user-facing courtesy, not a
// correctness mechanism for the scheduling engine.
// ==========================================

use crate::domain::SupervisorReport;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::fmt_datetime;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct SupervisorReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SupervisorReportRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<SupervisorReport> {
        Ok(SupervisorReport {
            program_id: row.get(0)?,
            completion_percent: row.get(1)?,
            current_editor: row.get(2)?,
            locked_until: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    /// Fetch the report, creating an empty one on first access
    pub fn get_or_create(
        &self,
        program_id: i64,
        now: NaiveDateTime,
    ) -> RepositoryResult<SupervisorReport> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR IGNORE INTO supervisor_report (program_id, updated_at)
               VALUES (?1, ?2)"#,
            params![program_id, fmt_datetime(now)],
        )?;
        conn.query_row(
            r#"SELECT program_id, completion_percent, current_editor, locked_until, updated_at
               FROM supervisor_report WHERE program_id = ?1"#,
            params![program_id],
            Self::map_row,
        )
        .map_err(Into::into)
    }

    /// Store a freshly computed completion percentage
    pub fn set_completion_percent(
        &self,
        program_id: i64,
        percent: f64,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"UPDATE supervisor_report
               SET completion_percent = ?2, updated_at = ?3
               WHERE program_id = ?1"#,
            params![program_id, percent.clamp(0.0, 100.0), fmt_datetime(now)],
        )?;
        Ok(())
    }

    /// Try to take the edit lock
    ///
    /// Succeeds when the lock is free, expired, or already held by the
    /// same actor (re-acquisition extends it). Returns false otherwise.
    pub fn try_acquire_lock(
        &self,
        program_id: i64,
        actor: &str,
        now: NaiveDateTime,
        until: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"UPDATE supervisor_report
               SET current_editor = ?2, locked_until = ?3, updated_at = ?4
               WHERE program_id = ?1
                 AND (current_editor IS NULL
                      OR current_editor = ?2
                      OR locked_until IS NULL
                      OR locked_until <= ?4)"#,
            params![program_id, actor, fmt_datetime(until), fmt_datetime(now)],
        )?;
        Ok(changed > 0)
    }

    /// Release the lock if held by `actor`
    pub fn release_lock(&self, program_id: i64, actor: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"UPDATE supervisor_report
               SET current_editor = NULL, locked_until = NULL
               WHERE program_id = ?1 AND current_editor = ?2"#,
            params![program_id, actor],
        )?;
        Ok(changed > 0)
    }

    pub fn find(&self, program_id: i64) -> RepositoryResult<Option<SupervisorReport>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                r#"SELECT program_id, completion_percent, current_editor, locked_until, updated_at
                   FROM supervisor_report WHERE program_id = ?1"#,
                params![program_id],
                Self::map_row,
            )
            .optional()?)
    }
}
