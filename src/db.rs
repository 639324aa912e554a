// ==========================================
// Job-Shop APS - SQLite connection infrastructure
// ==========================================
// Goals:
// - One place for Connection::open PRAGMA behavior so every module
//   gets foreign keys and busy_timeout consistently
// - Schema bootstrap for fresh databases
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// schema_version expected by the current code
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Apply the unified PRAGMA set to a SQLite connection
///
/// foreign_keys and busy_timeout are per-connection settings and must be
/// applied to every connection the process opens.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the unified configuration applied
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Read schema_version (None when the table does not exist yet)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// Create all tables for a fresh database (idempotent)
///
/// Dates are stored as ISO text (YYYY-MM-DD / YYYY-MM-DD HH:MM:SS), which
/// sorts and compares correctly as strings.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS machine (
            machine_id INTEGER PRIMARY KEY,
            machine_code TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS operator (
            operator_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS work_order (
            order_id INTEGER PRIMARY KEY,
            order_code INTEGER NOT NULL UNIQUE,
            description TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            unit_weight_kg REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS process_step (
            step_id INTEGER PRIMARY KEY,
            order_id INTEGER NOT NULL REFERENCES work_order(order_id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            process_label TEXT NOT NULL,
            machine_id INTEGER REFERENCES machine(machine_id),
            rate_per_hour REAL NOT NULL DEFAULT 0,
            quantity_ordered REAL NOT NULL DEFAULT 0,
            quantity_completed REAL NOT NULL DEFAULT 0,
            quantity_lost REAL NOT NULL DEFAULT 0,
            UNIQUE(order_id, position)
        );

        CREATE TABLE IF NOT EXISTS production_program (
            program_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            created_by TEXT,
            modified_by TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS program_order (
            program_id INTEGER NOT NULL REFERENCES production_program(program_id) ON DELETE CASCADE,
            order_id INTEGER NOT NULL REFERENCES work_order(order_id) ON DELETE CASCADE,
            priority INTEGER NOT NULL,
            PRIMARY KEY (program_id, order_id)
        );

        CREATE TABLE IF NOT EXISTS operator_assignment (
            assignment_id INTEGER PRIMARY KEY,
            program_id INTEGER NOT NULL REFERENCES production_program(program_id) ON DELETE CASCADE,
            step_id INTEGER NOT NULL REFERENCES process_step(step_id) ON DELETE CASCADE,
            operator_id INTEGER NOT NULL REFERENCES operator(operator_id),
            UNIQUE(program_id, step_id)
        );

        CREATE TABLE IF NOT EXISTS fragmented_task (
            task_id INTEGER PRIMARY KEY,
            step_id INTEGER NOT NULL REFERENCES process_step(step_id) ON DELETE CASCADE,
            program_id INTEGER NOT NULL REFERENCES production_program(program_id) ON DELETE CASCADE,
            parent_task_id INTEGER REFERENCES fragmented_task(task_id),
            operator_id INTEGER REFERENCES operator(operator_id),
            task_date TEXT NOT NULL,
            planned_start TEXT,
            planned_end TEXT,
            quantity_assigned REAL NOT NULL,
            quantity_carried_over REAL NOT NULL DEFAULT 0,
            quantity_completed REAL NOT NULL DEFAULT 0,
            kilos_produced REAL NOT NULL DEFAULT 0,
            units_produced REAL NOT NULL DEFAULT 0,
            state TEXT NOT NULL DEFAULT 'PENDING',
            is_continuation INTEGER NOT NULL DEFAULT 0,
            fragmentation_depth INTEGER NOT NULL DEFAULT 0,
            observations TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(step_id, task_date)
        );

        CREATE INDEX IF NOT EXISTS idx_fragmented_task_program_date
            ON fragmented_task(program_id, task_date);

        CREATE TABLE IF NOT EXISTS task_execution (
            execution_id INTEGER PRIMARY KEY,
            task_id INTEGER NOT NULL REFERENCES fragmented_task(task_id) ON DELETE CASCADE,
            started_at TEXT NOT NULL,
            ended_at TEXT NOT NULL,
            quantity_produced REAL NOT NULL,
            operator_id INTEGER REFERENCES operator(operator_id),
            state TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS daily_report (
            report_id INTEGER PRIMARY KEY,
            program_id INTEGER NOT NULL REFERENCES production_program(program_id) ON DELETE CASCADE,
            report_date TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'OPEN',
            closed_by TEXT,
            closed_at TEXT,
            closing_notes TEXT NOT NULL DEFAULT '',
            UNIQUE(program_id, report_date)
        );

        CREATE TABLE IF NOT EXISTS supervisor_report (
            program_id INTEGER PRIMARY KEY REFERENCES production_program(program_id) ON DELETE CASCADE,
            completion_percent REAL NOT NULL DEFAULT 0,
            current_editor TEXT,
            locked_until TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
