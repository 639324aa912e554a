// ==========================================
// Job-Shop APS - Configuration manager
// ==========================================
// Responsibility: load, query and overwrite configuration values
// Storage: config_kv table (key-value)
// ==========================================

use crate::calendar::WorkCalendar;
use crate::config::ScheduleConfig;
use crate::db::configure_sqlite_connection;
use chrono::NaiveTime;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// Configuration keys
// ==========================================
pub mod config_keys {
    pub const SETUP_BUFFER_MINUTES: &str = "schedule/setup_buffer_minutes";
    pub const DISPLACEMENT_ROUND_CAP_FACTOR: &str = "schedule/displacement_round_cap_factor";
    pub const NOMINAL_FRAGMENT_DAY_HOURS: &str = "schedule/nominal_fragment_day_hours";
    pub const EDIT_LOCK_MINUTES: &str = "supervisor/edit_lock_minutes";

    pub const WORKDAY_START: &str = "calendar/workday_start";
    pub const WORKDAY_END: &str = "calendar/workday_end";
    pub const FRIDAY_END: &str = "calendar/friday_end";
    pub const BREAK_START: &str = "calendar/break_start";
    pub const BREAK_END: &str = "calendar/break_end";
}

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// Create a ConfigManager over its own connection
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a ConfigManager over a shared connection
    ///
    /// Re-applies the unified PRAGMA set (idempotent) so behavior does not
    /// depend on who opened the connection.
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let guard = conn
                .lock()
                .map_err(|e| format!("lock acquisition failed: {}", e))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// Read a configuration value (None when not set)
    pub fn get_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// Write a configuration value (upsert)
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;

        conn.execute(
            r#"INSERT INTO config_kv (key, value, updated_at)
               VALUES (?1, ?2, datetime('now'))
               ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')"#,
            params![key, value],
        )?;
        Ok(())
    }

    fn get_parsed<T: std::str::FromStr>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, Box<dyn Error>> {
        match self.get_value(key)? {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|_| format!("invalid value for {}: {}", key, raw).into()),
            None => Ok(default),
        }
    }

    fn get_time(&self, key: &str, default: NaiveTime) -> Result<NaiveTime, Box<dyn Error>> {
        match self.get_value(key)? {
            Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
                .map_err(|_| format!("invalid time for {}: {}", key, raw).into()),
            None => Ok(default),
        }
    }

    /// Load the schedule tuning values, falling back to defaults
    pub fn schedule_config(&self) -> Result<ScheduleConfig, Box<dyn Error>> {
        let defaults = ScheduleConfig::default();
        Ok(ScheduleConfig {
            setup_buffer_minutes: self.get_parsed(
                config_keys::SETUP_BUFFER_MINUTES,
                defaults.setup_buffer_minutes,
            )?,
            displacement_round_cap_factor: self.get_parsed(
                config_keys::DISPLACEMENT_ROUND_CAP_FACTOR,
                defaults.displacement_round_cap_factor,
            )?,
            nominal_fragment_day_hours: self.get_parsed(
                config_keys::NOMINAL_FRAGMENT_DAY_HOURS,
                defaults.nominal_fragment_day_hours,
            )?,
            edit_lock_minutes: self.get_parsed(
                config_keys::EDIT_LOCK_MINUTES,
                defaults.edit_lock_minutes,
            )?,
        })
    }

    /// Load the work calendar policy, falling back to the plant schedule
    pub fn work_calendar(&self) -> Result<WorkCalendar, Box<dyn Error>> {
        let defaults = WorkCalendar::default();
        Ok(WorkCalendar {
            workday_start: self.get_time(config_keys::WORKDAY_START, defaults.workday_start)?,
            workday_end: self.get_time(config_keys::WORKDAY_END, defaults.workday_end)?,
            friday_end: self.get_time(config_keys::FRIDAY_END, defaults.friday_end)?,
            break_start: self.get_time(config_keys::BREAK_START, defaults.break_start)?,
            break_end: self.get_time(config_keys::BREAK_END, defaults.break_end)?,
        })
    }
}
