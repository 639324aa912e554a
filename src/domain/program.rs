// ==========================================
// Job-Shop APS - Production program domain models
// ==========================================
// A program is a prioritized batch of work orders sharing a start date.
// Its end date is derived - recomputed whenever assignments, priorities
// or machine/rate assignments change - never authoritative input except
// as a default at creation.
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default program span used before the first end-date derivation
pub const DEFAULT_PROGRAM_SPAN_DAYS: i64 = 30;

// ==========================================
// ProductionProgram
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionProgram {
    pub program_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate, // derived; always >= start_date
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ProductionProgram {
    /// Generate a unique program name: Programa_<timestamp>_<suffix>
    pub fn generate_name(now: NaiveDateTime) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("Programa_{}_{}", now.format("%Y%m%d%H%M%S"), &hex[..6])
    }

    /// Default end date at creation time
    pub fn default_end_date(start_date: NaiveDate) -> NaiveDate {
        start_date + Duration::days(DEFAULT_PROGRAM_SPAN_DAYS)
    }

    /// Inclusive number of calendar days the program spans
    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

// ==========================================
// ProgramOrderAssignment
// ==========================================
// Unique per (program, work order); lower priority value wins conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramOrderAssignment {
    pub program_id: i64,
    pub order_id: i64,
    pub priority: u32,
}

// ==========================================
// SupervisorReport - per-program supervision record
// ==========================================
// Carries the advisory edit lock: only the lock holder may mutate until
// expiry, after which any actor may reacquire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorReport {
    pub program_id: i64,
    pub completion_percent: f64,
    pub current_editor: Option<String>,
    pub locked_until: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl SupervisorReport {
    /// Lock is held when an editor is set and the expiry has not passed
    pub fn is_locked(&self, now: NaiveDateTime) -> bool {
        match (&self.current_editor, self.locked_until) {
            (Some(_), Some(until)) => until > now,
            _ => false,
        }
    }

    /// Whether `actor` may mutate the report right now
    pub fn can_edit(&self, actor: &str, now: NaiveDateTime) -> bool {
        if !self.is_locked(now) {
            return true;
        }
        self.current_editor.as_deref() == Some(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_generated_names_are_unique() {
        let now = dt(2025, 6, 2, 12);
        let a = ProductionProgram::generate_name(now);
        let b = ProductionProgram::generate_name(now);
        assert!(a.starts_with("Programa_20250602120000_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_edit_lock_semantics() {
        let mut report = SupervisorReport {
            program_id: 1,
            completion_percent: 0.0,
            current_editor: Some("ana".to_string()),
            locked_until: Some(dt(2025, 6, 2, 12)),
            updated_at: dt(2025, 6, 2, 11),
        };

        // Holder can edit while locked, others cannot
        assert!(report.is_locked(dt(2025, 6, 2, 11)));
        assert!(report.can_edit("ana", dt(2025, 6, 2, 11)));
        assert!(!report.can_edit("luis", dt(2025, 6, 2, 11)));

        // After expiry anyone may edit (and reacquire)
        assert!(!report.is_locked(dt(2025, 6, 2, 13)));
        assert!(report.can_edit("luis", dt(2025, 6, 2, 13)));

        report.current_editor = None;
        report.locked_until = None;
        assert!(report.can_edit("luis", dt(2025, 6, 2, 11)));
    }
}
