// ==========================================
// Job-Shop APS - Repository layer
// ==========================================
// Responsibility: SQLite data access, one repository per aggregate.
// Dates are stored as ISO text; mapping helpers below keep the format
// in one place.
// ==========================================

pub mod error;
pub mod machine_repo;
pub mod program_repo;
pub mod supervisor_repo;
pub mod task_repo;
pub mod work_order_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use machine_repo::{MachineRepository, OperatorRepository};
pub use program_repo::ProgramRepository;
pub use supervisor_repo::SupervisorReportRepository;
pub use task_repo::{DayCloseOutcome, ReplaceOutcome, TaskContextRow, TaskRepository};
pub use work_order_repo::WorkOrderRepository;

use chrono::{NaiveDate, NaiveDateTime};

/// Stored date format (sorts correctly as text)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stored datetime format
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn fmt_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_date(raw: &str) -> RepositoryResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| RepositoryError::FieldValueError {
        field: "date".to_string(),
        message: format!("{}: {}", raw, e),
    })
}

pub(crate) fn parse_datetime(raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).map_err(|e| {
        RepositoryError::FieldValueError {
            field: "datetime".to_string(),
            message: format!("{}: {}", raw, e),
        }
    })
}
