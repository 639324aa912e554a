// ==========================================
// Job-Shop Production Scheduling System - Core Library
// ==========================================
// Stack: Rust + SQLite
// Scope: calendar-aware timeline engine, machine conflict
//        resolution, daily task fragmentation, day-close workflow
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer - entities & types
pub mod domain;

// Working-time arithmetic - single source of truth for calendar semantics
pub mod calendar;

// Engine layer - business rules (no SQL in engines)
pub mod engine;

// Repository layer - data access
pub mod repository;

// Configuration layer
pub mod config;

// Database infrastructure (connection init / unified PRAGMA / schema)
pub mod db;

// Logging
pub mod logging;

// API layer - business interfaces
pub mod api;

// Application layer - state wiring
pub mod app;

// ==========================================
// Core type re-exports
// ==========================================

// Domain types
pub use domain::types::{ExecutionState, OrderStatus, ReportState, TaskState};

// Domain entities
pub use domain::{
    DailyReport, FragmentedTask, Machine, ProcessStep, ProcessStepInput, ProductionProgram,
    ProgramOrderAssignment, SupervisorReport, TaskExecution, WorkOrder, WorkOrderInput,
};

// Calendar
pub use calendar::{CalendarError, QuantityConversion, WorkCalendar, WorkInterval};

// Engines
pub use engine::{
    CascadeCalculator, Fragmenter, MachineTimeline, MachineTimelineState, ProductionScheduler,
    ProgramTimeline, SchedulingError, TimelineBuilder,
};

// API
pub use api::{ProgramApi, SupervisorApi};

// ==========================================
// System constants
// ==========================================

// System version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// System name
pub const APP_NAME: &str = "Job-Shop Production Scheduling System";

// Database version
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
