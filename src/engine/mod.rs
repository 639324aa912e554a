// ==========================================
// Job-Shop APS - Engine layer
// ==========================================
// Responsibility: scheduling business rules over validated inputs.
// Engines never touch SQL; the api layer loads inputs upfront and
// persists outputs in one batch.
// ==========================================

pub mod availability;
pub mod cascade;
pub mod fragmenter;
pub mod scheduler;
pub mod timeline;

// Re-export core engines
pub use availability::{CommittedInterval, ConflictCheck, MachineTimeline, MachineTimelineState};
pub use cascade::{CascadeCalculator, StepWindow};
pub use fragmenter::{DayFragment, Fragmenter};
pub use scheduler::{
    ProductionScheduler, TimelineData, TimelineGroup, TimelineItem, TimelineProcess,
    TIMELINE_TIME_FORMAT,
};
pub use timeline::{ProgramTimeline, ScheduledStep, SchedulingError, TimelineBuilder};
