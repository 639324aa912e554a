// ==========================================
// Job-Shop APS - API layer
// ==========================================
// Business interfaces over the engines and repositories. Each call
// loads its inputs upfront, runs pure engine work, and persists the
// result in one batch.
// ==========================================

pub mod error;
pub mod program_api;
pub mod supervisor_api;

pub use error::{ApiError, ApiResult};
pub use program_api::{
    AddOrdersOutcome, FragmentationOutcome, MachineLoad, MachineLoadEntry, ProgramApi,
    RejectedOrder,
};
pub use supervisor_api::{
    DailySummary, DailySupervisorReport, DayClosePreview, PendingTaskPreview, ProductionEntry,
    SupervisorApi, TaskRow,
};
