// ==========================================
// Job-Shop APS - Application state
// ==========================================
// Responsibility: wire the shared connection, repositories, engines and
// API instances together for a running process.
// ==========================================

use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ProgramApi, SupervisorApi};
use crate::config::ConfigManager;
use crate::engine::ProductionScheduler;
use crate::repository::{
    MachineRepository, OperatorRepository, ProgramRepository, SupervisorReportRepository,
    TaskRepository, WorkOrderRepository,
};

/// Application state
///
/// Holds the API instances and shared resources of one process.
pub struct AppState {
    /// Database path
    pub db_path: String,

    /// Shared connection (mutations serialize through it)
    pub conn: Arc<Mutex<Connection>>,

    /// Program scheduling API
    pub program_api: Arc<ProgramApi>,

    /// Supervisor workflow API
    pub supervisor_api: Arc<SupervisorApi>,

    /// Master data repositories
    pub machine_repo: Arc<MachineRepository>,
    pub operator_repo: Arc<OperatorRepository>,
    pub work_order_repo: Arc<WorkOrderRepository>,
    pub program_repo: Arc<ProgramRepository>,
    pub task_repo: Arc<TaskRepository>,
}

impl AppState {
    /// Open (or create) the database and wire all components
    pub fn new(db_path: String) -> Result<Self, Box<dyn Error>> {
        let conn = crate::db::open_sqlite_connection(&db_path)?;
        crate::db::init_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        let config_manager = ConfigManager::from_connection(conn.clone())?;
        let calendar = config_manager.work_calendar()?;
        let schedule_config = config_manager.schedule_config()?;

        let scheduler = Arc::new(ProductionScheduler::new(calendar, schedule_config.clone()));

        let machine_repo = Arc::new(MachineRepository::new(conn.clone()));
        let operator_repo = Arc::new(OperatorRepository::new(conn.clone()));
        let work_order_repo = Arc::new(WorkOrderRepository::new(conn.clone()));
        let program_repo = Arc::new(ProgramRepository::new(conn.clone()));
        let task_repo = Arc::new(TaskRepository::new(conn.clone()));
        let supervisor_repo = Arc::new(SupervisorReportRepository::new(conn.clone()));

        let program_api = Arc::new(ProgramApi::new(
            scheduler.clone(),
            program_repo.clone(),
            work_order_repo.clone(),
            task_repo.clone(),
        ));
        let supervisor_api = Arc::new(SupervisorApi::new(
            scheduler,
            program_repo.clone(),
            task_repo.clone(),
            supervisor_repo,
            schedule_config,
        ));

        Ok(Self {
            db_path,
            conn,
            program_api,
            supervisor_api,
            machine_repo,
            operator_repo,
            work_order_repo,
            program_repo,
            task_repo,
        })
    }
}

/// Default database location under the user's data directory
pub fn get_default_db_path() -> String {
    let mut path: PathBuf = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("jobshop-aps");
    if let Err(e) = std::fs::create_dir_all(&path) {
        tracing::warn!("could not create data directory {:?}: {}", path, e);
    }
    path.push("jobshop_aps.db");
    path.to_string_lossy().to_string()
}
