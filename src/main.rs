// ==========================================
// Job-Shop Production Scheduling System - Entry point
// ==========================================
// Stack: Rust + SQLite
// ==========================================

use jobshop_aps::app::{get_default_db_path, AppState};

fn main() {
    jobshop_aps::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", jobshop_aps::APP_NAME);
    tracing::info!("version: {}", jobshop_aps::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(get_default_db_path);
    tracing::info!("database: {}", db_path);

    let state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "schema ready (version {:?})",
        state
            .conn
            .lock()
            .ok()
            .and_then(|conn| jobshop_aps::db::read_schema_version(&conn).ok())
            .flatten()
    );
    tracing::info!("ready - use the library APIs to drive scheduling");
}
