// ==========================================
// Job-Shop APS - Configuration layer
// ==========================================
// Storage: config_kv table (key-value), defaults in code.
// Exposes the schedule tuning values and the work calendar policy.
// ==========================================

pub mod manager;

pub use manager::{config_keys, ConfigManager};

use chrono::Duration;

// ==========================================
// ScheduleConfig - engine tuning values
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// Non-productive gap enforced between consecutive machine commitments
    pub setup_buffer_minutes: i64,
    /// Displacement fixed-point cap = factor x scheduled step count
    pub displacement_round_cap_factor: usize,
    /// Nominal day length used for proportional daily attribution
    pub nominal_fragment_day_hours: f64,
    /// Supervisor edit-lock duration
    pub edit_lock_minutes: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            setup_buffer_minutes: 30,
            displacement_round_cap_factor: 2,
            nominal_fragment_day_hours: 8.0,
            edit_lock_minutes: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn setup_buffer(&self) -> Duration {
        Duration::minutes(self.setup_buffer_minutes)
    }

    pub fn edit_lock_duration(&self) -> Duration {
        Duration::minutes(self.edit_lock_minutes)
    }
}
