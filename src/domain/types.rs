// ==========================================
// Job-Shop APS - Domain type definitions
// ==========================================
// Serialization format: SCREAMING_SNAKE_CASE (matches the database)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// TaskState - daily fragment lifecycle
// ==========================================
// PENDING -> IN_PROGRESS -> { COMPLETED | CONTINUED | STOPPED }
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,    // scheduled, not started
    InProgress, // production under way
    Completed,  // day quantity fully produced
    Continued,  // closed with a remainder carried to the next day
    Stopped,    // halted by the supervisor
}

impl TaskState {
    /// States that still accept production on an open day
    pub fn is_open(&self) -> bool {
        matches!(self, TaskState::Pending | TaskState::InProgress)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => write!(f, "PENDING"),
            TaskState::InProgress => write!(f, "IN_PROGRESS"),
            TaskState::Completed => write!(f, "COMPLETED"),
            TaskState::Continued => write!(f, "CONTINUED"),
            TaskState::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskState::Pending),
            "IN_PROGRESS" => Ok(TaskState::InProgress),
            "COMPLETED" => Ok(TaskState::Completed),
            "CONTINUED" => Ok(TaskState::Continued),
            "STOPPED" => Ok(TaskState::Stopped),
            other => Err(format!("unknown task state: {}", other)),
        }
    }
}

// ==========================================
// ReportState - daily program report lifecycle
// ==========================================
// Closing is one-way: a CLOSED report never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportState {
    Open,
    Closed,
    InReview,
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportState::Open => write!(f, "OPEN"),
            ReportState::Closed => write!(f, "CLOSED"),
            ReportState::InReview => write!(f, "IN_REVIEW"),
        }
    }
}

impl FromStr for ReportState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(ReportState::Open),
            "CLOSED" => Ok(ReportState::Closed),
            "IN_REVIEW" => Ok(ReportState::InReview),
            other => Err(format!("unknown report state: {}", other)),
        }
    }
}

// ==========================================
// OrderStatus - work order situation
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,    // released, waiting for a program
    Unprinted,  // issued but not yet printed to the floor
    InProgress, // assigned to an active program
    Finished,
}

impl OrderStatus {
    /// Only pending/unprinted orders may be newly assigned to a program
    pub fn is_releasable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Unprinted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Unprinted => write!(f, "UNPRINTED"),
            OrderStatus::InProgress => write!(f, "IN_PROGRESS"),
            OrderStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "UNPRINTED" => Ok(OrderStatus::Unprinted),
            "IN_PROGRESS" => Ok(OrderStatus::InProgress),
            "FINISHED" => Ok(OrderStatus::Finished),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

// ==========================================
// ExecutionState - production history entry state
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    InProgress,
    Paused,
    Completed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::InProgress => write!(f, "IN_PROGRESS"),
            ExecutionState::Paused => write!(f, "PAUSED"),
            ExecutionState::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl FromStr for ExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(ExecutionState::InProgress),
            "PAUSED" => Ok(ExecutionState::Paused),
            "COMPLETED" => Ok(ExecutionState::Completed),
            other => Err(format!("unknown execution state: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_round_trip() {
        for state in [
            TaskState::Pending,
            TaskState::InProgress,
            TaskState::Completed,
            TaskState::Continued,
            TaskState::Stopped,
        ] {
            assert_eq!(state.to_string().parse::<TaskState>().unwrap(), state);
        }
    }

    #[test]
    fn test_releasable_statuses() {
        assert!(OrderStatus::Pending.is_releasable());
        assert!(OrderStatus::Unprinted.is_releasable());
        assert!(!OrderStatus::InProgress.is_releasable());
        assert!(!OrderStatus::Finished.is_releasable());
    }
}
