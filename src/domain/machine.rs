// ==========================================
// Job-Shop APS - Machine domain model
// ==========================================

use serde::{Deserialize, Serialize};

/// A machine on the shop floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: i64,
    pub machine_code: String,
    pub description: String,
}

/// An operator who can be assigned to daily tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub operator_id: i64,
    pub name: String,
}

/// Read-only link of an operator to one step of a program
///
/// Written by the workforce planning collaborator; the scheduling core
/// only reads it to annotate timelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorAssignment {
    pub assignment_id: i64,
    pub program_id: i64,
    pub step_id: i64,
    pub operator_id: i64,
}
