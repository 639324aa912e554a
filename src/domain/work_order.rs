// ==========================================
// Job-Shop APS - Work order & route domain models
// ==========================================
// A work order carries an ordered route of process steps; each step
// names a machine, a production rate and a quantity. Steps with a
// non-positive rate or quantity are not schedulable and are skipped.
// ==========================================

use crate::domain::types::OrderStatus;
use serde::{Deserialize, Serialize};

// ==========================================
// WorkOrder
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub order_id: i64,
    pub order_code: u32,         // unique business code (OT number)
    pub description: String,     // product description
    pub status: OrderStatus,
    pub unit_weight_kg: f64,     // used to derive units from produced kilos
}

// ==========================================
// ProcessStep - one route item
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub step_id: i64,
    pub order_id: i64,
    pub position: u32,             // ordering key within the route
    pub process_label: String,     // e.g. "CORTE", "PLEGADO"
    pub machine_id: Option<i64>,
    pub rate_per_hour: f64,        // standard units per hour
    pub quantity_ordered: f64,
    pub quantity_completed: f64,
    pub quantity_lost: f64,
}

impl ProcessStep {
    /// A step participates in scheduling only with a positive rate and quantity
    pub fn is_schedulable(&self) -> bool {
        self.rate_per_hour > 0.0 && self.quantity_ordered > 0.0
    }
}

// ==========================================
// Engine input value types
// ==========================================
// The engines never see repository rows; the api layer resolves foreign
// references once and hands over these validated values.

/// One work order as seen by the scheduling engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderInput {
    pub order_id: i64,
    pub order_code: u32,
    pub description: String,
    pub priority: u32, // lower value = higher precedence
    pub steps: Vec<ProcessStepInput>,
}

/// One route step as seen by the scheduling engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStepInput {
    pub step_id: i64,
    pub position: u32,
    pub process_label: String,
    pub machine_id: Option<i64>,
    pub machine_label: Option<String>,
    pub operator_name: Option<String>,
    pub quantity: f64,
    pub rate_per_hour: f64,
}

impl ProcessStepInput {
    pub fn is_schedulable(&self) -> bool {
        self.rate_per_hour > 0.0 && self.quantity > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedulable_requires_positive_rate_and_quantity() {
        let mut step = ProcessStepInput {
            step_id: 1,
            position: 10,
            process_label: "CORTE".to_string(),
            machine_id: Some(1),
            machine_label: None,
            operator_name: None,
            quantity: 100.0,
            rate_per_hour: 20.0,
        };
        assert!(step.is_schedulable());

        step.rate_per_hour = 0.0;
        assert!(!step.is_schedulable());

        step.rate_per_hour = 20.0;
        step.quantity = 0.0;
        assert!(!step.is_schedulable());
    }
}
