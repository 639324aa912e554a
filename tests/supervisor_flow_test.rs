// ==========================================
// Supervisor workflow tests (end-to-end over SQLite)
// ==========================================
// Scope: daily report view, production entry (kilos and units),
// summaries, edit lock, execution history, assignment rejections.
// ==========================================


use jobshop_aps::api::{ApiError, ProductionEntry};
use jobshop_aps::domain::types::{OrderStatus, TaskState};
use test_helpers::{date, monday, seed_machine, seed_order, seed_program, setup};

// ==========================================
// Test: report view defaults to the first task date
// ==========================================
#[test]
fn test_report_view_defaults_and_rows() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 3001, 2.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(3001, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    let report = env
        .state
        .supervisor_api
        .report_for_date(program_id, None)
        .unwrap();
    assert_eq!(report.date, monday());
    assert!(report.is_working_day);
    assert_eq!(report.tasks.len(), 1);

    let row = &report.tasks[0];
    assert_eq!(row.order_code, 3001);
    assert_eq!(row.process_label, "CORTE");
    assert_eq!(row.machine_code.as_deref(), Some("M1"));
    assert!((row.total_day_quantity - 100.0).abs() < 1e-6);
    // Planned kilos derive from the order's unit weight
    assert!((row.kilos_planned - 200.0).abs() < 1e-6);
    assert_eq!(row.state, TaskState::Pending);

    // A weekend date reports no tasks
    let weekend = env
        .state
        .supervisor_api
        .report_for_date(program_id, Some(date(2025, 6, 7)))
        .unwrap();
    assert!(!weekend.is_working_day);
    assert!(weekend.tasks.is_empty());
}

// ==========================================
// Test: kilos convert to units through the unit weight
// ==========================================
#[test]
fn test_production_entry_by_kilos() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    // 2 kg per unit
    seed_order(&env, 3002, 2.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(3002, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    let task = env
        .state
        .task_repo
        .tasks_for_date(program_id, monday())
        .unwrap()
        .remove(0);

    let entry = ProductionEntry {
        kilos_produced: Some(80.0),
        observations: Some("first shift".to_string()),
        ..Default::default()
    };
    let updated = env
        .state
        .supervisor_api
        .register_production(task.task_id, "ana", entry)
        .unwrap();

    assert!((updated.kilos_produced - 80.0).abs() < 1e-6);
    assert!((updated.units_produced - 40.0).abs() < 1e-6);
    assert!((updated.quantity_completed - 40.0).abs() < 1e-6);
    assert_eq!(updated.state, TaskState::InProgress);
    assert_eq!(updated.observations, "first shift");

    // Completing the remainder flips the state automatically
    let entry = ProductionEntry {
        kilos_produced: Some(200.0),
        ..Default::default()
    };
    let updated = env
        .state
        .supervisor_api
        .register_production(task.task_id, "ana", entry)
        .unwrap();
    assert_eq!(updated.state, TaskState::Completed);
    assert!((updated.completion_percent() - 100.0).abs() < 1e-6);

    // History carries one entry per production report
    let executions = env
        .state
        .supervisor_api
        .execution_timeline(program_id, monday())
        .unwrap();
    assert_eq!(executions.len(), 2);
}

// ==========================================
// Test: daily summary counts by state
// ==========================================
#[test]
fn test_daily_summary_counts() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    let m2 = seed_machine(&env, "M2");
    let m3 = seed_machine(&env, "M3");
    seed_order(
        &env,
        3003,
        0.0,
        &[
            (10, "CORTE", Some(m1), 20.0, 50.0),
            (20, "PLEGADO", Some(m2), 20.0, 50.0),
            (30, "SOLDADO", Some(m3), 20.0, 50.0),
        ],
    );
    let program_id = seed_program(&env, monday(), &[(3003, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    let tasks = env
        .state
        .task_repo
        .tasks_for_date(program_id, monday())
        .unwrap();
    assert_eq!(tasks.len(), 3);

    env.state
        .supervisor_api
        .register_production(
            tasks[0].task_id,
            "ana",
            ProductionEntry {
                units_produced: Some(50.0),
                ..Default::default()
            },
        )
        .unwrap();
    env.state
        .supervisor_api
        .register_production(
            tasks[1].task_id,
            "ana",
            ProductionEntry {
                units_produced: Some(10.0),
                ..Default::default()
            },
        )
        .unwrap();

    let summary = env
        .state
        .supervisor_api
        .daily_summary(program_id, monday())
        .unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.in_progress, 1);
    assert_eq!(summary.pending, 1);
    assert!((summary.completion_percent - 100.0 / 3.0).abs() < 1e-6);
}

// ==========================================
// Test: advisory edit lock blocks other editors until expiry/release
// ==========================================
#[test]
fn test_edit_lock_round_trip() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 3004, 0.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(3004, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    assert!(env
        .state
        .supervisor_api
        .acquire_edit_lock(program_id, "ana")
        .unwrap());
    // Re-acquisition by the holder extends the lock
    assert!(env
        .state
        .supervisor_api
        .acquire_edit_lock(program_id, "ana")
        .unwrap());
    // Another actor cannot take it
    assert!(!env
        .state
        .supervisor_api
        .acquire_edit_lock(program_id, "luis")
        .unwrap());

    // A locked report rejects production entry from other actors
    let task = env
        .state
        .task_repo
        .tasks_for_date(program_id, monday())
        .unwrap()
        .remove(0);
    let err = env
        .state
        .supervisor_api
        .register_production(
            task.task_id,
            "luis",
            ProductionEntry {
                units_produced: Some(5.0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::ReportLocked { .. }));

    // The holder may keep working
    env.state
        .supervisor_api
        .register_production(
            task.task_id,
            "ana",
            ProductionEntry {
                units_produced: Some(5.0),
                ..Default::default()
            },
        )
        .unwrap();

    // Release frees it for anyone
    assert!(env
        .state
        .supervisor_api
        .release_edit_lock(program_id, "ana")
        .unwrap());
    assert!(env
        .state
        .supervisor_api
        .acquire_edit_lock(program_id, "luis")
        .unwrap());
}

// ==========================================
// Test: assignment rejections carry per-item reasons
// ==========================================
#[test]
fn test_assignment_rejections() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 3005, 0.0, &[(10, "CORTE", Some(m1), 20.0, 50.0)]);

    let finished_id = seed_order(&env, 3006, 0.0, &[(10, "CORTE", Some(m1), 20.0, 50.0)]);
    env.state
        .work_order_repo
        .update_status(finished_id, OrderStatus::Finished)
        .unwrap();

    let program_id = seed_program(&env, monday(), &[]);
    let outcome = env
        .state
        .program_api
        .add_work_orders(
            program_id,
            &[(3005, 1), (3005, 2), (3006, 3), (9999, 4)],
        )
        .unwrap();

    assert_eq!(outcome.added, vec![3005]);
    assert_eq!(outcome.rejected.len(), 3);
    assert!(outcome.rejected[0].reason.contains("already assigned"));
    assert!(outcome.rejected[1].reason.contains("not releasable"));
    assert!(outcome.rejected[2].reason.contains("not found"));
}

// ==========================================
// Test: continuations surface in the timeline read model
// ==========================================
#[test]
fn test_continuations_appear_in_timeline() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 3007, 0.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(3007, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    env.state
        .supervisor_api
        .finalize_day(program_id, monday(), "ana", "")
        .unwrap();

    let data = env
        .state
        .program_api
        .generate_timeline_data(program_id)
        .unwrap();
    let continuation = data
        .items
        .iter()
        .find(|i| i.is_continuation)
        .expect("continuation item");
    assert!(continuation.name.contains("CORTE"));
    assert!(continuation.name.contains("Continuation"));
    assert_eq!(continuation.group_id, "ot_1");
    assert!(continuation.start_time.starts_with("2025-06-03"));
}

// ==========================================
// Test: machine load aggregates hours per order
// ==========================================
#[test]
fn test_machine_load_breakdown() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 3008, 0.0, &[(10, "CORTE", Some(m1), 10.0, 100.0)]);
    seed_order(&env, 3009, 0.0, &[(10, "CORTE", Some(m1), 20.0, 50.0)]);
    let program_id = seed_program(&env, monday(), &[(3008, 1), (3009, 2)]);

    let load = env
        .state
        .program_api
        .machine_load(program_id, m1)
        .unwrap();
    assert_eq!(load.breakdown.len(), 2);
    // 100/10 + 50/20 = 12.5 hours
    assert!((load.total_hours - 12.5).abs() < 1e-6);
}
