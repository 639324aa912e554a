// ==========================================
// Day-close workflow tests (end-to-end over SQLite)
// ==========================================
// Scope: finalize_day preview/commit, continuation chains, carry-over
// accumulation, closed-day gating, quantity conservation.
// ==========================================


use jobshop_aps::api::{ApiError, ProductionEntry};
use jobshop_aps::domain::types::{ReportState, TaskState};
use test_helpers::{date, monday, seed_machine, seed_order, seed_program, setup};

fn entry_units(units: f64) -> ProductionEntry {
    ProductionEntry {
        units_produced: Some(units),
        ..Default::default()
    }
}

// ==========================================
// Test: 60 of 100 done -> CONTINUED parent + 40-unit child
// ==========================================
#[test]
fn test_finalize_creates_continuation_with_remainder() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    // 100 @ 20/hr = 5h: a single Monday task
    seed_order(&env, 2001, 0.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(2001, 1)]);
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
    env.state
        .supervisor_api
        .register_production(task.task_id, "ana", entry_units(60.0))
        .unwrap();

    let outcome = env
        .state
        .supervisor_api
        .finalize_day(program_id, monday(), "ana", "shift notes")
        .unwrap();

    assert_eq!(outcome.next_working_day, date(2025, 6, 3));
    assert_eq!(outcome.closed.len(), 1);
    assert!((outcome.closed[0].pending_quantity - 40.0).abs() < 1e-6);

    // Parent is CONTINUED
    let parent = env.state.task_repo.find_task(task.task_id).unwrap();
    assert_eq!(parent.state, TaskState::Continued);

    // Child carries the remainder on the next working day
    let child = env
        .state
        .task_repo
        .find_task(outcome.closed[0].continuation_task_id)
        .unwrap();
    assert_eq!(child.task_date, date(2025, 6, 3));
    assert_eq!(child.state, TaskState::Pending);
    assert!(child.is_continuation);
    assert_eq!(child.parent_task_id, Some(parent.task_id));
    assert_eq!(child.fragmentation_depth, parent.fragmentation_depth + 1);
    assert!((child.quantity_assigned - 40.0).abs() < 1e-6);

    // The day's report is CLOSED with actor and notes
    let report = env
        .state
        .task_repo
        .daily_report(program_id, monday())
        .unwrap()
        .unwrap();
    assert_eq!(report.state, ReportState::Closed);
    assert_eq!(report.closed_by.as_deref(), Some("ana"));
    assert!(report.closed_at.is_some());
    assert_eq!(report.closing_notes, "shift notes");
}

// ==========================================
// Test: remainder accumulates into an already-planned fragment
// ==========================================
#[test]
fn test_remainder_accumulates_into_existing_next_day_fragment() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    // 100 @ 10/hr: 90 Monday + 10 already planned for Tuesday
    seed_order(&env, 2002, 0.0, &[(10, "CORTE", Some(m1), 10.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(2002, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    let monday_task = env
        .state
        .task_repo
        .tasks_for_date(program_id, monday())
        .unwrap()
        .remove(0);
    env.state
        .supervisor_api
        .register_production(monday_task.task_id, "ana", entry_units(60.0))
        .unwrap();

    let outcome = env
        .state
        .supervisor_api
        .finalize_day(program_id, monday(), "ana", "")
        .unwrap();
    assert_eq!(outcome.closed.len(), 1);

    // No duplicate (step, date) row: Tuesday still has one fragment,
    // now carrying Monday's 30 pending units on top of its planned 10
    let tuesday_tasks = env
        .state
        .task_repo
        .tasks_for_date(program_id, date(2025, 6, 3))
        .unwrap();
    assert_eq!(tuesday_tasks.len(), 1);
    let tuesday = &tuesday_tasks[0];
    assert_eq!(tuesday.task_id, outcome.closed[0].continuation_task_id);
    assert!((tuesday.quantity_assigned - 10.0).abs() < 1e-6);
    assert!((tuesday.quantity_carried_over - 30.0).abs() < 1e-6);
    assert!((tuesday.total_day_quantity() - 40.0).abs() < 1e-6);
}

// ==========================================
// Test: a closed day rejects re-closing and production entry
// ==========================================
#[test]
fn test_closed_day_is_final() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 2003, 0.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(2003, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    env.state
        .supervisor_api
        .finalize_day(program_id, monday(), "ana", "")
        .unwrap();

    // Re-closing is rejected, never double-processed
    let err = env
        .state
        .supervisor_api
        .finalize_day(program_id, monday(), "ana", "")
        .unwrap_err();
    assert!(matches!(err, ApiError::DayAlreadyClosed { .. }));

    // Preview of a closed day is rejected the same way
    let err = env
        .state
        .supervisor_api
        .preview_finalize_day(program_id, monday())
        .unwrap_err();
    assert!(matches!(err, ApiError::DayAlreadyClosed { .. }));

    // Production entry against the closed date is gated too
    let task = env
        .state
        .task_repo
        .tasks_for_date(program_id, monday())
        .unwrap()
        .remove(0);
    let err = env
        .state
        .supervisor_api
        .register_production(task.task_id, "ana", entry_units(10.0))
        .unwrap_err();
    assert!(matches!(err, ApiError::DayAlreadyClosed { .. }));
}

// ==========================================
// Test: Friday closes onto Monday
// ==========================================
#[test]
fn test_friday_close_continues_on_monday() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 2004, 0.0, &[(10, "CORTE", Some(m1), 20.0, 80.0)]);
    // Friday 2025-06-06 start; 4h of work, single Friday task
    let program_id = seed_program(&env, date(2025, 6, 6), &[(2004, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    let outcome = env
        .state
        .supervisor_api
        .finalize_day(program_id, date(2025, 6, 6), "ana", "")
        .unwrap();
    assert_eq!(outcome.next_working_day, date(2025, 6, 9));
    assert_eq!(outcome.closed.len(), 1);

    let child = env
        .state
        .task_repo
        .find_task(outcome.closed[0].continuation_task_id)
        .unwrap();
    assert_eq!(child.task_date, date(2025, 6, 9));
}

// ==========================================
// Test: preview computes without committing
// ==========================================
#[test]
fn test_preview_leaves_tasks_untouched() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 2005, 0.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(2005, 1)]);
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
    env.state
        .supervisor_api
        .register_production(task.task_id, "ana", entry_units(25.0))
        .unwrap();

    let preview = env
        .state
        .supervisor_api
        .preview_finalize_day(program_id, monday())
        .unwrap();
    assert_eq!(preview.pending_tasks.len(), 1);
    assert!((preview.pending_tasks[0].pending_quantity - 75.0).abs() < 1e-6);
    assert_eq!(preview.next_working_day, date(2025, 6, 3));

    // Nothing changed: task still open, report still open
    let task = env.state.task_repo.find_task(task.task_id).unwrap();
    assert_eq!(task.state, TaskState::InProgress);
    let report = env
        .state
        .task_repo
        .daily_report(program_id, monday())
        .unwrap()
        .unwrap();
    assert_eq!(report.state, ReportState::Open);
}

// ==========================================
// Test: chain conservation across continuations
// ==========================================
#[test]
fn test_chain_conserves_quantity() {
    let env = setup();
    let m1 = seed_machine(&env, "M1");
    seed_order(&env, 2006, 0.0, &[(10, "CORTE", Some(m1), 20.0, 100.0)]);
    let program_id = seed_program(&env, monday(), &[(2006, 1)]);
    env.state
        .program_api
        .create_fragmented_tasks(program_id, true)
        .unwrap();

    let original = env
        .state
        .task_repo
        .tasks_for_date(program_id, monday())
        .unwrap()
        .remove(0);

    // Day 1: 60 done, close -> child with 40
    env.state
        .supervisor_api
        .register_production(original.task_id, "ana", entry_units(60.0))
        .unwrap();
    let outcome = env
        .state
        .supervisor_api
        .finalize_day(program_id, monday(), "ana", "")
        .unwrap();

    // Day 2: finish the remainder
    let child_id = outcome.closed[0].continuation_task_id;
    let child = env
        .state
        .supervisor_api
        .register_production(child_id, "ana", entry_units(40.0))
        .unwrap();
    assert_eq!(child.state, TaskState::Completed);

    let chain = env.state.supervisor_api.task_genealogy(original.task_id).unwrap();
    assert_eq!(chain.len(), 2);

    let completed: f64 = chain.iter().map(|t| t.quantity_completed).sum();
    assert!(completed <= original.quantity_assigned + 1e-6);
    for task in &chain {
        let pct = task.completion_percent();
        assert!((0.0..=100.0).contains(&pct));
    }
}
