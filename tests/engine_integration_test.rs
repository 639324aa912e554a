// ==========================================
// Engine integration tests
// ==========================================
// Scope: cascade -> timeline builder -> fragmenter over in-memory
// inputs; verifies the cross-engine scheduling properties.
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use jobshop_aps::calendar::WorkCalendar;
use jobshop_aps::config::ScheduleConfig;
use jobshop_aps::domain::{ProcessStepInput, WorkOrderInput};
use jobshop_aps::engine::{ProductionScheduler, TimelineBuilder};

fn dt(d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
}

fn step(
    id: i64,
    position: u32,
    machine: Option<i64>,
    quantity: f64,
    rate: f64,
) -> ProcessStepInput {
    ProcessStepInput {
        step_id: id,
        position,
        process_label: format!("P{}", position),
        machine_id: machine,
        machine_label: machine.map(|m| format!("M{}", m)),
        operator_name: None,
        quantity,
        rate_per_hour: rate,
    }
}

fn order(order_id: i64, priority: u32, steps: Vec<ProcessStepInput>) -> WorkOrderInput {
    WorkOrderInput {
        order_id,
        order_code: 1000 + order_id as u32,
        description: format!("Order {}", order_id),
        priority,
        steps,
    }
}

// ==========================================
// Test: two steps, one machine, priority displacement
// ==========================================
#[test]
fn test_priority_two_wins_machine_after_priority_one() {
    let cal = WorkCalendar::default();
    let cfg = ScheduleConfig::default();
    let builder = TimelineBuilder::new(&cal, &cfg);

    let orders = vec![
        order(1, 1, vec![step(1, 10, Some(1), 22.5, 10.0)]),
        order(2, 2, vec![step(2, 10, Some(1), 22.5, 10.0)]),
    ];
    // Both ideally start Monday 07:45 and run 2.25h
    let timeline = builder.build(&orders, dt(2, 7, 45)).unwrap();

    let s1 = timeline.steps.iter().find(|s| s.step_id == 1).unwrap();
    let s2 = timeline.steps.iter().find(|s| s.step_id == 2).unwrap();

    assert_eq!(s1.start, dt(2, 7, 45));
    assert_eq!(s1.end, dt(2, 10, 0));
    // The worse priority moves to the winner's end + 30 minutes
    assert_eq!(s2.start, dt(2, 10, 30));
}

// ==========================================
// Test: overlap-freedom is a global post-condition
// ==========================================
#[test]
fn test_no_machine_carries_overlapping_steps() {
    let cal = WorkCalendar::default();
    let cfg = ScheduleConfig::default();
    let builder = TimelineBuilder::new(&cal, &cfg);

    // Three orders contending for two machines with multi-step routes
    let orders = vec![
        order(
            1,
            1,
            vec![step(1, 10, Some(1), 100.0, 10.0), step(2, 20, Some(2), 100.0, 12.0)],
        ),
        order(
            2,
            2,
            vec![step(3, 10, Some(1), 60.0, 15.0), step(4, 20, Some(2), 60.0, 10.0)],
        ),
        order(
            3,
            3,
            vec![step(5, 10, Some(2), 45.0, 9.0), step(6, 20, Some(1), 45.0, 15.0)],
        ),
    ];
    let timeline = builder.build(&orders, dt(2, 7, 45)).unwrap();
    assert_eq!(timeline.steps.len(), 6);

    let setup = Duration::minutes(30);
    for a in &timeline.steps {
        for b in &timeline.steps {
            if a.step_id >= b.step_id || a.machine_id != b.machine_id {
                continue;
            }
            let disjoint = a.end + setup <= b.start || b.end + setup <= a.start;
            assert!(
                disjoint,
                "steps {} and {} overlap on machine {:?}: {}..{} vs {}..{}",
                a.step_id, b.step_id, a.machine_id, a.start, a.end, b.start, b.end
            );
        }
    }

    // Route order within each work order never inverts
    for route in [&[1i64, 2][..], &[3, 4], &[5, 6]] {
        let first = timeline.steps.iter().find(|s| s.step_id == route[0]).unwrap();
        let second = timeline.steps.iter().find(|s| s.step_id == route[1]).unwrap();
        assert!(
            second.start >= first.start,
            "route inverted: {} before {}",
            route[1],
            route[0]
        );
    }
}

// ==========================================
// Test: displaced work slides across the day boundary intact
// ==========================================
#[test]
fn test_quantities_survive_displacement() {
    let cal = WorkCalendar::default();
    let cfg = ScheduleConfig::default();
    let builder = TimelineBuilder::new(&cal, &cfg);

    // Machine 1 is saturated by priority 1 for the whole Monday
    let orders = vec![
        order(1, 1, vec![step(1, 10, Some(1), 90.0, 10.0)]),
        order(2, 2, vec![step(2, 10, Some(1), 90.0, 10.0)]),
    ];
    let timeline = builder.build(&orders, dt(2, 7, 45)).unwrap();

    let s2 = timeline.steps.iter().find(|s| s.step_id == 2).unwrap();
    // Pushed past Monday's close: restarts Tuesday 07:45
    assert_eq!(s2.start, dt(3, 7, 45));
    let produced: f64 = s2.intervals.iter().map(|i| i.units).sum();
    assert!((produced - 90.0).abs() < 1e-6);
}

// ==========================================
// Test: scheduler end-to-end with fragmentation
// ==========================================
#[test]
fn test_scheduler_fragments_conserve_quantity() {
    let scheduler = ProductionScheduler::new(WorkCalendar::default(), ScheduleConfig::default());

    let orders = vec![order(
        1,
        1,
        vec![step(1, 10, Some(1), 250.0, 10.0), step(2, 20, Some(2), 250.0, 20.0)],
    )];
    let timeline = scheduler.build_timeline(&orders, date(2)).unwrap();
    let fragments = scheduler.fragment(&timeline);

    // Every fragment lands on a working day
    let cal = WorkCalendar::default();
    for frag in &fragments {
        assert!(cal.is_working_day(frag.date), "fragment on {}", frag.date);
    }

    // Per-step totals survive the slicing exactly (all spans single-day)
    for step_id in [1i64, 2] {
        let total: f64 = fragments
            .iter()
            .filter(|f| f.step_id == step_id)
            .map(|f| f.quantity)
            .sum();
        assert!(
            (total - 250.0).abs() < 1e-6,
            "step {} total {}",
            step_id,
            total
        );
    }

    // End date tracks the latest interval end
    let end_date = scheduler.program_end_date(date(2), &timeline);
    assert_eq!(Some(end_date), timeline.latest_end().map(|e| e.date()));
}

// ==========================================
// Test: unschedulable steps vanish without breaking the route
// ==========================================
#[test]
fn test_invalid_steps_are_skipped_not_errored() {
    let scheduler = ProductionScheduler::new(WorkCalendar::default(), ScheduleConfig::default());

    let orders = vec![order(
        1,
        1,
        vec![
            step(1, 10, Some(1), 50.0, 10.0),
            step(2, 20, Some(2), 50.0, 0.0),  // invalid rate
            step(3, 30, Some(2), 0.0, 10.0),  // invalid quantity
            step(4, 40, Some(2), 50.0, 10.0),
        ],
    )];
    let timeline = scheduler.build_timeline(&orders, date(2)).unwrap();

    let ids: Vec<i64> = timeline.steps.iter().map(|s| s.step_id).collect();
    assert_eq!(ids, vec![1, 4]);
}
