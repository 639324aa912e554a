// ==========================================
// Job-Shop APS - Machine availability tracking
// ==========================================
// A machine holds a time-ordered list of committed intervals, each
// tagged with the owning step's program priority. Conflict tests pad
// every committed interval with the setup buffer on both sides.
//
// MachineTimelineState is a per-scheduling-run value threaded through
// the build - never process-wide state - so concurrent programs can be
// scheduled in parallel without coordination.
// ==========================================

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

// ==========================================
// CommittedInterval
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedInterval {
    pub step_id: i64,
    pub order_id: i64,
    pub priority: u32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

// ==========================================
// ConflictCheck - result of a proposal test
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictCheck {
    pub has_conflict: bool,
    /// Where the proposal can start; when the proposal wins on priority
    /// this is its own start and the committed step must move instead
    pub next_free_start: NaiveDateTime,
    pub conflicting_step: Option<i64>,
    /// True when the proposal has strictly better (lower) priority than
    /// the conflicting committed step
    pub displaces_existing: bool,
}

// ==========================================
// MachineTimeline
// ==========================================
#[derive(Debug, Clone)]
pub struct MachineTimeline {
    machine_id: i64,
    committed: Vec<CommittedInterval>, // kept ordered by (start, priority)
}

impl MachineTimeline {
    pub fn new(machine_id: i64) -> Self {
        Self {
            machine_id,
            committed: Vec::new(),
        }
    }

    pub fn machine_id(&self) -> i64 {
        self.machine_id
    }

    pub fn committed(&self) -> &[CommittedInterval] {
        &self.committed
    }

    /// Test a proposed interval against the committed timeline
    ///
    /// Overlap rule: `proposed_start < committed_end + setup AND
    /// proposed_end > committed_start - setup`. Lower priority value wins:
    /// a strictly better proposal displaces the committed step, anything
    /// else is pushed past the conflicting interval's end plus setup.
    pub fn check_conflict(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        priority: u32,
        setup: Duration,
    ) -> ConflictCheck {
        for committed in &self.committed {
            let padded_start = committed.start - setup;
            let padded_end = committed.end + setup;
            if start < padded_end && end > padded_start {
                let displaces = priority < committed.priority;
                return ConflictCheck {
                    has_conflict: true,
                    next_free_start: if displaces { start } else { padded_end },
                    conflicting_step: Some(committed.step_id),
                    displaces_existing: displaces,
                };
            }
        }

        ConflictCheck {
            has_conflict: false,
            next_free_start: start,
            conflicting_step: None,
            displaces_existing: false,
        }
    }

    /// Commit an interval, keeping the list time-ordered
    pub fn commit(&mut self, interval: CommittedInterval) {
        let at = self
            .committed
            .partition_point(|c| (c.start, c.priority) <= (interval.start, interval.priority));
        self.committed.insert(at, interval);
    }

    /// Remove a committed interval so a better-priority proposal can take
    /// its place; returns the removed interval for rescheduling
    pub fn displace(&mut self, step_id: i64) -> Option<CommittedInterval> {
        let idx = self.committed.iter().position(|c| c.step_id == step_id)?;
        Some(self.committed.remove(idx))
    }
}

// ==========================================
// MachineTimelineState - per-run accumulation
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct MachineTimelineState {
    timelines: BTreeMap<i64, MachineTimeline>,
}

impl MachineTimelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeline_mut(&mut self, machine_id: i64) -> &mut MachineTimeline {
        self.timelines
            .entry(machine_id)
            .or_insert_with(|| MachineTimeline::new(machine_id))
    }

    pub fn timelines(&self) -> impl Iterator<Item = &MachineTimeline> {
        self.timelines.values()
    }

    /// Global post-condition: no two committed intervals on any machine
    /// overlap once padded with the setup buffer
    pub fn is_overlap_free(&self, setup: Duration) -> bool {
        for timeline in self.timelines.values() {
            let committed = timeline.committed();
            for (i, a) in committed.iter().enumerate() {
                for b in &committed[i + 1..] {
                    if a.start < b.end + setup && a.end + setup > b.start {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn committed(step_id: i64, priority: u32, start: NaiveDateTime, end: NaiveDateTime) -> CommittedInterval {
        CommittedInterval {
            step_id,
            order_id: step_id,
            priority,
            start,
            end,
        }
    }

    #[test]
    fn test_no_conflict_on_empty_timeline() {
        let tl = MachineTimeline::new(1);
        let check = tl.check_conflict(dt(2, 8, 0), dt(2, 10, 0), 1, Duration::minutes(30));
        assert!(!check.has_conflict);
        assert_eq!(check.next_free_start, dt(2, 8, 0));
    }

    #[test]
    fn test_worse_priority_is_pushed_past_end_plus_setup() {
        let mut tl = MachineTimeline::new(1);
        tl.commit(committed(1, 1, dt(2, 8, 0), dt(2, 10, 0)));

        let check = tl.check_conflict(dt(2, 9, 0), dt(2, 11, 0), 2, Duration::minutes(30));
        assert!(check.has_conflict);
        assert!(!check.displaces_existing);
        assert_eq!(check.conflicting_step, Some(1));
        assert_eq!(check.next_free_start, dt(2, 10, 30));
    }

    #[test]
    fn test_better_priority_displaces_existing() {
        let mut tl = MachineTimeline::new(1);
        tl.commit(committed(7, 5, dt(2, 8, 0), dt(2, 10, 0)));

        let check = tl.check_conflict(dt(2, 8, 0), dt(2, 10, 0), 1, Duration::minutes(30));
        assert!(check.has_conflict);
        assert!(check.displaces_existing);
        // The proposal keeps its own start; the committed step must move
        assert_eq!(check.next_free_start, dt(2, 8, 0));

        let removed = tl.displace(7).unwrap();
        assert_eq!(removed.step_id, 7);
        assert!(tl.committed().is_empty());
    }

    #[test]
    fn test_equal_priority_does_not_displace() {
        let mut tl = MachineTimeline::new(1);
        tl.commit(committed(1, 3, dt(2, 8, 0), dt(2, 10, 0)));

        let check = tl.check_conflict(dt(2, 9, 0), dt(2, 11, 0), 3, Duration::minutes(30));
        assert!(check.has_conflict);
        assert!(!check.displaces_existing);
    }

    #[test]
    fn test_setup_buffer_extends_the_conflict_zone() {
        let mut tl = MachineTimeline::new(1);
        tl.commit(committed(1, 1, dt(2, 8, 0), dt(2, 10, 0)));

        // 10:15 is clear of the raw interval but inside its setup padding
        let check = tl.check_conflict(dt(2, 10, 15), dt(2, 11, 0), 2, Duration::minutes(30));
        assert!(check.has_conflict);

        // 10:30 touches the padded boundary exactly: no overlap
        let check = tl.check_conflict(dt(2, 10, 30), dt(2, 11, 0), 2, Duration::minutes(30));
        assert!(!check.has_conflict);
    }

    #[test]
    fn test_overlap_free_post_condition() {
        let mut state = MachineTimelineState::new();
        state
            .timeline_mut(1)
            .commit(committed(1, 1, dt(2, 8, 0), dt(2, 10, 0)));
        state
            .timeline_mut(1)
            .commit(committed(2, 2, dt(2, 10, 30), dt(2, 12, 0)));
        assert!(state.is_overlap_free(Duration::minutes(30)));

        state
            .timeline_mut(1)
            .commit(committed(3, 3, dt(2, 11, 0), dt(2, 12, 30)));
        assert!(!state.is_overlap_free(Duration::minutes(30)));
    }
}
