//! Integration tests for the driver protocol surface.
//!
//! Exercises the trait machinery against a minimal hand-written schedule,
//! independent of any planner.

use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleError, ScheduleResult, StorageKind,
};

/// A two-action schedule: forward over everything, then end.
struct TinySchedule {
    cursor: ScheduleCursor,
    pos: usize,
}

impl TinySchedule {
    fn new(max_n: usize) -> ScheduleResult<Self> {
        Ok(TinySchedule {
            cursor: ScheduleCursor::bounded(max_n)?,
            pos: 0,
        })
    }
}

impl CheckpointSchedule for TinySchedule {
    fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
        let max_n = self.cursor.require_max_n()?;
        self.pos += 1;
        match self.pos {
            1 => {
                self.cursor.n = max_n;
                Ok(Some(Action::Forward {
                    n0: 0,
                    n1: max_n,
                    write_ics: false,
                    write_adj_deps: false,
                    storage: StorageKind::None,
                }))
            }
            2 => Ok(Some(Action::EndForward)),
            _ => Err(ScheduleError::IterationAfterExhausted),
        }
    }

    fn finalize(&mut self, steps: usize) -> ScheduleResult<()> {
        self.cursor.finalize(steps)
    }

    fn max_n(&self) -> Option<usize> {
        self.cursor.max_n
    }

    fn forward_frontier(&self) -> usize {
        self.cursor.n
    }

    fn reverse_steps(&self) -> usize {
        self.cursor.r
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= 2
    }

    fn uses_storage_kind(&self, _kind: StorageKind) -> bool {
        false
    }
}

#[test]
fn action_iter_ends_cleanly_on_exhaustion() {
    let mut schedule = TinySchedule::new(3).unwrap();
    let actions: Vec<Action> = schedule.actions().map(Result::unwrap).collect();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1], Action::EndForward);
}

#[test]
fn has_started_tracks_frontier() {
    let mut schedule = TinySchedule::new(3).unwrap();
    assert!(!schedule.has_started());
    schedule.next_action().unwrap();
    assert!(schedule.has_started());
}

#[test]
fn default_disk_predicate_follows_storage_kinds() {
    let schedule = TinySchedule::new(3).unwrap();
    assert!(!schedule.uses_disk_storage());
}

#[test]
fn offline_finalize_rules() {
    let mut schedule = TinySchedule::new(3).unwrap();
    schedule.finalize(3).unwrap();
    assert_eq!(
        schedule.finalize(4),
        Err(ScheduleError::FinalizeConflict {
            requested: 4,
            frontier: 3
        })
    );
    assert_eq!(
        schedule.finalize(0),
        Err(ScheduleError::InvalidSteps { steps: 0 })
    );
}
