//! Forward-only schedule for runs without an adjoint calculation.

use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleError, ScheduleResult, StorageKind,
    UNBOUNDED,
};

/// A schedule for the case where no adjoint calculation is performed.
///
/// Emits a single unbounded `Forward` carrying no storage requests and,
/// once the driver fixes the step count through `finalize`, the terminal
/// `EndForward`. No reverse phase follows.
///
/// # Examples
///
/// ```
/// use adjoint_core::{Action, CheckpointSchedule, StorageKind, UNBOUNDED};
/// use adjoint_schedules::basic::NoAdjoint;
///
/// let mut schedule = NoAdjoint::new();
/// assert_eq!(
///     schedule.next_action().unwrap(),
///     Some(Action::Forward {
///         n0: 0,
///         n1: UNBOUNDED,
///         write_ics: false,
///         write_adj_deps: false,
///         storage: StorageKind::None,
///     })
/// );
/// schedule.finalize(4).unwrap();
/// assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));
/// assert!(schedule.is_exhausted());
/// ```
#[derive(Clone, Debug)]
pub struct NoAdjoint {
    cursor: ScheduleCursor,
    forward_emitted: bool,
    exhausted: bool,
}

impl NoAdjoint {
    /// Creates the schedule. The step count is fixed later via `finalize`.
    pub fn new() -> Self {
        NoAdjoint {
            cursor: ScheduleCursor::unbounded(),
            forward_emitted: false,
            exhausted: false,
        }
    }
}

impl Default for NoAdjoint {
    fn default() -> Self {
        NoAdjoint::new()
    }
}

impl CheckpointSchedule for NoAdjoint {
    fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
        if self.exhausted {
            return Err(ScheduleError::IterationAfterExhausted);
        }
        if !self.forward_emitted {
            self.forward_emitted = true;
            self.cursor.n = UNBOUNDED;
            return Ok(Some(Action::Forward {
                n0: 0,
                n1: UNBOUNDED,
                write_ics: false,
                write_adj_deps: false,
                storage: StorageKind::None,
            }));
        }
        if self.cursor.max_n.is_none() {
            // Parked until the driver finalizes.
            return Ok(None);
        }
        self.exhausted = true;
        Ok(Some(Action::EndForward))
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
        self.exhausted
    }

    fn uses_storage_kind(&self, _kind: StorageKind) -> bool {
        false
    }
}
