//! The checkpointing schedule protocol.
//!
//! A schedule is a stateful iterator over [`Action`] values. Schedules run
//! in one of two modes: *offline*, where the number of forward steps is
//! known at construction, and *online*, where it is fixed later through
//! [`CheckpointSchedule::finalize`].

use crate::types::action::{Action, StorageKind};
use crate::types::error::{ScheduleError, ScheduleResult};

/// A checkpointing schedule.
///
/// Implementations are deterministic: two schedules constructed with
/// identical inputs produce identical action streams. All planning is pure
/// computation; advancing the iterator performs no I/O.
pub trait CheckpointSchedule {
    /// Produces the next action of the schedule.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(action))`: the next action for the driver to execute.
    /// - `Ok(None)`: no action is available until [`finalize`] is called.
    ///   Only online schedules in their forward phase return this.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::IterationAfterExhausted`] once the schedule has
    /// concluded with its terminal `EndReverse`. Schedules that permit
    /// repeated adjoint sweeps never conclude and never return this.
    ///
    /// [`finalize`]: CheckpointSchedule::finalize
    fn next_action(&mut self) -> ScheduleResult<Option<Action>>;

    /// Fixes the number of forward steps of an online schedule.
    ///
    /// Idempotent once the step count is fixed: calling again with the same
    /// value succeeds and does nothing.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::InvalidSteps`] if `steps` is zero.
    /// - [`ScheduleError::FinalizeConflict`] if the step count was already
    ///   fixed to a different value, or if the forward frontier has not yet
    ///   advanced past `steps`.
    fn finalize(&mut self, steps: usize) -> ScheduleResult<()>;

    /// The number of forward steps, once known.
    fn max_n(&self) -> Option<usize>;

    /// The step at the forward frontier: after executing all actions
    /// produced so far, the forward solver is at the start of this step.
    fn forward_frontier(&self) -> usize;

    /// The number of adjoint steps completed in the current reverse sweep.
    fn reverse_steps(&self) -> usize;

    /// Whether no useful work remains. Schedules permitting repeated
    /// adjoint sweeps never become exhausted.
    fn is_exhausted(&self) -> bool;

    /// Whether the schedule may direct data into the given storage kind.
    fn uses_storage_kind(&self, kind: StorageKind) -> bool;

    /// Whether the schedule may store checkpoints on disk.
    fn uses_disk_storage(&self) -> bool {
        self.uses_storage_kind(StorageKind::Disk)
    }

    /// Whether at least one action has been produced.
    fn has_started(&self) -> bool {
        self.forward_frontier() > 0 || self.reverse_steps() > 0
    }

    /// Adapts the schedule into an [`Iterator`] over its actions.
    ///
    /// The iterator ends cleanly when the schedule is exhausted or parked
    /// awaiting `finalize`; any other error is yielded once.
    fn actions(&mut self) -> ActionIter<'_, Self>
    where
        Self: Sized,
    {
        ActionIter {
            schedule: self,
            fused: false,
        }
    }
}

/// Iterator adapter over a schedule's action stream.
///
/// Produced by [`CheckpointSchedule::actions`].
pub struct ActionIter<'a, S: CheckpointSchedule> {
    schedule: &'a mut S,
    fused: bool,
}

impl<S: CheckpointSchedule> Iterator for ActionIter<'_, S> {
    type Item = ScheduleResult<Action>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.schedule.next_action() {
            Ok(Some(action)) => Some(Ok(action)),
            Ok(None) => None,
            Err(ScheduleError::IterationAfterExhausted) => None,
            Err(err) => {
                self.fused = true;
                Some(Err(err))
            }
        }
    }
}

/// Shared frontier bookkeeping embedded by every schedule.
///
/// Tracks the forward frontier `n`, the reverse progress `r`, and the step
/// count `max_n`, and centralises the `finalize` rules so every schedule
/// resolves conflicts identically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleCursor {
    /// Forward frontier: the forward solver is at the start of this step.
    pub n: usize,
    /// Adjoint steps completed in the current reverse sweep.
    pub r: usize,
    /// Number of forward steps, once known.
    pub max_n: Option<usize>,
}

impl ScheduleCursor {
    /// Creates a cursor for an offline schedule with a known step count.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidSteps`] if `max_n` is zero.
    pub fn bounded(max_n: usize) -> ScheduleResult<Self> {
        if max_n < 1 {
            return Err(ScheduleError::InvalidSteps { steps: max_n });
        }
        Ok(ScheduleCursor {
            n: 0,
            r: 0,
            max_n: Some(max_n),
        })
    }

    /// Creates a cursor for an online schedule; the step count is fixed
    /// later through [`finalize`](ScheduleCursor::finalize).
    pub fn unbounded() -> Self {
        ScheduleCursor::default()
    }

    /// The step count, or an internal error when it is still unknown.
    ///
    /// Used by schedules at points their own phase logic guarantees the
    /// count has been fixed.
    pub fn require_max_n(&self) -> ScheduleResult<usize> {
        self.max_n
            .ok_or_else(|| ScheduleError::internal("step count not finalized"))
    }

    /// Applies the finalize rules shared by all schedules.
    ///
    /// On success the forward frontier is clamped back from the sentinel to
    /// the true step count.
    ///
    /// # Errors
    ///
    /// See [`CheckpointSchedule::finalize`].
    pub fn finalize(&mut self, steps: usize) -> ScheduleResult<()> {
        if steps < 1 {
            return Err(ScheduleError::InvalidSteps { steps });
        }
        match self.max_n {
            Some(max_n) if max_n == steps => Ok(()),
            Some(max_n) => Err(ScheduleError::FinalizeConflict {
                requested: steps,
                frontier: max_n,
            }),
            None if self.n >= steps => {
                self.n = steps;
                self.max_n = Some(steps);
                Ok(())
            }
            None => Err(ScheduleError::FinalizeConflict {
                requested: steps,
                frontier: self.n,
            }),
        }
    }
}
