//! Store-everything schedule with adjoint dependencies on disk.

use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleError, ScheduleResult, StorageKind,
    UNBOUNDED,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Emitting the sentinel forward, then `EndForward` after finalize.
    Forward,
    /// Emit the next `Copy`/`Move` out of disk.
    Transfer,
    /// Emit the next `Reverse`.
    Reverse,
    /// Emit `EndReverse`.
    EndSweep,
    /// Concluded (`move_data` only).
    Done,
}

/// A schedule where the adjoint dependencies of every step are written to
/// disk during the forward sweep.
///
/// The reverse sweep brings each step's data back into the working buffer
/// (with `Copy`, or with `Move` when [`SingleDiskStorage::with_move_data`]
/// is set) and retreats the adjoint one step at a time. Online. Without
/// `move_data` the disk retains everything and unlimited adjoint sweeps are
/// permitted; with `move_data` the first sweep consumes the data and the
/// schedule concludes.
#[derive(Clone, Debug)]
pub struct SingleDiskStorage {
    cursor: ScheduleCursor,
    phase: Phase,
    forward_emitted: bool,
    move_data: bool,
}

impl SingleDiskStorage {
    /// Creates the schedule. The step count is fixed later via `finalize`.
    pub fn new() -> Self {
        SingleDiskStorage {
            cursor: ScheduleCursor::unbounded(),
            phase: Phase::Forward,
            forward_emitted: false,
            move_data: false,
        }
    }

    /// Relocate data out of disk instead of copying during the reverse
    /// sweep. Limits the schedule to a single adjoint calculation.
    pub fn with_move_data(mut self, move_data: bool) -> Self {
        self.move_data = move_data;
        self
    }
}

impl Default for SingleDiskStorage {
    fn default() -> Self {
        SingleDiskStorage::new()
    }
}

impl CheckpointSchedule for SingleDiskStorage {
    fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
        match self.phase {
            Phase::Forward => {
                if !self.forward_emitted {
                    self.forward_emitted = true;
                    self.cursor.n = UNBOUNDED;
                    return Ok(Some(Action::Forward {
                        n0: 0,
                        n1: UNBOUNDED,
                        write_ics: false,
                        write_adj_deps: true,
                        storage: StorageKind::Disk,
                    }));
                }
                if self.cursor.max_n.is_none() {
                    return Ok(None);
                }
                self.phase = Phase::Transfer;
                Ok(Some(Action::EndForward))
            }
            Phase::Transfer => {
                let max_n = self.cursor.require_max_n()?;
                // The data chunk of the step about to be reversed.
                let n0 = max_n - self.cursor.r - 1;
                self.cursor.n = n0;
                self.phase = Phase::Reverse;
                let action = if self.move_data {
                    Action::Move {
                        n: n0,
                        from_storage: StorageKind::Disk,
                        to_storage: StorageKind::Work,
                    }
                } else {
                    Action::Copy {
                        n: n0,
                        from_storage: StorageKind::Disk,
                        to_storage: StorageKind::Work,
                    }
                };
                Ok(Some(action))
            }
            Phase::Reverse => {
                let max_n = self.cursor.require_max_n()?;
                let n1 = max_n - self.cursor.r;
                self.cursor.r += 1;
                self.phase = if self.cursor.r == max_n {
                    Phase::EndSweep
                } else {
                    Phase::Transfer
                };
                Ok(Some(Action::Reverse {
                    n1,
                    n0: n1 - 1,
                    clear_adj_deps: true,
                }))
            }
            Phase::EndSweep => {
                self.cursor.r = 0;
                self.phase = if self.move_data {
                    Phase::Done
                } else {
                    Phase::Transfer
                };
                Ok(Some(Action::EndReverse))
            }
            Phase::Done => Err(ScheduleError::IterationAfterExhausted),
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
        self.phase == Phase::Done
    }

    fn uses_storage_kind(&self, kind: StorageKind) -> bool {
        kind == StorageKind::Disk || kind == StorageKind::Work
    }
}
