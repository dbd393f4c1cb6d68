//! Store-everything schedule with adjoint dependencies live in memory.

use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleResult, StorageKind, StorageLevel,
    UNBOUNDED,
};

/// Which phase of the schedule the iterator is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Forward,
    EndForward,
    Reverse,
    EndReverse,
}

/// A schedule where the adjoint dependencies of every step are kept live.
///
/// The forward sweep stores the adjoint-dependency data of all steps in the
/// driver's working buffer; the reverse sweep is then a single `Reverse`
/// over the whole step range. Online; unlimited adjoint sweeps are
/// permitted, so the schedule never becomes exhausted.
///
/// Optionally the restart state of step 0 can also be persisted
/// ([`SingleMemoryStorage::with_ics`]), which lets a driver restart the
/// whole calculation from scratch later.
///
/// # Examples
///
/// ```
/// use adjoint_core::{Action, CheckpointSchedule, StorageKind, UNBOUNDED};
/// use adjoint_schedules::basic::SingleMemoryStorage;
///
/// let mut schedule = SingleMemoryStorage::new();
/// schedule.next_action().unwrap();
/// schedule.finalize(4).unwrap();
/// assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));
/// assert_eq!(
///     schedule.next_action().unwrap(),
///     Some(Action::Reverse { n1: 4, n0: 0, clear_adj_deps: true })
/// );
/// ```
#[derive(Clone, Debug)]
pub struct SingleMemoryStorage {
    cursor: ScheduleCursor,
    phase: Phase,
    forward_emitted: bool,
    storage_ics: Option<StorageLevel>,
}

impl SingleMemoryStorage {
    /// Creates the schedule. The step count is fixed later via `finalize`.
    pub fn new() -> Self {
        SingleMemoryStorage {
            cursor: ScheduleCursor::unbounded(),
            phase: Phase::Forward,
            forward_emitted: false,
            storage_ics: None,
        }
    }

    /// Also persist the restart state of step 0 into `storage`.
    ///
    /// The forward action then carries `write_ics == true` with both
    /// datasets directed at `storage`.
    pub fn with_ics(mut self, storage: StorageLevel) -> Self {
        self.storage_ics = Some(storage);
        self
    }
}

impl Default for SingleMemoryStorage {
    fn default() -> Self {
        SingleMemoryStorage::new()
    }
}

impl CheckpointSchedule for SingleMemoryStorage {
    fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
        match self.phase {
            Phase::Forward => {
                if !self.forward_emitted {
                    self.forward_emitted = true;
                    self.cursor.n = UNBOUNDED;
                    let storage = match self.storage_ics {
                        Some(level) => level.kind(),
                        None => StorageKind::Work,
                    };
                    return Ok(Some(Action::Forward {
                        n0: 0,
                        n1: UNBOUNDED,
                        write_ics: self.storage_ics.is_some(),
                        write_adj_deps: true,
                        storage,
                    }));
                }
                if self.cursor.max_n.is_none() {
                    return Ok(None);
                }
                self.phase = Phase::EndForward;
                Ok(Some(Action::EndForward))
            }
            Phase::EndForward | Phase::EndReverse => {
                let max_n = self.cursor.require_max_n()?;
                self.cursor.r = max_n;
                self.phase = Phase::Reverse;
                Ok(Some(Action::Reverse {
                    n1: max_n,
                    n0: 0,
                    clear_adj_deps: true,
                }))
            }
            Phase::Reverse => {
                self.cursor.r = 0;
                self.phase = Phase::EndReverse;
                Ok(Some(Action::EndReverse))
            }
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
        false
    }

    fn uses_storage_kind(&self, kind: StorageKind) -> bool {
        match self.storage_ics {
            Some(level) => kind == StorageKind::Work || kind == level.kind(),
            None => kind == StorageKind::Work,
        }
    }
}
