//! Two-level periodic/binomial checkpointing schedule.

use crate::binomial::{n_advance, Trajectory};
use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleError, ScheduleResult, StorageKind,
    StorageLevel,
};
use std::collections::VecDeque;

/// A two-level mixed periodic/binomial checkpointing schedule.
///
/// The forward sweep writes a restart checkpoint to disk every `period`
/// steps; the step count need not be known up front. During the reverse
/// sweep each period block is replayed from its disk checkpoint with an
/// inner binomial schedule bounded by `binomial_snapshots` additional slots
/// in `binomial_storage`.
///
/// The periodic disk checkpoints are only ever copied, never consumed, so
/// the schedule supports unlimited adjoint sweeps and never becomes
/// exhausted.
///
/// # Examples
///
/// ```
/// use adjoint_core::{Action, CheckpointSchedule, StorageKind};
/// use adjoint_schedules::two_level::TwoLevel;
///
/// let mut schedule = TwoLevel::new(3, 1).unwrap();
/// assert_eq!(
///     schedule.next_action().unwrap(),
///     Some(Action::Forward {
///         n0: 0,
///         n1: 3,
///         write_ics: true,
///         write_adj_deps: false,
///         storage: StorageKind::Disk,
///     })
/// );
/// schedule.next_action().unwrap(); // second period block
/// schedule.finalize(5).unwrap();
/// assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));
/// ```
#[derive(Clone, Debug)]
pub struct TwoLevel {
    cursor: ScheduleCursor,
    period: usize,
    binomial_snapshots: usize,
    binomial_storage: StorageLevel,
    trajectory: Trajectory,
    end_forward_emitted: bool,
    queue: VecDeque<Action>,
}

impl TwoLevel {
    /// Creates a schedule writing a disk checkpoint every `period` steps,
    /// with `binomial_snapshots` additional slots on disk for the inner
    /// binomial recomputation.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidSteps`] if `period` is zero.
    pub fn new(period: usize, binomial_snapshots: usize) -> ScheduleResult<Self> {
        TwoLevel::with_options(
            period,
            binomial_snapshots,
            StorageLevel::Disk,
            Trajectory::Maximum,
        )
    }

    /// As [`TwoLevel::new`], selecting the storage level of the inner
    /// binomial checkpoints and the binomial step rule.
    pub fn with_options(
        period: usize,
        binomial_snapshots: usize,
        binomial_storage: StorageLevel,
        trajectory: Trajectory,
    ) -> ScheduleResult<Self> {
        if period < 1 {
            return Err(ScheduleError::InvalidSteps { steps: period });
        }
        Ok(TwoLevel {
            cursor: ScheduleCursor::unbounded(),
            period,
            binomial_snapshots,
            binomial_storage,
            trajectory,
            end_forward_emitted: false,
            queue: VecDeque::new(),
        })
    }

    /// The period of the outer disk checkpoints.
    pub fn period(&self) -> usize {
        self.period
    }

    fn observe(&mut self, action: Action) {
        match action {
            Action::Forward { n1, .. } => self.cursor.n = n1,
            Action::Reverse { n1, n0, .. } => self.cursor.r += n1 - n0,
            Action::Copy { n, .. } | Action::Move { n, .. } => self.cursor.n = n,
            Action::EndForward => {}
            Action::EndReverse => self.cursor.r = 0,
        }
    }
}

impl CheckpointSchedule for TwoLevel {
    fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
        if self.cursor.max_n.is_none() {
            // Forward phase: one period block per call until finalized.
            let n0 = self.cursor.n;
            let n1 = n0.saturating_add(self.period);
            self.cursor.n = n1;
            return Ok(Some(Action::Forward {
                n0,
                n1,
                write_ics: true,
                write_adj_deps: false,
                storage: StorageKind::Disk,
            }));
        }
        if !self.end_forward_emitted {
            self.end_forward_emitted = true;
            return Ok(Some(Action::EndForward));
        }
        if self.queue.is_empty() {
            let max_n = self.cursor.require_max_n()?;
            self.queue = build_reverse_sweep(
                max_n,
                self.period,
                self.binomial_snapshots,
                self.binomial_storage,
                self.trajectory,
            )?;
        }
        let action = self
            .queue
            .pop_front()
            .ok_or_else(|| ScheduleError::internal("empty reverse sweep"))?;
        self.observe(action);
        Ok(Some(action))
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
        kind == StorageKind::Disk
            || kind == StorageKind::Work
            || kind == self.binomial_storage.kind()
    }
}

/// Expands one full reverse sweep, block by block from the last period
/// block down to step 0.
fn build_reverse_sweep(
    max_n: usize,
    period: usize,
    binomial_snapshots: usize,
    binomial_storage: StorageLevel,
    trajectory: Trajectory,
) -> ScheduleResult<VecDeque<Action>> {
    let mut actions = VecDeque::new();
    let mut r = 0;
    let mut n;

    while r < max_n {
        let last = max_n - r - 1;
        let block_start = (last / period) * period;
        let block_end = (block_start + period).min(max_n);
        if r != max_n - block_end {
            return Err(ScheduleError::internal("reverse frontier off block grid"));
        }

        // Inner snapshot stack; slot 0 is the block's disk anchor.
        let mut snapshots = vec![block_start];
        while r < max_n - block_start {
            let cp_n = *snapshots
                .last()
                .ok_or_else(|| ScheduleError::internal("inner snapshot stack empty"))?;
            if cp_n == max_n - r - 1 {
                snapshots.pop();
                n = cp_n;
                if cp_n == block_start {
                    // The periodic checkpoint stays for later sweeps.
                    actions.push_back(Action::Copy {
                        n: cp_n,
                        from_storage: StorageKind::Disk,
                        to_storage: StorageKind::Work,
                    });
                } else {
                    actions.push_back(Action::Move {
                        n: cp_n,
                        from_storage: binomial_storage.kind(),
                        to_storage: StorageKind::Work,
                    });
                }
            } else {
                n = cp_n;
                actions.push_back(Action::Copy {
                    n: cp_n,
                    from_storage: if cp_n == block_start {
                        StorageKind::Disk
                    } else {
                        binomial_storage.kind()
                    },
                    to_storage: StorageKind::Work,
                });

                let available = binomial_snapshots + 1 - snapshots.len() + 1;
                let n0 = n;
                let n1 = n0 + n_advance(max_n - r - n0, available, trajectory)?;
                n = n1;
                actions.push_back(Action::Forward {
                    n0,
                    n1,
                    write_ics: false,
                    write_adj_deps: false,
                    storage: StorageKind::Work,
                });

                while n < max_n - r - 1 {
                    let available = binomial_snapshots + 1 - snapshots.len();
                    let n0 = n;
                    let n1 = n0 + n_advance(max_n - r - n0, available, trajectory)?;
                    n = n1;
                    actions.push_back(Action::Forward {
                        n0,
                        n1,
                        write_ics: true,
                        write_adj_deps: false,
                        storage: binomial_storage.kind(),
                    });
                    if snapshots.len() >= binomial_snapshots + 1 {
                        return Err(ScheduleError::internal("inner snapshot stack overflow"));
                    }
                    snapshots.push(n0);
                }
                if n != max_n - r - 1 {
                    return Err(ScheduleError::internal("recomputation overshot frontier"));
                }
            }

            n += 1;
            actions.push_back(Action::Forward {
                n0: n - 1,
                n1: n,
                write_ics: false,
                write_adj_deps: true,
                storage: StorageKind::Work,
            });
            r += 1;
            actions.push_back(Action::Reverse {
                n1: n,
                n0: n - 1,
                clear_adj_deps: true,
            });
        }
        if !snapshots.is_empty() {
            return Err(ScheduleError::internal("inner snapshot stack not drained"));
        }
    }

    actions.push_back(Action::EndReverse);
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_sweep(schedule: &mut TwoLevel) -> Vec<Action> {
        let mut actions = Vec::new();
        loop {
            let action = schedule.next_action().unwrap().unwrap();
            actions.push(action);
            if action == Action::EndReverse {
                break;
            }
        }
        actions
    }

    #[test]
    fn test_rejects_zero_period() {
        assert!(matches!(
            TwoLevel::new(0, 1),
            Err(ScheduleError::InvalidSteps { .. })
        ));
    }

    #[test]
    fn test_forward_emits_period_blocks() {
        let mut schedule = TwoLevel::new(5, 1).unwrap();
        for k in 0..3 {
            assert_eq!(
                schedule.next_action().unwrap(),
                Some(Action::Forward {
                    n0: 5 * k,
                    n1: 5 * (k + 1),
                    write_ics: true,
                    write_adj_deps: false,
                    storage: StorageKind::Disk,
                })
            );
        }
        // The driver ran out of steps at 12, inside the third block.
        schedule.finalize(12).unwrap();
        assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));
        assert_eq!(schedule.max_n(), Some(12));
    }

    #[test]
    fn test_reverse_sweep_consumes_all_steps() {
        let mut schedule = TwoLevel::new(4, 1).unwrap();
        for _ in 0..3 {
            schedule.next_action().unwrap();
        }
        schedule.finalize(10).unwrap();
        schedule.next_action().unwrap(); // EndForward

        let actions = drain_sweep(&mut schedule);
        let reversed: usize = actions
            .iter()
            .map(|a| match a {
                Action::Reverse { n1, n0, .. } => n1 - n0,
                _ => 0,
            })
            .sum();
        assert_eq!(reversed, 10);
        assert_eq!(actions.last(), Some(&Action::EndReverse));
    }

    #[test]
    fn test_periodic_checkpoints_survive_for_next_sweep() {
        let mut schedule = TwoLevel::new(3, 1).unwrap();
        for _ in 0..2 {
            schedule.next_action().unwrap();
        }
        schedule.finalize(6).unwrap();
        schedule.next_action().unwrap(); // EndForward

        let first = drain_sweep(&mut schedule);
        // Disk anchors are copied, never moved.
        assert!(first
            .iter()
            .all(|a| !matches!(a, Action::Move { from_storage: StorageKind::Disk, .. })));

        // A second full sweep is available and identical.
        let second = drain_sweep(&mut schedule);
        assert_eq!(first, second);
        assert!(!schedule.is_exhausted());
    }

    #[test]
    fn test_zero_binomial_snapshots_recomputes_blocks() {
        let mut schedule = TwoLevel::new(3, 0).unwrap();
        schedule.next_action().unwrap();
        schedule.finalize(3).unwrap();
        schedule.next_action().unwrap(); // EndForward
        let actions = drain_sweep(&mut schedule);
        // Every restart comes from the single periodic checkpoint.
        for action in &actions {
            if let Action::Copy { n, .. } = action {
                assert_eq!(*n, 0);
            }
        }
        assert_eq!(actions.last(), Some(&Action::EndReverse));
    }

    #[test]
    fn test_ram_binomial_storage() {
        let mut schedule =
            TwoLevel::with_options(4, 2, StorageLevel::Ram, Trajectory::Maximum).unwrap();
        schedule.next_action().unwrap();
        schedule.next_action().unwrap();
        schedule.finalize(8).unwrap();
        schedule.next_action().unwrap(); // EndForward
        let actions = drain_sweep(&mut schedule);
        assert!(schedule.uses_storage_kind(StorageKind::Ram));
        // Inner checkpoints land in RAM; periodic anchors stay on disk.
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::Forward {
                write_ics: true,
                storage: StorageKind::Ram,
                ..
            }
        )));
    }

    #[test]
    fn test_inner_stack_bounded() {
        // The inner snapshot stack (anchor included) never exceeds
        // binomial_snapshots + 1 live entries.
        let binomial_snapshots = 2;
        let mut schedule = TwoLevel::new(7, binomial_snapshots).unwrap();
        for _ in 0..3 {
            schedule.next_action().unwrap();
        }
        schedule.finalize(21).unwrap();
        schedule.next_action().unwrap(); // EndForward

        let mut live: i64 = 0;
        for action in drain_sweep(&mut schedule) {
            match action {
                Action::Forward {
                    write_ics: true, ..
                } => live += 1,
                Action::Move { .. } => live -= 1,
                Action::EndReverse => break,
                _ => {}
            }
            assert!(live <= binomial_snapshots as i64);
        }
    }
}
