//! Two-storage binomial checkpointing schedule.

use crate::binomial::{n_advance, Trajectory};
use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleError, ScheduleResult, StorageKind,
    StorageLevel,
};

const WRITE_WEIGHT: f64 = 1.0;
const READ_WEIGHT: f64 = 1.0;
const DELETE_WEIGHT: f64 = 0.0;

/// A binomial checkpointing schedule distributing its slots between memory
/// and disk.
///
/// The checkpoint positions follow the Griewank–Walther binomial step rule
/// over a single pool of `snaps_in_ram + snaps_on_disk` slots. The split
/// between the two storage levels is decided by a dry run of the
/// single-level schedule that weights every slot by its read/write traffic:
/// the busiest slots go to memory, the rest to disk. Offline; one adjoint
/// calculation permitted.
///
/// # Examples
///
/// ```
/// use adjoint_core::{Action, CheckpointSchedule};
/// use adjoint_schedules::multistage::Multistage;
///
/// let mut schedule = Multistage::new(4, 1, 1).unwrap();
/// let mut count = 0;
/// while let Some(action) = schedule.next_action().unwrap() {
///     count += 1;
///     if action == Action::EndReverse {
///         break;
///     }
/// }
/// assert_eq!(count, 16);
/// ```
#[derive(Clone, Debug)]
pub struct Multistage {
    cursor: ScheduleCursor,
    actions: Vec<Action>,
    pos: usize,
    snaps_in_ram: usize,
    snaps_on_disk: usize,
    exhausted: bool,
}

impl Multistage {
    /// Creates a schedule for `max_n` forward steps with the given slot
    /// budgets, using the [`Trajectory::Maximum`] step rule.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidSteps`] if `max_n` is zero;
    /// [`ScheduleError::InvalidBudget`] if both budgets are zero while more
    /// than one step must be covered.
    pub fn new(max_n: usize, snaps_in_ram: usize, snaps_on_disk: usize) -> ScheduleResult<Self> {
        Multistage::with_trajectory(max_n, snaps_in_ram, snaps_on_disk, Trajectory::Maximum)
    }

    /// As [`Multistage::new`], selecting the binomial step rule.
    pub fn with_trajectory(
        max_n: usize,
        snaps_in_ram: usize,
        snaps_on_disk: usize,
        trajectory: Trajectory,
    ) -> ScheduleResult<Self> {
        let cursor = ScheduleCursor::bounded(max_n)?;
        let snaps_in_ram = snaps_in_ram.min(max_n - 1);
        let snaps_on_disk = snaps_on_disk.min(max_n - 1);
        if max_n > 1 && snaps_in_ram + snaps_on_disk == 0 {
            return Err(ScheduleError::InvalidBudget {
                snapshots: 0,
                steps: max_n,
            });
        }

        let allocation = if snaps_in_ram == 0 {
            vec![StorageLevel::Disk; snaps_on_disk]
        } else if snaps_on_disk == 0 {
            vec![StorageLevel::Ram; snaps_in_ram]
        } else {
            allocate_snapshots(max_n, snaps_in_ram, snaps_on_disk, trajectory)?
        };

        let actions = build_actions(max_n, &allocation, trajectory)?;
        let snaps_in_ram = allocation
            .iter()
            .filter(|&&level| level == StorageLevel::Ram)
            .count();
        let snaps_on_disk = allocation.len() - snaps_in_ram;

        Ok(Multistage {
            cursor,
            actions,
            pos: 0,
            snaps_in_ram,
            snaps_on_disk,
            exhausted: false,
        })
    }

    /// The number of slots allocated to memory.
    pub fn snaps_in_ram(&self) -> usize {
        self.snaps_in_ram
    }

    /// The number of slots allocated to disk.
    pub fn snaps_on_disk(&self) -> usize {
        self.snaps_on_disk
    }

    fn observe(&mut self, action: Action) {
        match action {
            Action::Forward { n1, .. } => self.cursor.n = n1,
            Action::Reverse { n1, n0, .. } => self.cursor.r += n1 - n0,
            Action::Copy { n, .. } | Action::Move { n, .. } => self.cursor.n = n,
            Action::EndForward => {}
            Action::EndReverse => self.exhausted = true,
        }
    }
}

impl CheckpointSchedule for Multistage {
    fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
        if self.exhausted {
            return Err(ScheduleError::IterationAfterExhausted);
        }
        match self.actions.get(self.pos).copied() {
            Some(action) => {
                self.pos += 1;
                self.observe(action);
                Ok(Some(action))
            }
            None => Err(ScheduleError::internal("action stream ended early")),
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
        self.exhausted
    }

    fn uses_storage_kind(&self, kind: StorageKind) -> bool {
        match kind {
            StorageKind::Ram => self.snaps_in_ram > 0,
            StorageKind::Disk => self.snaps_on_disk > 0,
            StorageKind::Work => true,
            StorageKind::None => false,
        }
    }
}

/// Distributes checkpoint slots between memory and disk.
///
/// Runs the single-level binomial schedule once, accumulating the write and
/// read traffic of every slot on the checkpoint stack, then hands the
/// highest-traffic slots to memory. Equal-traffic slots keep stack order,
/// so the distribution is deterministic.
fn allocate_snapshots(
    max_n: usize,
    snaps_in_ram: usize,
    snaps_on_disk: usize,
    trajectory: Trajectory,
) -> ScheduleResult<Vec<StorageLevel>> {
    let total = (snaps_in_ram + snaps_on_disk).min(max_n - 1);
    let dry_run = build_actions(max_n, &vec![StorageLevel::Ram; total], trajectory)?;

    let mut weights = vec![0.0_f64; total];
    // Top of the checkpoint stack during replay; the slot every Copy/Move
    // touches.
    let mut top: Option<usize> = None;
    for action in &dry_run {
        match *action {
            Action::Forward {
                write_ics: true, ..
            } => {
                let slot = top.map_or(0, |i| i + 1);
                if slot >= total {
                    return Err(ScheduleError::internal("snapshot stack overflow"));
                }
                weights[slot] += WRITE_WEIGHT;
                top = Some(slot);
            }
            Action::Copy { .. } => {
                let slot = top.ok_or_else(|| ScheduleError::internal("read from empty stack"))?;
                weights[slot] += READ_WEIGHT;
            }
            Action::Move { .. } => {
                let slot = top.ok_or_else(|| ScheduleError::internal("read from empty stack"))?;
                weights[slot] += READ_WEIGHT + DELETE_WEIGHT;
                top = slot.checked_sub(1);
            }
            _ => {}
        }
    }
    if top.is_some() {
        return Err(ScheduleError::internal("snapshot stack not drained"));
    }

    let mut order: Vec<usize> = (0..total).collect();
    order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));

    let mut allocation = vec![StorageLevel::Disk; total];
    for &slot in order.iter().take(snaps_in_ram) {
        allocation[slot] = StorageLevel::Ram;
    }
    Ok(allocation)
}

/// Expands the binomial schedule into its full action list, storing the
/// k-th checkpoint pushed onto the stack in `storage[k]`.
fn build_actions(
    max_n: usize,
    storage: &[StorageLevel],
    trajectory: Trajectory,
) -> ScheduleResult<Vec<Action>> {
    let total = storage.len();
    let mut actions = Vec::new();
    let mut snapshots: Vec<usize> = Vec::new();
    let mut n = 0;

    // Forward sweep: checkpoint, advance, repeat until one step remains.
    while n < max_n - 1 {
        if snapshots.len() >= total {
            return Err(ScheduleError::internal("snapshot stack overflow"));
        }
        let available = total - snapshots.len();
        let n0 = n;
        let n1 = n0 + n_advance(max_n - n0, available, trajectory)?;
        n = n1;
        let level = storage[snapshots.len()];
        snapshots.push(n0);
        actions.push(Action::Forward {
            n0,
            n1,
            write_ics: true,
            write_adj_deps: false,
            storage: level.kind(),
        });
    }

    // Final step carries the adjoint dependencies, then the sweep turns.
    n += 1;
    actions.push(Action::Forward {
        n0: n - 1,
        n1: n,
        write_ics: false,
        write_adj_deps: true,
        storage: StorageKind::Work,
    });
    actions.push(Action::EndForward);
    let mut r = 1;
    actions.push(Action::Reverse {
        n1: n,
        n0: n - 1,
        clear_adj_deps: true,
    });

    while r < max_n {
        let cp_n = *snapshots
            .last()
            .ok_or_else(|| ScheduleError::internal("checkpoint stack empty mid-reverse"))?;
        let level = storage[snapshots.len() - 1];
        if cp_n == max_n - r - 1 {
            // Last use of this checkpoint: relocate it into the work buffer.
            snapshots.pop();
            n = cp_n;
            actions.push(Action::Move {
                n: cp_n,
                from_storage: level.kind(),
                to_storage: StorageKind::Work,
            });
        } else {
            n = cp_n;
            actions.push(Action::Copy {
                n: cp_n,
                from_storage: level.kind(),
                to_storage: StorageKind::Work,
            });

            // Recompute towards the reverse frontier; the slot just read
            // counts as available again for the step-rule arithmetic.
            let available = total - snapshots.len() + 1;
            let n0 = n;
            let n1 = n0 + n_advance(max_n - r - n0, available, trajectory)?;
            n = n1;
            actions.push(Action::Forward {
                n0,
                n1,
                write_ics: false,
                write_adj_deps: false,
                storage: StorageKind::Work,
            });

            while n < max_n - r - 1 {
                if snapshots.len() >= total {
                    return Err(ScheduleError::internal("snapshot stack overflow"));
                }
                let available = total - snapshots.len();
                let n0 = n;
                let n1 = n0 + n_advance(max_n - r - n0, available, trajectory)?;
                n = n1;
                let level = storage[snapshots.len()];
                snapshots.push(n0);
                actions.push(Action::Forward {
                    n0,
                    n1,
                    write_ics: true,
                    write_adj_deps: false,
                    storage: level.kind(),
                });
            }
            if n != max_n - r - 1 {
                return Err(ScheduleError::internal("recomputation overshot frontier"));
            }
        }

        n += 1;
        actions.push(Action::Forward {
            n0: n - 1,
            n1: n,
            write_ics: false,
            write_adj_deps: true,
            storage: StorageKind::Work,
        });
        r += 1;
        actions.push(Action::Reverse {
            n1: n,
            n0: n - 1,
            clear_adj_deps: true,
        });
    }

    if !snapshots.is_empty() {
        return Err(ScheduleError::internal("checkpoint stack not drained"));
    }
    actions.push(Action::EndReverse);
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(schedule: &mut Multistage) -> Vec<Action> {
        let mut actions = Vec::new();
        while let Some(action) = schedule.next_action().unwrap() {
            actions.push(action);
            if action == Action::EndReverse {
                break;
            }
        }
        actions
    }

    #[test]
    fn test_rejects_zero_steps() {
        assert!(matches!(
            Multistage::new(0, 1, 1),
            Err(ScheduleError::InvalidSteps { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_budget() {
        assert!(matches!(
            Multistage::new(4, 0, 0),
            Err(ScheduleError::InvalidBudget { .. })
        ));
    }

    #[test]
    fn test_single_step_needs_no_budget() {
        let mut schedule = Multistage::new(1, 0, 0).unwrap();
        let actions = drain(&mut schedule);
        assert_eq!(
            actions,
            vec![
                Action::Forward {
                    n0: 0,
                    n1: 1,
                    write_ics: false,
                    write_adj_deps: true,
                    storage: StorageKind::Work,
                },
                Action::EndForward,
                Action::Reverse {
                    n1: 1,
                    n0: 0,
                    clear_adj_deps: true
                },
                Action::EndReverse,
            ]
        );
        assert!(schedule.is_exhausted());
    }

    #[test]
    fn test_ram_only_allocation() {
        let schedule = Multistage::new(8, 3, 0).unwrap();
        assert_eq!(schedule.snaps_in_ram(), 3);
        assert_eq!(schedule.snaps_on_disk(), 0);
        assert!(!schedule.uses_disk_storage());
    }

    #[test]
    fn test_mixed_allocation_prefers_ram_for_busy_slots() {
        // For 4 steps with 1 + 1 slots, the step-0 slot sees the most
        // traffic (one write, one copy, one move) and is placed in memory;
        // the step-2 slot goes to disk.
        let mut schedule = Multistage::new(4, 1, 1).unwrap();
        assert_eq!(schedule.snaps_in_ram(), 1);
        assert_eq!(schedule.snaps_on_disk(), 1);
        let actions = drain(&mut schedule);
        assert_eq!(
            actions[0],
            Action::Forward {
                n0: 0,
                n1: 2,
                write_ics: true,
                write_adj_deps: false,
                storage: StorageKind::Ram,
            }
        );
        assert_eq!(
            actions[1],
            Action::Forward {
                n0: 2,
                n1: 3,
                write_ics: true,
                write_adj_deps: false,
                storage: StorageKind::Disk,
            }
        );
    }

    #[test]
    fn test_excess_budget_is_clamped() {
        let schedule = Multistage::new(4, 10, 10).unwrap();
        assert!(schedule.snaps_in_ram() + schedule.snaps_on_disk() <= 3);
    }

    #[test]
    fn test_exhaustion_after_end_reverse() {
        let mut schedule = Multistage::new(3, 2, 0).unwrap();
        drain(&mut schedule);
        assert!(schedule.is_exhausted());
        assert_eq!(
            schedule.next_action(),
            Err(ScheduleError::IterationAfterExhausted)
        );
    }

    #[test]
    fn test_deterministic_construction() {
        let mut a = Multistage::new(16, 2, 3).unwrap();
        let mut b = Multistage::new(16, 2, 3).unwrap();
        assert_eq!(drain(&mut a), drain(&mut b));
    }

    #[test]
    fn test_trajectory_variants_both_complete() {
        for trajectory in [Trajectory::Maximum, Trajectory::Revolve] {
            let mut schedule = Multistage::with_trajectory(12, 2, 1, trajectory).unwrap();
            let actions = drain(&mut schedule);
            assert_eq!(actions.last(), Some(&Action::EndReverse));
            let reversed: usize = actions
                .iter()
                .map(|a| match a {
                    Action::Reverse { n1, n0, .. } => n1 - n0,
                    _ => 0,
                })
                .sum();
            assert_eq!(reversed, 12);
        }
    }
}
