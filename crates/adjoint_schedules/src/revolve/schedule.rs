//! Public schedules of the revolve family.
//!
//! [`RevolveAdapter`] folds a compiled low-level operation list into the
//! public action stream, one pass, carrying at most one op of pending
//! state:
//! - a `Write` binds to the next `Forward` as `write_ics` with its level;
//! - a `WriteAdjDeps` binds to the next `Forward` as `write_adj_deps`;
//! - a `Read` becomes a `Copy` into the work buffer, or a `Move` when it is
//!   the checkpoint's final visit (the restart lands one step short of the
//!   reverse frontier);
//! - a `Backward` becomes a `Reverse`; `Discard`s release bookkeeping and
//!   emit nothing.

use super::cost::CostModel;
use super::ops::Op;
use super::planner::{
    disk_revolve_sequence, hrevolve_sequence, periodic_disk_revolve_sequence, revolve_sequence,
};
use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleError, ScheduleResult, StorageKind,
    StorageLevel,
};
use std::collections::{HashSet, VecDeque};

/// Shared iterator state machine over a compiled operation list.
#[derive(Clone, Debug)]
struct RevolveAdapter {
    cursor: ScheduleCursor,
    ops: Vec<Op>,
    pos: usize,
    queued: VecDeque<Action>,
    live: [HashSet<usize>; 2],
    budgets: [usize; 2],
    exhausted: bool,
    end_reverse_queued: bool,
}

impl RevolveAdapter {
    fn new(max_n: usize, ops: Vec<Op>, budgets: [usize; 2]) -> ScheduleResult<Self> {
        Ok(RevolveAdapter {
            cursor: ScheduleCursor::bounded(max_n)?,
            ops,
            pos: 0,
            queued: VecDeque::new(),
            live: [HashSet::new(), HashSet::new()],
            budgets,
            exhausted: false,
            end_reverse_queued: false,
        })
    }

    fn level_index(level: StorageLevel) -> usize {
        match level {
            StorageLevel::Ram => 0,
            StorageLevel::Disk => 1,
        }
    }

    fn store(&mut self, level: StorageLevel, n: usize) -> ScheduleResult<()> {
        let k = Self::level_index(level);
        self.live[k].insert(n);
        if self.live[k].len() > self.budgets[k] {
            return Err(ScheduleError::internal("storage budget exceeded"));
        }
        Ok(())
    }

    /// Processes ops until at least one action is queued.
    fn pump(&mut self) -> ScheduleResult<()> {
        let max_n = self.cursor.require_max_n()?;
        while self.queued.is_empty() && self.pos < self.ops.len() {
            let op = self.ops[self.pos];
            match op {
                Op::Forward { n0, n1 } => {
                    if n0 != self.cursor.n {
                        return Err(ScheduleError::internal("forward away from frontier"));
                    }
                    self.cursor.n = n1;
                    let previous = self.pos.checked_sub(1).map(|i| self.ops[i]);
                    let (write_ics, write_adj_deps, storage) = match previous {
                        Some(Op::Write { level, n }) if n == n0 => {
                            self.store(level, n0)?;
                            (true, false, level.kind())
                        }
                        Some(Op::WriteAdjDeps { n }) if n == n1 => (false, true, StorageKind::Work),
                        _ => (false, false, StorageKind::Work),
                    };
                    self.queued.push_back(Action::Forward {
                        n0,
                        n1,
                        write_ics,
                        write_adj_deps,
                        storage,
                    });
                    if self.cursor.n == max_n {
                        if self.cursor.r != 0 {
                            return Err(ScheduleError::internal("forward finished mid-reverse"));
                        }
                        self.queued.push_back(Action::EndForward);
                    }
                }
                Op::Backward { n1, n0 } => {
                    if n1 != self.cursor.n || n1 != max_n - self.cursor.r {
                        return Err(ScheduleError::internal("reverse away from frontier"));
                    }
                    self.cursor.r += 1;
                    self.queued.push_back(Action::Reverse {
                        n1,
                        n0,
                        clear_adj_deps: true,
                    });
                }
                Op::Read { level, n } => {
                    self.cursor.n = n;
                    let k = Self::level_index(level);
                    let final_visit = (max_n - self.cursor.r).checked_sub(1) == Some(n);
                    if final_visit {
                        // Final visit: the restart feeds directly into the
                        // step about to be reversed.
                        if !self.live[k].remove(&n) {
                            return Err(ScheduleError::internal("moved checkpoint not live"));
                        }
                        self.queued.push_back(Action::Move {
                            n,
                            from_storage: level.kind(),
                            to_storage: StorageKind::Work,
                        });
                    } else {
                        if !self.live[k].contains(&n) {
                            return Err(ScheduleError::internal("copied checkpoint not live"));
                        }
                        self.queued.push_back(Action::Copy {
                            n,
                            from_storage: level.kind(),
                            to_storage: StorageKind::Work,
                        });
                    }
                }
                Op::Write { n, .. } => {
                    if n != self.cursor.n {
                        return Err(ScheduleError::internal("write away from frontier"));
                    }
                }
                Op::WriteAdjDeps { n } => {
                    if n != self.cursor.n + 1 {
                        return Err(ScheduleError::internal(
                            "dependency write away from frontier",
                        ));
                    }
                }
                Op::Discard { level, n } => {
                    self.live[Self::level_index(level)].remove(&n);
                }
                Op::DiscardAdjDeps { n } => {
                    if n != self.cursor.n {
                        return Err(ScheduleError::internal(
                            "dependency discard away from frontier",
                        ));
                    }
                }
            }
            self.pos += 1;
        }

        if self.queued.is_empty() && !self.end_reverse_queued {
            if self.cursor.r != max_n {
                return Err(ScheduleError::internal("operations ended mid-reverse"));
            }
            self.end_reverse_queued = true;
            self.queued.push_back(Action::EndReverse);
        }
        Ok(())
    }

    fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
        if self.exhausted {
            return Err(ScheduleError::IterationAfterExhausted);
        }
        self.pump()?;
        let action = self
            .queued
            .pop_front()
            .ok_or_else(|| ScheduleError::internal("no action available"))?;
        if action == Action::EndReverse {
            self.exhausted = true;
        }
        Ok(Some(action))
    }

    fn uses_storage_kind(&self, kind: StorageKind) -> bool {
        match kind {
            StorageKind::Ram => self.budgets[0] > 0,
            StorageKind::Disk => self.budgets[1] > 0,
            StorageKind::Work => true,
            StorageKind::None => false,
        }
    }
}

macro_rules! delegate_schedule_protocol {
    () => {
        fn next_action(&mut self) -> ScheduleResult<Option<Action>> {
            self.adapter.next_action()
        }

        fn finalize(&mut self, steps: usize) -> ScheduleResult<()> {
            self.adapter.cursor.finalize(steps)
        }

        fn max_n(&self) -> Option<usize> {
            self.adapter.cursor.max_n
        }

        fn forward_frontier(&self) -> usize {
            self.adapter.cursor.n
        }

        fn reverse_steps(&self) -> usize {
            self.adapter.cursor.r
        }

        fn is_exhausted(&self) -> bool {
            self.adapter.exhausted
        }

        fn uses_storage_kind(&self, kind: StorageKind) -> bool {
            self.adapter.uses_storage_kind(kind)
        }
    };
}

fn require_memory_slots(max_n: usize, snaps_in_ram: usize) -> ScheduleResult<()> {
    if max_n > 1 && snaps_in_ram == 0 {
        return Err(ScheduleError::InvalidBudget {
            snapshots: snaps_in_ram,
            steps: max_n,
        });
    }
    Ok(())
}

/// The classical binomial checkpointing schedule over a single storage
/// level.
///
/// Optimal for `max_n` steps with `snaps_in_ram` memory slots when
/// transfers are free. Offline; one adjoint calculation permitted.
///
/// # Examples
///
/// ```
/// use adjoint_core::CheckpointSchedule;
/// use adjoint_schedules::revolve::Revolve;
///
/// let mut schedule = Revolve::new(4, 2).unwrap();
/// let mut actions = Vec::new();
/// while let Some(action) = schedule.next_action().unwrap() {
///     actions.push(action);
///     if schedule.is_exhausted() {
///         break;
///     }
/// }
/// assert_eq!(actions.len(), 16);
/// ```
#[derive(Clone, Debug)]
pub struct Revolve {
    adapter: RevolveAdapter,
}

impl Revolve {
    /// Creates the schedule with default costs.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidSteps`] if `max_n` is zero;
    /// [`ScheduleError::InvalidBudget`] if no memory slot is available
    /// while more than one step must be covered.
    pub fn new(max_n: usize, snaps_in_ram: usize) -> ScheduleResult<Self> {
        Revolve::with_costs(max_n, snaps_in_ram, CostModel::default())
    }

    /// As [`Revolve::new`] with explicit costs.
    pub fn with_costs(
        max_n: usize,
        snaps_in_ram: usize,
        costs: CostModel,
    ) -> ScheduleResult<Self> {
        if max_n < 1 {
            return Err(ScheduleError::InvalidSteps { steps: max_n });
        }
        require_memory_slots(max_n, snaps_in_ram)?;
        let seq = revolve_sequence(max_n - 1, snaps_in_ram, &costs)?;
        Ok(Revolve {
            adapter: RevolveAdapter::new(max_n, seq.into_ops(), [snaps_in_ram, 0])?,
        })
    }
}

impl CheckpointSchedule for Revolve {
    delegate_schedule_protocol!();
}

/// Binomial checkpointing over bounded memory and unbounded disk.
///
/// Early checkpoints spill to disk when the transfer costs pay for the
/// saved recomputation. Offline; one adjoint calculation permitted.
#[derive(Clone, Debug)]
pub struct DiskRevolve {
    adapter: RevolveAdapter,
}

impl DiskRevolve {
    /// Creates the schedule with default costs, reading each disk
    /// checkpoint exactly once.
    ///
    /// # Errors
    ///
    /// As [`Revolve::new`].
    pub fn new(max_n: usize, snaps_in_ram: usize) -> ScheduleResult<Self> {
        DiskRevolve::with_options(max_n, snaps_in_ram, CostModel::default(), false)
    }

    /// As [`DiskRevolve::new`] with explicit costs; `reread_disk` lets the
    /// planner revisit a disk checkpoint instead of restaging through
    /// memory.
    pub fn with_options(
        max_n: usize,
        snaps_in_ram: usize,
        costs: CostModel,
        reread_disk: bool,
    ) -> ScheduleResult<Self> {
        if max_n < 1 {
            return Err(ScheduleError::InvalidSteps { steps: max_n });
        }
        require_memory_slots(max_n, snaps_in_ram)?;
        let seq = disk_revolve_sequence(max_n - 1, snaps_in_ram, &costs, !reread_disk)?;
        Ok(DiskRevolve {
            adapter: RevolveAdapter::new(max_n, seq.into_ops(), [snaps_in_ram, max_n])?,
        })
    }
}

impl CheckpointSchedule for DiskRevolve {
    delegate_schedule_protocol!();
}

/// Binomial checkpointing with disk checkpoints on a fixed optimal period.
///
/// The period depends only on the slot budget and the cost model, so long
/// forward calculations write disk at a steady cadence. Offline; one
/// adjoint calculation permitted.
#[derive(Clone, Debug)]
pub struct PeriodicDiskRevolve {
    adapter: RevolveAdapter,
}

impl PeriodicDiskRevolve {
    /// Creates the schedule with default costs, reading each disk
    /// checkpoint exactly once.
    ///
    /// # Errors
    ///
    /// As [`Revolve::new`].
    pub fn new(max_n: usize, snaps_in_ram: usize) -> ScheduleResult<Self> {
        PeriodicDiskRevolve::with_options(max_n, snaps_in_ram, CostModel::default(), false)
    }

    /// As [`PeriodicDiskRevolve::new`] with explicit costs and disk re-read
    /// mode.
    pub fn with_options(
        max_n: usize,
        snaps_in_ram: usize,
        costs: CostModel,
        reread_disk: bool,
    ) -> ScheduleResult<Self> {
        if max_n < 1 {
            return Err(ScheduleError::InvalidSteps { steps: max_n });
        }
        require_memory_slots(max_n, snaps_in_ram)?;
        let seq = periodic_disk_revolve_sequence(max_n - 1, snaps_in_ram, &costs, !reread_disk)?;
        Ok(PeriodicDiskRevolve {
            adapter: RevolveAdapter::new(max_n, seq.into_ops(), [snaps_in_ram, max_n])?,
        })
    }
}

impl CheckpointSchedule for PeriodicDiskRevolve {
    delegate_schedule_protocol!();
}

/// Hierarchical checkpointing over bounded memory and bounded disk.
///
/// The dynamic program weighs, for every subproblem, whether the next
/// checkpoint belongs in memory, on disk, or nowhere. Offline; one adjoint
/// calculation permitted.
#[derive(Clone, Debug)]
pub struct HRevolve {
    adapter: RevolveAdapter,
}

impl HRevolve {
    /// Creates the schedule with default costs.
    ///
    /// # Errors
    ///
    /// As [`Revolve::new`]; the memory budget requirement applies to
    /// `snaps_in_ram` alone since the hierarchy stages restarts through
    /// memory.
    pub fn new(max_n: usize, snaps_in_ram: usize, snaps_on_disk: usize) -> ScheduleResult<Self> {
        HRevolve::with_costs(max_n, snaps_in_ram, snaps_on_disk, CostModel::default())
    }

    /// As [`HRevolve::new`] with explicit costs.
    pub fn with_costs(
        max_n: usize,
        snaps_in_ram: usize,
        snaps_on_disk: usize,
        costs: CostModel,
    ) -> ScheduleResult<Self> {
        if max_n < 1 {
            return Err(ScheduleError::InvalidSteps { steps: max_n });
        }
        require_memory_slots(max_n, snaps_in_ram)?;
        let seq = hrevolve_sequence(max_n - 1, [snaps_in_ram, snaps_on_disk], &costs)?;
        Ok(HRevolve {
            adapter: RevolveAdapter::new(max_n, seq.into_ops(), [snaps_in_ram, snaps_on_disk])?,
        })
    }
}

impl CheckpointSchedule for HRevolve {
    delegate_schedule_protocol!();
}
