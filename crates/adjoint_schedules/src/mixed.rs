//! Mixed storage of restart and adjoint-dependency checkpoints.

use adjoint_core::{
    Action, CheckpointSchedule, ScheduleCursor, ScheduleError, ScheduleResult, StorageKind,
    StorageLevel,
};
use std::collections::HashSet;

/// What a DP cell tells the schedule to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    /// Cell not filled; never read in a valid table.
    Unset,
    /// Advance the forward solver without storing anything.
    Forward,
    /// Advance one step and immediately reverse over it.
    ForwardReverse,
    /// Spend a checkpointing unit on the adjoint dependencies of one step.
    WriteAdjDeps,
    /// Spend a checkpointing unit on the restart state of the current step.
    WriteIcs,
}

/// One cell of the mixed DP table.
#[derive(Clone, Copy, Debug)]
struct Cell {
    kind: StepKind,
    advance: usize,
    cost: i64,
}

const UNSET: Cell = Cell {
    kind: StepKind::Unset,
    advance: 0,
    cost: -1,
};

/// Dense DP table over (remaining steps, remaining units).
struct MixedTable {
    units: usize,
    cells: Vec<Cell>,
}

impl MixedTable {
    /// Tabulates the optimal action for every subproblem of `n` steps and
    /// `s` checkpointing units, for the case where no restart checkpoint is
    /// stored at the start of the first step.
    ///
    /// Tie-break: among equal-cost restart splits the largest split wins;
    /// the adjoint-deps step is preferred only on strict improvement.
    fn tabulate(n: usize, s: usize) -> ScheduleResult<Self> {
        let mut table = MixedTable {
            units: s,
            cells: vec![UNSET; (n + 1) * (s + 1)],
        };
        for s_i in 0..=s {
            *table.cell_mut(1, s_i) = Cell {
                kind: StepKind::ForwardReverse,
                advance: 1,
                cost: 1,
            };
        }
        for s_i in 1..=s {
            for n_i in 2..=n {
                if n_i <= s_i + 1 {
                    *table.cell_mut(n_i, s_i) = Cell {
                        kind: StepKind::WriteAdjDeps,
                        advance: 1,
                        cost: n_i as i64,
                    };
                } else if s_i == 1 {
                    *table.cell_mut(n_i, s_i) = Cell {
                        kind: StepKind::WriteIcs,
                        advance: n_i - 1,
                        cost: (n_i * (n_i + 1) / 2 - 1) as i64,
                    };
                } else {
                    for i in 2..n_i {
                        let lhs = table.cell(i, s_i);
                        let rhs = table.cell(n_i - i, s_i - 1);
                        if lhs.cost <= 0 || rhs.cost <= 0 {
                            return Err(ScheduleError::internal("mixed table fill order"));
                        }
                        let cost = i as i64 + lhs.cost + rhs.cost;
                        let current = table.cell(n_i, s_i);
                        if current.cost < 0 || cost <= current.cost {
                            *table.cell_mut(n_i, s_i) = Cell {
                                kind: StepKind::WriteIcs,
                                advance: i,
                                cost,
                            };
                        }
                    }
                    if table.cell(n_i, s_i).cost < 0 {
                        return Err(ScheduleError::internal("mixed table cell unreachable"));
                    }
                    let deps_cost = 1 + table.cell(n_i - 1, s_i - 1).cost;
                    if deps_cost < table.cell(n_i, s_i).cost {
                        *table.cell_mut(n_i, s_i) = Cell {
                            kind: StepKind::WriteAdjDeps,
                            advance: 1,
                            cost: deps_cost,
                        };
                    }
                }
            }
        }
        Ok(table)
    }

    fn cell(&self, n: usize, s: usize) -> Cell {
        self.cells[n * (self.units + 1) + s]
    }

    fn cell_mut(&mut self, n: usize, s: usize) -> &mut Cell {
        &mut self.cells[n * (self.units + 1) + s]
    }
}

/// Returns the optimal total number of forward steps for the mixed
/// schedule of `n` steps with `s` checkpointing units.
///
/// # Errors
///
/// [`ScheduleError::InvalidSteps`] when `n` is zero and
/// [`ScheduleError::InvalidBudget`] when `s` cannot cover `n` steps.
pub fn optimal_steps_mixed(n: usize, s: usize) -> ScheduleResult<usize> {
    if n == 0 {
        return Err(ScheduleError::InvalidSteps { steps: n });
    }
    let s = s.min(n - 1);
    if s < 1.min(n - 1) {
        return Err(ScheduleError::InvalidBudget {
            snapshots: s,
            steps: n,
        });
    }
    let table = MixedTable::tabulate(n, s)?;
    Ok(table.cell(n, s).cost as usize)
}

/// A checkpointing schedule mixing restart data and adjoint-dependency data
/// in a single pool of checkpointing units.
///
/// All units live in one storage level and both kinds of checkpoint are
/// assumed to have the same size, so a unit can hold either. The dynamic
/// program decides, step by step, which kind earns its keep. Offline; one
/// adjoint calculation permitted.
#[derive(Clone, Debug)]
pub struct Mixed {
    cursor: ScheduleCursor,
    actions: Vec<Action>,
    pos: usize,
    storage: StorageLevel,
    exhausted: bool,
}

impl Mixed {
    /// Creates a schedule for `max_n` forward steps with `snapshots`
    /// checkpointing units on disk.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidSteps`] if `max_n` is zero;
    /// [`ScheduleError::InvalidBudget`] if `snapshots` is zero while more
    /// than one step must be covered.
    pub fn new(max_n: usize, snapshots: usize) -> ScheduleResult<Self> {
        Mixed::with_storage(max_n, snapshots, StorageLevel::Disk)
    }

    /// As [`Mixed::new`], selecting the storage level of the units.
    pub fn with_storage(
        max_n: usize,
        snapshots: usize,
        storage: StorageLevel,
    ) -> ScheduleResult<Self> {
        let cursor = ScheduleCursor::bounded(max_n)?;
        if max_n > 1 && snapshots == 0 {
            return Err(ScheduleError::InvalidBudget {
                snapshots,
                steps: max_n,
            });
        }
        let snapshots = snapshots.min(max_n - 1);
        let actions = build_actions(max_n, snapshots, storage)?;
        Ok(Mixed {
            cursor,
            actions,
            pos: 0,
            storage,
            exhausted: false,
        })
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

impl CheckpointSchedule for Mixed {
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
        kind == self.storage.kind() || kind == StorageKind::Work
    }
}

fn build_actions(
    max_n: usize,
    units: usize,
    storage: StorageLevel,
) -> ScheduleResult<Vec<Action>> {
    let table = MixedTable::tabulate(max_n, units)?;
    let mut actions = Vec::new();
    // Steps whose data currently occupies a unit, plus the unit stack in
    // write order.
    let mut unit_steps: HashSet<usize> = HashSet::new();
    let mut stack: Vec<(StepKind, usize, usize)> = Vec::new();
    let mut n = 0;
    let mut r = 0;

    loop {
        let mut step_kind = StepKind::Unset;
        while n < max_n - r {
            let n0 = n;
            let reuse = unit_steps.contains(&n0);
            let free_units = (units + usize::from(reuse))
                .checked_sub(stack.len())
                .ok_or_else(|| ScheduleError::internal("checkpoint units overcommitted"))?;
            if free_units > units {
                return Err(ScheduleError::internal("checkpoint units overcounted"));
            }
            let cell = table.cell(max_n - r - n0, free_units);
            let n1 = n0 + cell.advance;
            step_kind = cell.kind;
            if reuse {
                let top = stack
                    .last()
                    .ok_or_else(|| ScheduleError::internal("unit stack empty on reuse"))?;
                if (top.0, top.1) != (step_kind, n0) || top.2 < n1 {
                    return Err(ScheduleError::internal("reused unit mismatch"));
                }
            }
            match step_kind {
                StepKind::ForwardReverse => {
                    if n1 <= n0 {
                        return Err(ScheduleError::internal("forward step not advancing"));
                    }
                    if n1 > n0 + 1 {
                        n = n1 - 1;
                        actions.push(Action::Forward {
                            n0,
                            n1: n1 - 1,
                            write_ics: false,
                            write_adj_deps: false,
                            storage: StorageKind::Work,
                        });
                    }
                    n += 1;
                    actions.push(Action::Forward {
                        n0: n1 - 1,
                        n1,
                        write_ics: false,
                        write_adj_deps: true,
                        storage: StorageKind::Work,
                    });
                }
                StepKind::Forward => {
                    if n1 <= n0 {
                        return Err(ScheduleError::internal("forward step not advancing"));
                    }
                    n = n1;
                    actions.push(Action::Forward {
                        n0,
                        n1,
                        write_ics: false,
                        write_adj_deps: false,
                        storage: StorageKind::Work,
                    });
                }
                StepKind::WriteAdjDeps => {
                    if n1 != n0 + 1 || reuse || stack.len() + 1 > units {
                        return Err(ScheduleError::internal("adjoint-deps unit misuse"));
                    }
                    n = n1;
                    actions.push(Action::Forward {
                        n0,
                        n1,
                        write_ics: false,
                        write_adj_deps: true,
                        storage: storage.kind(),
                    });
                    unit_steps.insert(n0);
                    stack.push((StepKind::WriteAdjDeps, n0, n1));
                }
                StepKind::WriteIcs => {
                    if n1 <= n0 + 1 {
                        return Err(ScheduleError::internal("restart split too short"));
                    }
                    n = n1;
                    if reuse {
                        actions.push(Action::Forward {
                            n0,
                            n1,
                            write_ics: false,
                            write_adj_deps: false,
                            storage: StorageKind::Work,
                        });
                    } else {
                        if stack.len() + 1 > units {
                            return Err(ScheduleError::internal("restart unit misuse"));
                        }
                        actions.push(Action::Forward {
                            n0,
                            n1,
                            write_ics: true,
                            write_adj_deps: false,
                            storage: storage.kind(),
                        });
                        unit_steps.insert(n0);
                        stack.push((StepKind::WriteIcs, n0, n1));
                    }
                }
                StepKind::Unset => {
                    return Err(ScheduleError::internal("unset mixed table cell"));
                }
            }
        }
        if n != max_n - r {
            return Err(ScheduleError::internal("forward frontier mismatch"));
        }
        if !matches!(step_kind, StepKind::Unset | StepKind::ForwardReverse) {
            return Err(ScheduleError::internal("reverse entered mid-write"));
        }

        if r == 0 {
            actions.push(Action::EndForward);
        }
        r += 1;
        actions.push(Action::Reverse {
            n1: max_n - r + 1,
            n0: max_n - r,
            clear_adj_deps: true,
        });
        if r == max_n {
            break;
        }

        let &(cp_kind, cp_n, _) = stack
            .last()
            .ok_or_else(|| ScheduleError::internal("unit stack empty mid-reverse"))?;
        let free_units = (units + 1)
            .checked_sub(stack.len())
            .ok_or_else(|| ScheduleError::internal("checkpoint units overcommitted"))?;
        let remaining = (max_n - r)
            .checked_sub(cp_n)
            .filter(|&steps| steps >= 1)
            .ok_or_else(|| ScheduleError::internal("unit stored past the frontier"))?;
        let next_kind = table.cell(remaining, free_units).kind;
        let delete = cp_kind != next_kind;
        if delete {
            unit_steps.remove(&cp_n);
            stack.pop();
        }

        match cp_kind {
            StepKind::WriteIcs => {
                if cp_n + 1 >= max_n - r {
                    // A restart checkpoint one step short of the frontier
                    // would have been an adjoint-deps checkpoint instead.
                    return Err(ScheduleError::internal("restart unit at frontier"));
                }
                n = cp_n;
            }
            StepKind::WriteAdjDeps => {
                // The forward cannot restart from dependency data; it must
                // be consumed immediately and exactly once.
                if !delete || cp_n + 1 != max_n - r {
                    return Err(ScheduleError::internal("adjoint-deps unit not consumable"));
                }
                n = cp_n + 1;
            }
            _ => return Err(ScheduleError::internal("unexpected unit kind")),
        }
        let (from_storage, to_storage) = (storage.kind(), StorageKind::Work);
        actions.push(if delete {
            Action::Move {
                n: cp_n,
                from_storage,
                to_storage,
            }
        } else {
            Action::Copy {
                n: cp_n,
                from_storage,
                to_storage,
            }
        });
    }

    if !unit_steps.is_empty() || !stack.is_empty() {
        return Err(ScheduleError::internal("checkpoint units not drained"));
    }
    actions.push(Action::EndReverse);
    Ok(actions)
}
