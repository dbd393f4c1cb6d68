//! Low-level operation sequences produced by the revolve planners.
//!
//! A planner compiles its table decisions into a flat list of [`Op`]
//! values; the adapter in `schedule.rs` later folds that list into the
//! public action stream. Sequences compose by concatenation and by
//! [`OpSequence::shift`], which reindexes a subproblem solved at step 0
//! onto its true base step.

use adjoint_core::{ScheduleError, ScheduleResult, StorageLevel};
use std::collections::HashSet;

/// One low-level operation.
///
/// `Write`/`Read`/`Discard` manipulate restart checkpoints on a storage
/// level; `WriteAdjDeps`/`DiscardAdjDeps` manage the adjoint-dependency
/// data of a single step, which always lives in the working buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    /// Advance the forward solver from step `n0` to step `n1`.
    Forward {
        /// First step of the advance.
        n0: usize,
        /// One past the last step.
        n1: usize,
    },
    /// Advance the adjoint from step `n1` back to step `n0`.
    Backward {
        /// Step the adjoint starts from.
        n1: usize,
        /// Step the adjoint retreats to.
        n0: usize,
    },
    /// Store the restart state of step `n` at `level`.
    Write {
        /// Destination level.
        level: StorageLevel,
        /// Step whose state is stored.
        n: usize,
    },
    /// Load the restart state of step `n` from `level`.
    Read {
        /// Source level.
        level: StorageLevel,
        /// Step whose state is loaded.
        n: usize,
    },
    /// Drop the restart state of step `n` from `level`.
    Discard {
        /// Level holding the state.
        level: StorageLevel,
        /// Step whose state is dropped.
        n: usize,
    },
    /// Store the adjoint-dependency data produced for step `n`.
    WriteAdjDeps {
        /// Step whose dependency data is stored.
        n: usize,
    },
    /// Drop the adjoint-dependency data of step `n`.
    DiscardAdjDeps {
        /// Step whose dependency data is dropped.
        n: usize,
    },
}

impl Op {
    fn shifted(self, base: usize) -> Op {
        match self {
            Op::Forward { n0, n1 } => Op::Forward {
                n0: n0 + base,
                n1: n1 + base,
            },
            Op::Backward { n1, n0 } => Op::Backward {
                n1: n1 + base,
                n0: n0 + base,
            },
            Op::Write { level, n } => Op::Write { level, n: n + base },
            Op::Read { level, n } => Op::Read { level, n: n + base },
            Op::Discard { level, n } => Op::Discard { level, n: n + base },
            Op::WriteAdjDeps { n } => Op::WriteAdjDeps { n: n + base },
            Op::DiscardAdjDeps { n } => Op::DiscardAdjDeps { n: n + base },
        }
    }
}

/// A growable list of low-level operations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct OpSequence {
    ops: Vec<Op>,
}

impl OpSequence {
    pub(crate) fn new() -> Self {
        OpSequence::default()
    }

    pub(crate) fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    /// Appends `other`, consuming it.
    pub(crate) fn append(&mut self, mut other: OpSequence) {
        self.ops.append(&mut other.ops);
    }

    /// Adds `base` to every step index.
    pub(crate) fn shift(mut self, base: usize) -> OpSequence {
        if base > 0 {
            for op in &mut self.ops {
                *op = op.shifted(base);
            }
        }
        self
    }

    /// Removes a leading memory `Write`.
    ///
    /// Used when a subsequence restarts from a checkpoint its caller
    /// already holds, so re-storing it would waste a slot.
    pub(crate) fn drop_leading_memory_write(mut self) -> OpSequence {
        if let Some(Op::Write {
            level: StorageLevel::Ram,
            ..
        }) = self.ops.first()
        {
            self.ops.remove(0);
        }
        self
    }

    pub(crate) fn last(&self) -> Option<&Op> {
        self.ops.last()
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    /// Checks the storage discipline of the finished sequence.
    ///
    /// Every `Read` must see a live preceding `Write` of the same
    /// checkpoint, adjoint-dependency data must be written before the
    /// `Backward` consuming it, and forward advances must be contiguous
    /// with the restarts implied by `Read`s. `Discard` of an absent
    /// checkpoint is tolerated: planners emit unconditional trailing
    /// discards for states their caller may or may not have stored.
    pub(crate) fn validate(&self, max_n: usize) -> ScheduleResult<()> {
        let mut live: HashSet<(StorageLevel, usize)> = HashSet::new();
        let mut adj_deps: HashSet<usize> = HashSet::new();
        let mut position = 0_usize;

        for op in &self.ops {
            match *op {
                Op::Forward { n0, n1 } => {
                    if n0 != position || n1 <= n0 || n1 > max_n {
                        return Err(ScheduleError::internal("forward advance discontinuous"));
                    }
                    position = n1;
                }
                Op::Backward { n1, n0 } => {
                    if n0 + 1 != n1 || n1 != position {
                        return Err(ScheduleError::internal("backward step misplaced"));
                    }
                    if !adj_deps.contains(&n1) {
                        return Err(ScheduleError::internal("backward without dependency data"));
                    }
                    position = n0;
                }
                Op::Write { level, n } => {
                    if n != position {
                        return Err(ScheduleError::internal("write away from frontier"));
                    }
                    live.insert((level, n));
                }
                Op::Read { level, n } => {
                    if !live.contains(&(level, n)) {
                        return Err(ScheduleError::internal("read of absent checkpoint"));
                    }
                    position = n;
                }
                Op::Discard { level, n } => {
                    live.remove(&(level, n));
                }
                Op::WriteAdjDeps { n } => {
                    if n != position + 1 {
                        return Err(ScheduleError::internal(
                            "dependency data written off frontier",
                        ));
                    }
                    adj_deps.insert(n);
                }
                Op::DiscardAdjDeps { n } => {
                    if !adj_deps.remove(&n) {
                        return Err(ScheduleError::internal("dependency data double free"));
                    }
                }
            }
        }
        if position != 0 {
            return Err(ScheduleError::internal("sequence does not return to step 0"));
        }
        Ok(())
    }
}
