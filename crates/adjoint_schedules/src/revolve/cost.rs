//! Cost arithmetic and dynamic-programming tables for the revolve family.
//!
//! All costs are 64-bit integers with a reserved infinity sentinel;
//! arithmetic saturates at the sentinel so infeasible subproblems stay
//! infeasible. Tables are dense vectors indexed by `(slots, steps)`; the
//! minimizing split of a cell is recomputed on demand with the same
//! comparator used during construction, so table and backtrack can never
//! disagree.
//!
//! Tie-break rule, everywhere: candidates are scanned in increasing split
//! order and a candidate replaces the incumbent when its cost is less than
//! *or equal to* it, so among equal-cost splits the largest index wins.

use adjoint_core::{ScheduleError, ScheduleResult};

/// Reserved infinity for infeasible table cells.
pub(crate) const INF: i64 = i64::MAX / 4;

/// Saturating cost addition, absorbing at [`INF`].
#[inline]
pub(crate) fn cost_add(a: i64, b: i64) -> i64 {
    a.saturating_add(b).min(INF)
}

/// Saturating cost multiplication, absorbing at [`INF`].
#[inline]
pub(crate) fn cost_mul(a: i64, b: i64) -> i64 {
    a.saturating_mul(b).min(INF)
}

/// Per-operation costs driving the revolve optimizations.
///
/// Memory transfers are free by convention; only disk carries transfer
/// costs. All parameters are non-negative and `forward` is positive.
///
/// The defaults are those of the revolve planner family, the only consumers
/// of this type: unit forward and adjoint steps, disk write and read at
/// twice the forward step cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostModel {
    /// Cost of advancing the forward solver over one step.
    pub forward: i64,
    /// Cost of advancing the adjoint solver over one step.
    pub backward: i64,
    /// Cost of writing one checkpoint to disk.
    pub disk_write: i64,
    /// Cost of reading one checkpoint back from disk.
    pub disk_read: i64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            forward: 1,
            backward: 1,
            disk_write: 2,
            disk_read: 2,
        }
    }
}

impl CostModel {
    /// Checks the parameter ranges.
    ///
    /// # Errors
    ///
    /// [`ScheduleError::InvalidCostModel`] when `forward` is not positive or
    /// any cost is negative.
    pub fn validate(&self) -> ScheduleResult<()> {
        if self.forward < 1 {
            return Err(ScheduleError::InvalidCostModel {
                reason: "forward step cost must be positive",
            });
        }
        if self.backward < 0 || self.disk_write < 0 || self.disk_read < 0 {
            return Err(ScheduleError::InvalidCostModel {
                reason: "costs must be non-negative",
            });
        }
        Ok(())
    }
}

/// Scans `candidates(j)` for `j` in `1..l`, returning the last minimum.
///
/// Returns `(j, cost)`; `l < 2` yields no candidates and is a caller bug.
fn argmin_last(l: usize, mut candidate: impl FnMut(usize) -> i64) -> (usize, i64) {
    debug_assert!(l >= 2);
    let mut best_j = 1;
    let mut best = candidate(1);
    for j in 2..l {
        let value = candidate(j);
        if value <= best {
            best_j = j;
            best = value;
        }
    }
    (best_j, best)
}

/// The single-level table `Opt_0`: minimum cost of adjoining `l` steps with
/// `m` memory slots and no disk.
pub(crate) struct Opt0Table {
    lmax: usize,
    slots: usize,
    cost: Vec<i64>,
    forward: i64,
}

impl Opt0Table {
    /// Fills the table for subproblems up to `lmax` steps and `slots`
    /// memory slots.
    pub(crate) fn build(lmax: usize, slots: usize, costs: &CostModel) -> Self {
        let uf = costs.forward;
        let ub = costs.backward;
        let mut table = Opt0Table {
            lmax,
            slots,
            cost: vec![INF; (slots + 1) * (lmax + 1)],
            forward: uf,
        };
        for m in 0..=slots {
            *table.at_mut(m, 0) = ub;
        }
        if lmax >= 1 {
            for m in 1..=slots {
                *table.at_mut(m, 1) = cost_add(uf, cost_mul(2, ub));
            }
        }
        if slots >= 1 {
            for l in 2..=lmax {
                // One slot: l + 1 adjoint steps and a triangular recompute.
                let triangle = cost_mul(cost_mul(l as i64, l as i64 + 1) / 2, uf);
                *table.at_mut(1, l) = cost_add(cost_mul(l as i64 + 1, ub), triangle);
            }
        }
        for m in 2..=slots {
            for l in 2..=lmax {
                let (_, best) = argmin_last(l, |j| table.split_cost(m, l, j));
                *table.at_mut(m, l) = best;
            }
        }
        table
    }

    #[inline]
    fn index(&self, m: usize, l: usize) -> usize {
        debug_assert!(m <= self.slots && l <= self.lmax);
        m * (self.lmax + 1) + l
    }

    /// Cost of adjoining `l` steps with `m` memory slots.
    #[inline]
    pub(crate) fn get(&self, m: usize, l: usize) -> i64 {
        self.cost[self.index(m, l)]
    }

    fn at_mut(&mut self, m: usize, l: usize) -> &mut i64 {
        let idx = self.index(m, l);
        &mut self.cost[idx]
    }

    #[inline]
    fn split_cost(&self, m: usize, l: usize, j: usize) -> i64 {
        cost_add(
            cost_mul(j as i64, self.forward),
            cost_add(self.get(m - 1, l - j), self.get(m, j - 1)),
        )
    }

    /// The minimizing split for the cell `(m, l)`, `l >= 2`, `m >= 2`.
    pub(crate) fn best_split(&self, m: usize, l: usize) -> usize {
        argmin_last(l, |j| self.split_cost(m, l, j)).0
    }
}

/// The single-disk-slot table `Opt_1`: minimum cost of adjoining `l` steps
/// with `cm` memory slots when the initial state is already on disk.
pub(crate) struct Opt1Table {
    slots: usize,
    one_disk_read: bool,
    cost: Vec<i64>,
    forward: i64,
    disk_read: i64,
}

impl Opt1Table {
    /// Fills the table on top of a matching `Opt_0` table.
    ///
    /// With `one_disk_read` the disk copy is consulted exactly once and the
    /// inner subproblems fall back to `Opt_0`; otherwise re-reads recurse
    /// into this table.
    pub(crate) fn build(
        lmax: usize,
        slots: usize,
        costs: &CostModel,
        one_disk_read: bool,
        opt0: &Opt0Table,
    ) -> Self {
        let uf = costs.forward;
        let ub = costs.backward;
        let rd = costs.disk_read;
        let mut table = Opt1Table {
            slots,
            one_disk_read,
            cost: Vec::with_capacity(lmax + 1),
            forward: uf,
            disk_read: rd,
        };
        table.cost.push(ub);
        if lmax >= 1 {
            let base = cost_add(uf, cost_mul(2, ub));
            table
                .cost
                .push(if slots == 0 { cost_add(base, rd) } else { base });
        }
        for l in 2..=lmax {
            let (_, split) = argmin_last(l, |j| table.split_cost(l, j, opt0));
            table.cost.push(split.min(opt0.get(slots, l)));
        }
        table
    }

    /// Cost of adjoining `l` steps.
    #[inline]
    pub(crate) fn get(&self, l: usize) -> i64 {
        self.cost[l]
    }

    #[inline]
    fn split_cost(&self, l: usize, j: usize, opt0: &Opt0Table) -> i64 {
        let inner = if self.one_disk_read {
            opt0.get(self.slots, j - 1)
        } else {
            self.get(j - 1)
        };
        cost_add(
            cost_mul(j as i64, self.forward),
            cost_add(opt0.get(self.slots, l - j), cost_add(self.disk_read, inner)),
        )
    }

    /// The minimizing split for `l >= 2` steps, or `None` when falling back
    /// to the plain memory schedule is at least as good.
    pub(crate) fn best_split(&self, l: usize, opt0: &Opt0Table) -> Option<usize> {
        let (j, best) = argmin_last(l, |j| self.split_cost(l, j, opt0));
        if best < opt0.get(self.slots, l) {
            Some(j)
        } else {
            None
        }
    }
}

/// The unbounded-disk table `OptV`: minimum cost of adjoining `l` steps
/// with `cm` memory slots and any number of disk checkpoints.
pub(crate) struct OptVTable {
    slots: usize,
    one_disk_read: bool,
    cost: Vec<i64>,
    forward: i64,
    disk_write: i64,
    disk_read: i64,
}

impl OptVTable {
    /// Fills the table on top of matching `Opt_0` and `Opt_1` tables.
    pub(crate) fn build(
        lmax: usize,
        slots: usize,
        costs: &CostModel,
        one_disk_read: bool,
        opt0: &Opt0Table,
        opt1: &Opt1Table,
    ) -> Self {
        let uf = costs.forward;
        let ub = costs.backward;
        let wd = costs.disk_write;
        let rd = costs.disk_read;
        let mut table = OptVTable {
            slots,
            one_disk_read,
            cost: Vec::with_capacity(lmax + 1),
            forward: uf,
            disk_write: wd,
            disk_read: rd,
        };
        table.cost.push(ub);
        if lmax >= 1 {
            let base = cost_add(uf, cost_mul(2, ub));
            table.cost.push(if slots == 0 {
                cost_add(cost_add(wd, base), rd)
            } else {
                base
            });
        }
        for l in 2..=lmax {
            let (_, split) = argmin_last(l, |j| table.split_cost(l, j, opt0, opt1));
            table.cost.push(split.min(opt0.get(slots, l)));
        }
        table
    }

    /// Cost of adjoining `l` steps.
    #[inline]
    pub(crate) fn get(&self, l: usize) -> i64 {
        self.cost[l]
    }

    #[inline]
    fn split_cost(&self, l: usize, j: usize, opt0: &Opt0Table, opt1: &Opt1Table) -> i64 {
        let inner = if self.one_disk_read {
            opt0.get(self.slots, j - 1)
        } else {
            opt1.get(j - 1)
        };
        cost_add(
            cost_add(self.disk_write, cost_mul(j as i64, self.forward)),
            cost_add(self.get(l - j), cost_add(self.disk_read, inner)),
        )
    }

    /// The minimizing disk split for `l >= 2` steps, or `None` when the
    /// plain memory schedule is at least as good.
    pub(crate) fn best_split(
        &self,
        l: usize,
        opt0: &Opt0Table,
        opt1: &Opt1Table,
    ) -> Option<usize> {
        let (j, best) = argmin_last(l, |j| self.split_cost(l, j, opt0, opt1));
        if best < opt0.get(self.slots, l) {
            Some(j)
        } else {
            None
        }
    }
}

/// The hierarchical pair `(optp, opt)` for H-Revolve over two levels.
///
/// `opt[k][l][m]` is the minimum cost of adjoining `l` steps using levels
/// `0..=k`, with `m` slots free at level `k` and all slots free below;
/// `optp` is the same with the initial state already checkpointed at level
/// `k`.
pub(crate) struct HOptTable {
    lmax: usize,
    slots: [usize; 2],
    optp: [Vec<i64>; 2],
    opt: [Vec<i64>; 2],
    forward: i64,
    read_cost: [i64; 2],
}

impl HOptTable {
    /// Fills both tables for `lmax` steps over `slots = [ram, disk]`.
    pub(crate) fn build(lmax: usize, slots: [usize; 2], costs: &CostModel) -> Self {
        let uf = costs.forward;
        let ub = costs.backward;
        let write_cost = [0, costs.disk_write];
        let read_cost = [0, costs.disk_read];
        let mut t = HOptTable {
            lmax,
            slots,
            optp: [
                vec![INF; (lmax + 1) * (slots[0] + 1)],
                vec![INF; (lmax + 1) * (slots[1] + 1)],
            ],
            opt: [
                vec![INF; (lmax + 1) * (slots[0] + 1)],
                vec![INF; (lmax + 1) * (slots[1] + 1)],
            ],
            forward: uf,
            read_cost,
        };

        for k in 0..2 {
            for m in 0..=slots[k] {
                *t.optp_mut(k, 0, m) = ub;
                *t.opt_mut(k, 0, m) = ub;
            }
            if lmax >= 1 {
                for m in 0..=slots[k] {
                    if k == 0 && m == 0 {
                        continue;
                    }
                    let leaf = cost_add(cost_add(uf, cost_mul(2, ub)), read_cost[0]);
                    *t.optp_mut(k, 1, m) = leaf;
                    *t.opt_mut(k, 1, m) = cost_add(write_cost[0], leaf);
                }
            }
        }

        // Level 0 (memory only).
        if slots[0] >= 1 {
            for l in 2..=lmax {
                let triangle = cost_mul(cost_mul(l as i64, l as i64 + 1) / 2, uf);
                let single = cost_add(
                    cost_add(cost_mul(l as i64 + 1, ub), triangle),
                    cost_mul(l as i64, read_cost[0]),
                );
                *t.optp_mut(0, l, 1) = single;
                *t.opt_mut(0, l, 1) = cost_add(write_cost[0], single);
            }
            for m in 2..=slots[0] {
                for l in 2..=lmax {
                    let (_, split) = argmin_last(l, |j| t.split_cost(0, l, m, j));
                    let best = split.min(t.optp(0, l, 1));
                    *t.optp_mut(0, l, m) = best;
                    *t.opt_mut(0, l, m) = cost_add(write_cost[0], best);
                }
            }
        }

        // Level 1 (disk above memory).
        for l in 2..=lmax {
            *t.opt_mut(1, l, 0) = t.opt(0, l, slots[0]);
        }
        for m in 1..=slots[1] {
            for l in 1..=lmax {
                let below = t.opt(0, l, slots[0]);
                let mut best = below;
                if l >= 2 {
                    let (_, split) = argmin_last(l, |j| t.split_cost(1, l, m, j));
                    best = best.min(split);
                }
                *t.optp_mut(1, l, m) = best;
                *t.opt_mut(1, l, m) = below.min(cost_add(write_cost[1], best));
            }
        }
        t
    }

    #[inline]
    fn index(&self, k: usize, l: usize, m: usize) -> usize {
        debug_assert!(l <= self.lmax && m <= self.slots[k]);
        l * (self.slots[k] + 1) + m
    }

    /// `optp[k][l][m]`: cost with the initial state checkpointed at `k`.
    #[inline]
    pub(crate) fn optp(&self, k: usize, l: usize, m: usize) -> i64 {
        self.optp[k][self.index(k, l, m)]
    }

    /// `opt[k][l][m]`: cost of the general problem.
    #[inline]
    pub(crate) fn opt(&self, k: usize, l: usize, m: usize) -> i64 {
        self.opt[k][self.index(k, l, m)]
    }

    fn optp_mut(&mut self, k: usize, l: usize, m: usize) -> &mut i64 {
        let idx = self.index(k, l, m);
        &mut self.optp[k][idx]
    }

    fn opt_mut(&mut self, k: usize, l: usize, m: usize) -> &mut i64 {
        let idx = self.index(k, l, m);
        &mut self.opt[k][idx]
    }

    #[inline]
    fn split_cost(&self, k: usize, l: usize, m: usize, j: usize) -> i64 {
        cost_add(
            cost_mul(j as i64, self.forward),
            cost_add(
                self.opt(k, l - j, m - 1),
                cost_add(self.read_cost[k], self.optp(k, j - 1, m)),
            ),
        )
    }

    /// The minimizing split and its cost at level `k`, for `l >= 2` steps
    /// and `m >= 1` slots.
    pub(crate) fn best_split(&self, k: usize, l: usize, m: usize) -> (usize, i64) {
        argmin_last(l, |j| self.split_cost(k, l, m, j))
    }

    /// The number of slots at level `k`.
    #[inline]
    pub(crate) fn slots(&self, k: usize) -> usize {
        self.slots[k]
    }
}

/// Binomial coefficient `C(x + y, x)`, saturating at [`INF`].
///
/// This is the `beta` function of the periodic-disk analysis: the number of
/// steps coverable with `x` slots and `y` repeated sweeps.
pub(crate) fn beta(x: usize, y: usize) -> i64 {
    let mut acc: u128 = 1;
    for i in 1..=y as u128 {
        acc = acc.saturating_mul(x as u128 + i) / i;
        if acc >= INF as u128 {
            return INF;
        }
    }
    acc.min(INF as u128) as i64
}

/// The largest worthwhile period for single-read periodic disk revolve.
pub(crate) fn period_single_read(slots: usize, costs: &CostModel) -> usize {
    let mut t = 0;
    while cost_mul(beta(slots + 1, t), costs.forward) <= cost_add(costs.disk_write, costs.disk_read)
    {
        t += 1;
    }
    beta(slots, t).min(i64::MAX / 2) as usize
}

/// Upper bound on the period search for re-reading periodic disk revolve.
pub(crate) fn period_search_bound(slots: usize, costs: &CostModel) -> usize {
    let transfer = cost_add(costs.disk_write, costs.disk_read);
    let mut td1 = 0;
    while cost_mul(beta(slots, td1), costs.forward) <= transfer {
        td1 += 1;
    }
    let mut td2 = 0;
    while cost_mul(beta(slots, td2), costs.forward) <= costs.disk_write {
        td2 += 1;
    }
    beta(slots, td1 + 1)
        .max(cost_add(cost_mul(2, beta(slots, td2)), 1))
        .min(i64::MAX / 2) as usize
}

/// The period minimizing the per-step cost `(wd + rd + Opt_1(p - 1)) / p`
/// over `1..=bound`; among equal ratios the largest period wins.
pub(crate) fn best_period(bound: usize, costs: &CostModel, opt1: &Opt1Table) -> usize {
    let numerator =
        |p: usize| cost_add(cost_add(costs.disk_write, costs.disk_read), opt1.get(p - 1)) as i128;
    let mut best = 1;
    let mut best_num = numerator(1);
    for p in 2..=bound {
        let num = numerator(p);
        // num / p <= best_num / best, cross-multiplied.
        if num * best as i128 <= best_num * p as i128 {
            best = p;
            best_num = num;
        }
    }
    best
}
