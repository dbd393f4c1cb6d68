//! Sequence compilers for the revolve planner family.
//!
//! Each planner expands its cost-table decisions into an [`OpSequence`] by
//! the same recurrences used to fill the tables: solve the subproblem above
//! a checkpoint, read the checkpoint back, solve the subproblem below. The
//! compiled sequence is validated before it reaches the adapter.

use super::cost::{
    best_period, period_search_bound, period_single_read, CostModel, HOptTable, Opt0Table,
    Opt1Table, OptVTable,
};
use super::ops::{Op, OpSequence};
use adjoint_core::{ScheduleError, ScheduleResult, StorageLevel};
use tracing::debug;

fn level_of(k: usize) -> StorageLevel {
    if k == 0 {
        StorageLevel::Ram
    } else {
        StorageLevel::Disk
    }
}

/// Compiles the classical single-level revolve sequence for `l` steps and
/// `cm` memory slots.
pub(crate) fn revolve_sequence(l: usize, cm: usize, costs: &CostModel) -> ScheduleResult<OpSequence> {
    costs.validate()?;
    let opt0 = Opt0Table::build(l, cm, costs);
    let seq = revolve_rec(l, cm, &opt0)?;
    debug!(steps = l, slots = cm, ops = seq.len(), "compiled revolve sequence");
    seq.validate(l + 1)?;
    Ok(seq)
}

fn revolve_rec(l: usize, cm: usize, opt0: &Opt0Table) -> ScheduleResult<OpSequence> {
    use StorageLevel::Ram;
    let mut seq = OpSequence::new();
    if l == 0 {
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        seq.push(Op::Discard { level: Ram, n: 0 });
        return Ok(seq);
    }
    if cm == 0 {
        return Err(ScheduleError::internal("revolve recursion without memory"));
    }
    if l == 1 {
        seq.push(Op::Write { level: Ram, n: 0 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::WriteAdjDeps { n: 2 });
        seq.push(Op::Forward { n0: 1, n1: 2 });
        seq.push(Op::Backward { n1: 2, n0: 1 });
        seq.push(Op::DiscardAdjDeps { n: 2 });
        seq.push(Op::Read { level: Ram, n: 0 });
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        seq.push(Op::Discard { level: Ram, n: 0 });
        return Ok(seq);
    }
    if cm == 1 {
        // One slot: hold step 0 and replay an ever-shorter prefix.
        seq.push(Op::Write { level: Ram, n: 0 });
        for index in (0..l).rev() {
            if index != l - 1 {
                seq.push(Op::Read { level: Ram, n: 0 });
            }
            seq.push(Op::Forward {
                n0: 0,
                n1: index + 1,
            });
            seq.push(Op::WriteAdjDeps { n: index + 2 });
            seq.push(Op::Forward {
                n0: index + 1,
                n1: index + 2,
            });
            seq.push(Op::Backward {
                n1: index + 2,
                n0: index + 1,
            });
            seq.push(Op::DiscardAdjDeps { n: index + 2 });
        }
        seq.push(Op::Read { level: Ram, n: 0 });
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        seq.push(Op::Discard { level: Ram, n: 0 });
        return Ok(seq);
    }

    let jmin = opt0.best_split(cm, l);
    seq.push(Op::Write { level: Ram, n: 0 });
    seq.push(Op::Forward { n0: 0, n1: jmin });
    seq.append(revolve_rec(l - jmin, cm - 1, opt0)?.shift(jmin));
    seq.push(Op::Read { level: Ram, n: 0 });
    seq.append(revolve_rec(jmin - 1, cm, opt0)?.drop_leading_memory_write());
    Ok(seq)
}

/// Compiles the one-disk-slot revolve sequence: the initial state is
/// already on disk, and `cm` memory slots assist.
fn revolve_1d_rec(
    l: usize,
    cm: usize,
    one_disk_read: bool,
    opt0: &Opt0Table,
    opt1: &Opt1Table,
) -> ScheduleResult<OpSequence> {
    use StorageLevel::{Disk, Ram};
    let mut seq = OpSequence::new();
    if l == 0 {
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        return Ok(seq);
    }
    if l == 1 {
        if cm == 0 {
            seq.push(Op::Forward { n0: 0, n1: 1 });
            seq.push(Op::WriteAdjDeps { n: 2 });
            seq.push(Op::Forward { n0: 1, n1: 2 });
            seq.push(Op::Backward { n1: 2, n0: 1 });
            seq.push(Op::DiscardAdjDeps { n: 2 });
            seq.push(Op::Read { level: Disk, n: 0 });
            seq.push(Op::WriteAdjDeps { n: 1 });
            seq.push(Op::Forward { n0: 0, n1: 1 });
            seq.push(Op::Backward { n1: 1, n0: 0 });
            seq.push(Op::DiscardAdjDeps { n: 1 });
        } else {
            seq.push(Op::Write { level: Ram, n: 0 });
            seq.push(Op::Forward { n0: 0, n1: 1 });
            seq.push(Op::WriteAdjDeps { n: 2 });
            seq.push(Op::Forward { n0: 1, n1: 2 });
            seq.push(Op::Backward { n1: 2, n0: 1 });
            seq.push(Op::DiscardAdjDeps { n: 2 });
            seq.push(Op::Read { level: Ram, n: 0 });
            seq.push(Op::WriteAdjDeps { n: 1 });
            seq.push(Op::Forward { n0: 0, n1: 1 });
            seq.push(Op::Backward { n1: 1, n0: 0 });
            seq.push(Op::DiscardAdjDeps { n: 1 });
            seq.push(Op::Discard { level: Ram, n: 0 });
        }
        return Ok(seq);
    }

    match opt1.best_split(l, opt0) {
        Some(jmin) => {
            seq.push(Op::Forward { n0: 0, n1: jmin });
            seq.append(revolve_rec(l - jmin, cm, opt0)?.shift(jmin));
            seq.push(Op::Read { level: Disk, n: 0 });
            if one_disk_read {
                seq.append(revolve_rec(jmin - 1, cm, opt0)?);
            } else {
                seq.append(revolve_1d_rec(jmin - 1, cm, one_disk_read, opt0, opt1)?);
            }
            Ok(seq)
        }
        None => revolve_rec(l, cm, opt0),
    }
}

/// Compiles the unbounded-disk revolve sequence for `l` steps and `cm`
/// memory slots.
pub(crate) fn disk_revolve_sequence(
    l: usize,
    cm: usize,
    costs: &CostModel,
    one_disk_read: bool,
) -> ScheduleResult<OpSequence> {
    costs.validate()?;
    let opt0 = Opt0Table::build(l, cm, costs);
    let opt1 = Opt1Table::build(l, cm, costs, one_disk_read, &opt0);
    let optv = OptVTable::build(l, cm, costs, one_disk_read, &opt0, &opt1);
    let seq = disk_revolve_rec(l, cm, one_disk_read, &opt0, &opt1, &optv)?;
    debug!(
        steps = l,
        slots = cm,
        ops = seq.len(),
        "compiled disk revolve sequence"
    );
    seq.validate(l + 1)?;
    Ok(seq)
}

fn disk_revolve_rec(
    l: usize,
    cm: usize,
    one_disk_read: bool,
    opt0: &Opt0Table,
    opt1: &Opt1Table,
    optv: &OptVTable,
) -> ScheduleResult<OpSequence> {
    use StorageLevel::{Disk, Ram};
    let mut seq = OpSequence::new();
    if l == 0 {
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        return Ok(seq);
    }
    if l == 1 {
        let level = if cm == 0 { Disk } else { Ram };
        seq.push(Op::Write { level, n: 0 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::WriteAdjDeps { n: 2 });
        seq.push(Op::Forward { n0: 1, n1: 2 });
        seq.push(Op::Backward { n1: 2, n0: 1 });
        seq.push(Op::DiscardAdjDeps { n: 2 });
        seq.push(Op::Read { level, n: 0 });
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        seq.push(Op::Discard { level, n: 0 });
        return Ok(seq);
    }

    match optv.best_split(l, opt0, opt1) {
        Some(jmin) => {
            seq.push(Op::Write {
                level: Disk,
                n: 0,
            });
            seq.push(Op::Forward { n0: 0, n1: jmin });
            seq.append(disk_revolve_rec(l - jmin, cm, one_disk_read, opt0, opt1, optv)?.shift(jmin));
            seq.push(Op::Read {
                level: Disk,
                n: 0,
            });
            if one_disk_read {
                seq.append(revolve_rec(jmin - 1, cm, opt0)?);
            } else {
                seq.append(revolve_1d_rec(jmin - 1, cm, one_disk_read, opt0, opt1)?);
            }
            Ok(seq)
        }
        None => revolve_rec(l, cm, opt0),
    }
}

/// Compiles the periodic disk revolve sequence for `l` steps and `cm`
/// memory slots.
///
/// The forward sweep drops a disk checkpoint every `p` steps for the
/// period `p` minimizing the per-step cost; the reverse sweep replays one
/// period block at a time.
pub(crate) fn periodic_disk_revolve_sequence(
    l: usize,
    cm: usize,
    costs: &CostModel,
    one_disk_read: bool,
) -> ScheduleResult<OpSequence> {
    costs.validate()?;
    let (period, lmax) = if one_disk_read {
        let p = period_single_read(cm, costs);
        (p, p.max(l))
    } else {
        let bound = period_search_bound(cm, costs);
        (0, bound.max(l)) // period chosen below, once Opt_1 exists
    };
    let opt0 = Opt0Table::build(lmax, cm, costs);
    let opt1 = Opt1Table::build(lmax, cm, costs, one_disk_read, &opt0);
    let period = if one_disk_read {
        period
    } else {
        best_period(period_search_bound(cm, costs), costs, &opt1)
    };
    debug!(steps = l, slots = cm, period, "compiled periodic disk revolve period");

    let mut seq = OpSequence::new();
    let mut current = 0;
    while l - current > period {
        seq.push(Op::Write {
            level: StorageLevel::Disk,
            n: current,
        });
        seq.push(Op::Forward {
            n0: current,
            n1: current + period,
        });
        current += period;
    }

    // Final block: plain revolve when it is no worse, else the one-disk
    // variant anchored on a fresh disk checkpoint.
    if one_disk_read || opt1.get(l - current) == opt0.get(cm, l - current) {
        seq.append(revolve_rec(l - current, cm, &opt0)?.shift(current));
    } else {
        seq.push(Op::Write {
            level: StorageLevel::Disk,
            n: current,
        });
        seq.append(revolve_1d_rec(l - current, cm, one_disk_read, &opt0, &opt1)?.shift(current));
    }

    while current > 0 {
        current -= period;
        seq.push(Op::Read {
            level: StorageLevel::Disk,
            n: current,
        });
        if one_disk_read {
            seq.append(revolve_rec(period - 1, cm, &opt0)?.shift(current));
        } else {
            seq.append(
                revolve_1d_rec(period - 1, cm, one_disk_read, &opt0, &opt1)?.shift(current),
            );
        }
    }
    seq.validate(l + 1)?;
    Ok(seq)
}

/// Compiles the hierarchical H-Revolve sequence for `l` steps over
/// `[ram, disk]` slot budgets.
pub(crate) fn hrevolve_sequence(
    l: usize,
    slots: [usize; 2],
    costs: &CostModel,
) -> ScheduleResult<OpSequence> {
    costs.validate()?;
    let tables = HOptTable::build(l, slots, costs);
    let seq = hrevolve_rec(l, 1, slots[1], &tables, costs)?;
    debug!(
        steps = l,
        ram_slots = slots[0],
        disk_slots = slots[1],
        ops = seq.len(),
        "compiled hierarchical revolve sequence"
    );
    seq.validate(l + 1)?;
    Ok(seq)
}

fn hrevolve_rec(
    l: usize,
    k: usize,
    m: usize,
    tables: &HOptTable,
    costs: &CostModel,
) -> ScheduleResult<OpSequence> {
    use StorageLevel::Ram;
    let mut seq = OpSequence::new();
    if l == 0 {
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        return Ok(seq);
    }
    if k == 0 && m == 0 {
        return Err(ScheduleError::internal("hierarchic recursion without slots"));
    }
    if l == 1 {
        seq.push(Op::Write { level: Ram, n: 0 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::WriteAdjDeps { n: 2 });
        seq.push(Op::Forward { n0: 1, n1: 2 });
        seq.push(Op::Backward { n1: 2, n0: 1 });
        seq.push(Op::DiscardAdjDeps { n: 2 });
        seq.push(Op::Read { level: Ram, n: 0 });
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        seq.push(Op::Discard { level: Ram, n: 0 });
        return Ok(seq);
    }
    if k == 0 {
        seq.push(Op::Write { level: Ram, n: 0 });
        seq.append(hrevolve_aux(l, 0, m, tables, costs)?);
        return Ok(seq);
    }

    let write_here = super::cost::cost_add(costs.disk_write, tables.optp(k, l, m))
        < tables.opt(k - 1, l, tables.slots(k - 1));
    if write_here {
        seq.push(Op::Write {
            level: level_of(k),
            n: 0,
        });
        seq.append(hrevolve_aux(l, k, m, tables, costs)?);
        Ok(seq)
    } else {
        hrevolve_rec(l, k - 1, tables.slots(k - 1), tables, costs)
    }
}

fn hrevolve_aux(
    l: usize,
    k: usize,
    m: usize,
    tables: &HOptTable,
    costs: &CostModel,
) -> ScheduleResult<OpSequence> {
    use StorageLevel::Ram;
    let mut seq = OpSequence::new();
    if m == 0 {
        return Err(ScheduleError::internal("hierarchic expansion without slots"));
    }
    if l == 0 {
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        return Ok(seq);
    }
    if l == 1 {
        // Re-reading from the current level may cost more than staging a
        // memory copy of the restart state.
        let stage_in_memory = costs.disk_read > 0 && k != 0;
        if stage_in_memory {
            seq.push(Op::Write { level: Ram, n: 0 });
        }
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::WriteAdjDeps { n: 2 });
        seq.push(Op::Forward { n0: 1, n1: 2 });
        seq.push(Op::Backward { n1: 2, n0: 1 });
        seq.push(Op::DiscardAdjDeps { n: 2 });
        seq.push(Op::Read {
            level: if stage_in_memory { Ram } else { level_of(k) },
            n: 0,
        });
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        seq.push(Op::Discard { level: Ram, n: 0 });
        return Ok(seq);
    }
    if k == 0 && m == 1 {
        // One memory slot: replay ever-shorter prefixes from step 0.
        for index in (0..l).rev() {
            if index != l - 1 {
                seq.push(Op::Read { level: Ram, n: 0 });
            }
            seq.push(Op::Forward {
                n0: 0,
                n1: index + 1,
            });
            seq.push(Op::WriteAdjDeps { n: index + 2 });
            seq.push(Op::Forward {
                n0: index + 1,
                n1: index + 2,
            });
            seq.push(Op::Backward {
                n1: index + 2,
                n0: index + 1,
            });
            seq.push(Op::DiscardAdjDeps { n: index + 2 });
        }
        seq.push(Op::Read { level: Ram, n: 0 });
        seq.push(Op::WriteAdjDeps { n: 1 });
        seq.push(Op::Forward { n0: 0, n1: 1 });
        seq.push(Op::Backward { n1: 1, n0: 0 });
        seq.push(Op::DiscardAdjDeps { n: 1 });
        seq.push(Op::Discard { level: Ram, n: 0 });
        return Ok(seq);
    }

    let (jmin, split) = tables.best_split(k, l, m);
    if k == 0 {
        if split < tables.optp(0, l, 1) {
            seq.push(Op::Forward { n0: 0, n1: jmin });
            seq.append(hrevolve_rec(l - jmin, 0, m - 1, tables, costs)?.shift(jmin));
            seq.push(Op::Read { level: Ram, n: 0 });
            seq.append(hrevolve_aux(jmin - 1, 0, m, tables, costs)?);
            if !matches!(seq.last(), Some(Op::Discard { .. })) {
                seq.push(Op::Discard { level: Ram, n: 0 });
            }
            Ok(seq)
        } else {
            hrevolve_aux(l, 0, 1, tables, costs)
        }
    } else if split < tables.opt(k - 1, l, tables.slots(k - 1)) {
        seq.push(Op::Forward { n0: 0, n1: jmin });
        seq.append(hrevolve_rec(l - jmin, k, m - 1, tables, costs)?.shift(jmin));
        seq.push(Op::Read {
            level: level_of(k),
            n: 0,
        });
        seq.append(hrevolve_aux(jmin - 1, k, m, tables, costs)?);
        Ok(seq)
    } else {
        hrevolve_rec(l, k - 1, tables.slots(k - 1), tables, costs)
    }
}
