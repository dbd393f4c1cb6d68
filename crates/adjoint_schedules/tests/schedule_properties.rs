//! Property harness over every schedule family.
//!
//! Each emitted stream is replayed through a small model of the driver:
//! a work-buffer position, per-storage checkpoint sets, and the set of
//! steps with live adjoint-dependency data. The replay asserts the
//! protocol invariants (completeness, dependency coverage, storage
//! budgets, restart correctness, monotone reverse progress, and
//! move-consumes-source) at every action boundary.

use adjoint_core::{Action, CheckpointSchedule, StorageKind, UNBOUNDED};
use adjoint_schedules::basic::{SingleDiskStorage, SingleMemoryStorage};
use adjoint_schedules::mixed::Mixed;
use adjoint_schedules::multistage::Multistage;
use adjoint_schedules::revolve::{DiskRevolve, HRevolve, PeriodicDiskRevolve, Revolve};
use adjoint_schedules::two_level::TwoLevel;
use std::collections::{BTreeMap, BTreeSet};

/// Optional storage capacity bounds to assert during replay.
#[derive(Clone, Copy, Debug, Default)]
struct Budgets {
    ram: Option<usize>,
    disk: Option<usize>,
    /// Bound on checkpoints of either kind in one storage level (the
    /// mixed schedule's shared pool).
    combined: Option<(StorageKind, usize)>,
}

/// Replays `actions` against a driver model and asserts the invariants.
fn check_stream(actions: &[Action], max_n: usize, budgets: Budgets) {
    // Restart checkpoints persisted per storage kind.
    let mut stored: BTreeMap<StorageKind, BTreeSet<usize>> = BTreeMap::new();
    // Steps whose adjoint-dependency data is live (any storage).
    let mut adj_deps: BTreeSet<usize> = BTreeSet::new();
    // Steps whose persisted data is the dependency kind, per storage.
    let mut stored_deps: BTreeMap<StorageKind, BTreeSet<usize>> = BTreeMap::new();
    // The step the driver's work buffer is positioned at.
    let mut position: usize = 0;
    let mut end_forward_seen = false;
    let mut end_reverse_count = 0;
    let mut reverse_frontier = max_n;
    let mut last_reverse_n1: Option<usize> = None;

    for (index, action) in actions.iter().enumerate() {
        match *action {
            Action::Forward {
                n0,
                n1,
                write_ics,
                write_adj_deps,
                storage,
            } => {
                assert!(n0 < n1, "empty forward at action {index}");
                // Online schedules may overshoot: the driver stops at the
                // end of the calculation, UNBOUNDED or not.
                let n1 = if n1 > max_n && !end_forward_seen {
                    assert!(n1 == UNBOUNDED || n0 < max_n, "overshoot from past the end");
                    max_n
                } else {
                    n1
                };
                assert!(n1 <= max_n, "forward past the end at action {index}");
                // P5: every forward continues from the seeded work buffer.
                assert_eq!(n0, position, "forward away from restart at {index}");
                position = n1;
                if write_ics {
                    assert!(
                        matches!(storage, StorageKind::Ram | StorageKind::Disk),
                        "restart data needs persistent storage at {index}"
                    );
                    stored.entry(storage).or_default().insert(n0);
                }
                if write_adj_deps {
                    adj_deps.extend(n0..n1);
                    if matches!(storage, StorageKind::Ram | StorageKind::Disk) {
                        stored_deps.entry(storage).or_default().extend(n0..n1);
                    }
                }
                check_budgets(&stored, &stored_deps, budgets, index);
            }
            Action::Reverse {
                n1,
                n0,
                clear_adj_deps,
            } => {
                assert!(end_forward_seen, "reverse before EndForward at {index}");
                assert!(n0 < n1, "empty reverse at action {index}");
                // P6: strictly decreasing reverse starts.
                if let Some(last) = last_reverse_n1 {
                    assert!(n1 < last, "reverse frontier not decreasing at {index}");
                }
                last_reverse_n1 = Some(n1);
                assert_eq!(n1, reverse_frontier, "reverse skipped steps at {index}");
                reverse_frontier = n0;
                // P2 / I5: dependency data live for every consumed step.
                for step in n0..n1 {
                    assert!(
                        adj_deps.contains(&step),
                        "reverse of step {step} without dependency data at {index}"
                    );
                }
                if clear_adj_deps {
                    for step in n0..n1 {
                        adj_deps.remove(&step);
                        for deps in stored_deps.values_mut() {
                            deps.remove(&step);
                        }
                    }
                }
            }
            Action::Copy {
                n,
                from_storage,
                to_storage,
            } => {
                let held = stored
                    .get(&from_storage)
                    .map(|set| set.contains(&n))
                    .unwrap_or(false)
                    || stored_deps
                        .get(&from_storage)
                        .map(|set| set.contains(&n))
                        .unwrap_or(false);
                // P7: the source must actually hold the data.
                assert!(held, "copy of absent data ({n}) at {index}");
                if to_storage == StorageKind::Work {
                    position = n;
                }
            }
            Action::Move {
                n,
                from_storage,
                to_storage,
            } => {
                let restart_moved = stored
                    .get_mut(&from_storage)
                    .map(|set| set.remove(&n))
                    .unwrap_or(false);
                let deps_moved = stored_deps
                    .get_mut(&from_storage)
                    .map(|set| set.remove(&n))
                    .unwrap_or(false);
                assert!(
                    restart_moved || deps_moved,
                    "move of absent data ({n}) at {index}"
                );
                if to_storage == StorageKind::Work {
                    if restart_moved {
                        position = n;
                    } else {
                        // Relocated dependency data feeds the next reverse.
                        position = n + 1;
                    }
                }
            }
            Action::EndForward => {
                // P1 / I3: exactly once, at the forward end.
                assert!(!end_forward_seen, "duplicate EndForward at {index}");
                assert_eq!(position, max_n, "EndForward before the end at {index}");
                end_forward_seen = true;
            }
            Action::EndReverse => {
                // P1 / I4: the adjoint is back at step 0.
                assert_eq!(reverse_frontier, 0, "EndReverse mid-sweep at {index}");
                end_reverse_count += 1;
                reverse_frontier = max_n;
                last_reverse_n1 = None;
            }
        }
    }

    assert!(end_forward_seen, "stream without EndForward");
    assert_eq!(end_reverse_count, 1, "stream without terminal EndReverse");
    assert_eq!(reverse_frontier, max_n, "adjoint did not finish");
}

fn check_budgets(
    stored: &BTreeMap<StorageKind, BTreeSet<usize>>,
    stored_deps: &BTreeMap<StorageKind, BTreeSet<usize>>,
    budgets: Budgets,
    index: usize,
) {
    let count = |kind: StorageKind| {
        stored.get(&kind).map_or(0, BTreeSet::len) + stored_deps.get(&kind).map_or(0, BTreeSet::len)
    };
    if let Some(ram) = budgets.ram {
        assert!(
            count(StorageKind::Ram) <= ram,
            "memory budget exceeded at action {index}"
        );
    }
    if let Some(disk) = budgets.disk {
        assert!(
            count(StorageKind::Disk) <= disk,
            "disk budget exceeded at action {index}"
        );
    }
    if let Some((kind, bound)) = budgets.combined {
        assert!(
            count(kind) <= bound,
            "shared budget exceeded at action {index}"
        );
    }
}

/// Drains an offline schedule to its terminal `EndReverse`.
fn drain(schedule: &mut impl CheckpointSchedule) -> Vec<Action> {
    let mut actions = Vec::new();
    while let Some(action) = schedule.next_action().unwrap() {
        actions.push(action);
        if action == Action::EndReverse {
            break;
        }
    }
    actions
}

/// Drives an online schedule: forward until the frontier covers `max_n`,
/// finalize, then drain one full reverse sweep.
fn drive_online(schedule: &mut impl CheckpointSchedule, max_n: usize) -> Vec<Action> {
    let mut actions = Vec::new();
    loop {
        match schedule.next_action().unwrap() {
            Some(action) => {
                actions.push(action);
                if schedule.forward_frontier() >= max_n {
                    break;
                }
            }
            None => break,
        }
    }
    schedule.finalize(max_n).unwrap();
    loop {
        match schedule.next_action().unwrap() {
            Some(action) => {
                let done = action == Action::EndReverse;
                actions.push(action);
                if done {
                    break;
                }
            }
            None => break,
        }
    }
    actions
}

#[test]
fn revolve_invariants_across_sizes() {
    for max_n in 1..=24 {
        for slots in 1..=5 {
            let mut schedule = Revolve::new(max_n, slots).unwrap();
            let actions = drain(&mut schedule);
            check_stream(
                &actions,
                max_n,
                Budgets {
                    ram: Some(slots),
                    disk: Some(0),
                    combined: None,
                },
            );
        }
    }
}

#[test]
fn disk_revolve_invariants_across_sizes() {
    for max_n in 1..=20 {
        for slots in 1..=3 {
            for reread in [false, true] {
                let mut schedule = DiskRevolve::with_options(
                    max_n,
                    slots,
                    adjoint_schedules::revolve::CostModel::default(),
                    reread,
                )
                .unwrap();
                let actions = drain(&mut schedule);
                check_stream(
                    &actions,
                    max_n,
                    Budgets {
                        ram: Some(slots),
                        disk: None,
                        combined: None,
                    },
                );
            }
        }
    }
}

#[test]
fn periodic_disk_revolve_invariants_across_sizes() {
    for max_n in 1..=20 {
        for slots in 1..=3 {
            for reread in [false, true] {
                let mut schedule = PeriodicDiskRevolve::with_options(
                    max_n,
                    slots,
                    adjoint_schedules::revolve::CostModel::default(),
                    reread,
                )
                .unwrap();
                let actions = drain(&mut schedule);
                check_stream(
                    &actions,
                    max_n,
                    Budgets {
                        ram: Some(slots),
                        disk: None,
                        combined: None,
                    },
                );
            }
        }
    }
}

#[test]
fn hrevolve_invariants_across_sizes() {
    for max_n in 1..=18 {
        for ram in 1..=3 {
            for disk in 0..=2 {
                let mut schedule = HRevolve::new(max_n, ram, disk).unwrap();
                let actions = drain(&mut schedule);
                check_stream(
                    &actions,
                    max_n,
                    Budgets {
                        ram: Some(ram),
                        disk: Some(disk),
                        combined: None,
                    },
                );
            }
        }
    }
}

#[test]
fn multistage_invariants_across_sizes() {
    for max_n in 1..=20 {
        for ram in 0..=3 {
            for disk in 0..=3 {
                if max_n > 1 && ram + disk == 0 {
                    continue;
                }
                let mut schedule = Multistage::new(max_n, ram, disk).unwrap();
                let actions = drain(&mut schedule);
                check_stream(
                    &actions,
                    max_n,
                    Budgets {
                        ram: Some(schedule.snaps_in_ram()),
                        disk: Some(schedule.snaps_on_disk()),
                        combined: None,
                    },
                );
            }
        }
    }
}

#[test]
fn mixed_invariants_across_sizes() {
    for max_n in 1..=20 {
        for units in 1..=4 {
            let mut schedule = Mixed::new(max_n, units).unwrap();
            let actions = drain(&mut schedule);
            check_stream(
                &actions,
                max_n,
                Budgets {
                    ram: Some(0),
                    disk: None,
                    combined: Some((StorageKind::Disk, units.min(max_n - 1).max(1))),
                },
            );
        }
    }
}

#[test]
fn single_memory_invariants() {
    for max_n in [1, 4, 9] {
        let mut schedule = SingleMemoryStorage::new();
        let actions = drive_online(&mut schedule, max_n);
        check_stream(&actions, max_n, Budgets::default());
    }
}

#[test]
fn single_disk_invariants() {
    for move_data in [false, true] {
        let mut schedule = SingleDiskStorage::new().with_move_data(move_data);
        let actions = drive_online(&mut schedule, 5);
        check_stream(&actions, 5, Budgets::default());
    }
}

#[test]
fn two_level_invariants() {
    for period in [1, 3, 4, 7] {
        for snapshots in 0..=2 {
            for max_n in [1, 5, 12] {
                let mut schedule = TwoLevel::new(period, snapshots).unwrap();
                let actions = drive_online(&mut schedule, max_n);
                check_stream(&actions, max_n, Budgets::default());
            }
        }
    }
}

#[test]
fn online_finalize_conflicts() {
    let mut schedule = SingleMemoryStorage::new();
    // Finalizing before the forward began is rejected.
    assert!(schedule.finalize(4).is_err());
    schedule.next_action().unwrap();
    schedule.finalize(4).unwrap();
    // Idempotent with the same count, conflicting with another.
    schedule.finalize(4).unwrap();
    assert!(schedule.finalize(6).is_err());
}
