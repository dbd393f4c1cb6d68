//! Golden action sequences.
//!
//! The tie-break rules of the planners are part of the public contract:
//! identical inputs must produce identical action streams across releases
//! and implementations. These tests pin the full streams of small
//! instances of every schedule family.

use adjoint_core::{Action, CheckpointSchedule, StorageKind, UNBOUNDED};
use adjoint_schedules::basic::{NoAdjoint, SingleDiskStorage, SingleMemoryStorage};
use adjoint_schedules::mixed::Mixed;
use adjoint_schedules::multistage::Multistage;
use adjoint_schedules::revolve::{DiskRevolve, HRevolve, PeriodicDiskRevolve, Revolve};
use adjoint_schedules::two_level::TwoLevel;

use StorageKind::{Disk, Ram, Work};

fn forward(n0: usize, n1: usize, ics: bool, deps: bool, storage: StorageKind) -> Action {
    Action::Forward {
        n0,
        n1,
        write_ics: ics,
        write_adj_deps: deps,
        storage,
    }
}

fn reverse(n1: usize, n0: usize) -> Action {
    Action::Reverse {
        n1,
        n0,
        clear_adj_deps: true,
    }
}

fn copy(n: usize, from: StorageKind) -> Action {
    Action::Copy {
        n,
        from_storage: from,
        to_storage: Work,
    }
}

fn mv(n: usize, from: StorageKind) -> Action {
    Action::Move {
        n,
        from_storage: from,
        to_storage: Work,
    }
}

/// Drains a schedule until its terminal `EndReverse` (inclusive).
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

#[test]
fn none_schedule_finalized_at_four() {
    let mut schedule = NoAdjoint::new();
    assert_eq!(
        schedule.next_action().unwrap(),
        Some(forward(0, UNBOUNDED, false, false, StorageKind::None))
    );
    schedule.finalize(4).unwrap();
    assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));
    assert!(schedule.is_exhausted());
}

#[test]
fn single_memory_finalized_at_four() {
    let mut schedule = SingleMemoryStorage::new();
    assert_eq!(
        schedule.next_action().unwrap(),
        Some(forward(0, UNBOUNDED, false, true, Work))
    );
    schedule.finalize(4).unwrap();
    assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));
    assert_eq!(schedule.next_action().unwrap(), Some(reverse(4, 0)));
    assert_eq!(schedule.next_action().unwrap(), Some(Action::EndReverse));
}

#[test]
fn single_disk_move_data_finalized_at_four() {
    let mut schedule = SingleDiskStorage::new().with_move_data(true);
    assert_eq!(
        schedule.next_action().unwrap(),
        Some(forward(0, UNBOUNDED, false, true, Disk))
    );
    schedule.finalize(4).unwrap();
    assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));

    // Each step's dependency data is relocated out of disk immediately
    // before the adjoint consumes it.
    let expected = vec![
        mv(3, Disk),
        reverse(4, 3),
        mv(2, Disk),
        reverse(3, 2),
        mv(1, Disk),
        reverse(2, 1),
        mv(0, Disk),
        reverse(1, 0),
        Action::EndReverse,
    ];
    let mut actions = Vec::new();
    while let Some(action) = schedule.next_action().unwrap() {
        actions.push(action);
        if action == Action::EndReverse {
            break;
        }
    }
    assert_eq!(actions, expected);
    assert!(schedule.is_exhausted());
}

#[test]
fn revolve_four_steps_two_slots() {
    let mut schedule = Revolve::new(4, 2).unwrap();
    let expected = vec![
        forward(0, 2, true, false, Ram),
        forward(2, 3, true, false, Ram),
        forward(3, 4, false, true, Work),
        Action::EndForward,
        reverse(4, 3),
        mv(2, Ram),
        forward(2, 3, false, true, Work),
        reverse(3, 2),
        copy(0, Ram),
        forward(0, 1, false, false, Work),
        forward(1, 2, false, true, Work),
        reverse(2, 1),
        mv(0, Ram),
        forward(0, 1, false, true, Work),
        reverse(1, 0),
        Action::EndReverse,
    ];
    assert_eq!(drain(&mut schedule), expected);
}

#[test]
fn multistage_four_steps_one_ram_one_disk() {
    let mut schedule = Multistage::new(4, 1, 1).unwrap();
    // The step-0 slot carries the most traffic and wins the memory slot;
    // the step-2 slot is relegated to disk.
    let expected = vec![
        forward(0, 2, true, false, Ram),
        forward(2, 3, true, false, Disk),
        forward(3, 4, false, true, Work),
        Action::EndForward,
        reverse(4, 3),
        mv(2, Disk),
        forward(2, 3, false, true, Work),
        reverse(3, 2),
        copy(0, Ram),
        forward(0, 1, false, false, Work),
        forward(1, 2, false, true, Work),
        reverse(2, 1),
        mv(0, Ram),
        forward(0, 1, false, true, Work),
        reverse(1, 0),
        Action::EndReverse,
    ];
    assert_eq!(drain(&mut schedule), expected);
}

#[test]
fn mixed_four_steps_one_unit() {
    let mut schedule = Mixed::new(4, 1).unwrap();
    // The distinguishing feature: after the final restart the single unit
    // is spent on adjoint dependencies instead (Move then a dependency
    // write back into the same unit).
    let expected = vec![
        forward(0, 3, true, false, Disk),
        forward(3, 4, false, true, Work),
        Action::EndForward,
        reverse(4, 3),
        copy(0, Disk),
        forward(0, 2, false, false, Work),
        forward(2, 3, false, true, Work),
        reverse(3, 2),
        mv(0, Disk),
        forward(0, 1, false, true, Disk),
        forward(1, 2, false, true, Work),
        reverse(2, 1),
        mv(0, Disk),
        reverse(1, 0),
        Action::EndReverse,
    ];
    assert_eq!(drain(&mut schedule), expected);
}

#[test]
fn two_level_period_three_finalized_at_six() {
    let mut schedule = TwoLevel::new(3, 1).unwrap();
    assert_eq!(
        schedule.next_action().unwrap(),
        Some(forward(0, 3, true, false, Disk))
    );
    assert_eq!(
        schedule.next_action().unwrap(),
        Some(forward(3, 6, true, false, Disk))
    );
    schedule.finalize(6).unwrap();
    assert_eq!(schedule.next_action().unwrap(), Some(Action::EndForward));

    let expected = vec![
        // Block [3, 6): replay from the disk anchor.
        copy(3, Disk),
        forward(3, 4, false, false, Work),
        forward(4, 5, true, false, Disk),
        forward(5, 6, false, true, Work),
        reverse(6, 5),
        mv(4, Disk),
        forward(4, 5, false, true, Work),
        reverse(5, 4),
        copy(3, Disk),
        forward(3, 4, false, true, Work),
        reverse(4, 3),
        // Block [0, 3).
        copy(0, Disk),
        forward(0, 1, false, false, Work),
        forward(1, 2, true, false, Disk),
        forward(2, 3, false, true, Work),
        reverse(3, 2),
        mv(1, Disk),
        forward(1, 2, false, true, Work),
        reverse(2, 1),
        copy(0, Disk),
        forward(0, 1, false, true, Work),
        reverse(1, 0),
        Action::EndReverse,
    ];
    let mut actions = Vec::new();
    loop {
        let action = schedule.next_action().unwrap().unwrap();
        actions.push(action);
        if action == Action::EndReverse {
            break;
        }
    }
    assert_eq!(actions, expected);
    assert!(!schedule.is_exhausted());
}

#[test]
fn disk_revolve_ten_steps_one_slot_prefix() {
    let mut schedule = DiskRevolve::new(10, 1).unwrap();
    let actions = drain(&mut schedule);
    // The first action anchors step 0 on disk and advances to the split.
    match actions[0] {
        Action::Forward {
            n0: 0,
            write_ics: true,
            storage: Disk,
            ..
        } => {}
        other => panic!("expected a disk anchor, got {other}"),
    }
    assert_eq!(actions.last(), Some(&Action::EndReverse));
}

#[test]
fn periodic_disk_revolve_eleven_steps_one_slot_prefix() {
    let mut schedule = PeriodicDiskRevolve::new(11, 1).unwrap();
    let actions = drain(&mut schedule);
    assert_eq!(actions[0], forward(0, 3, true, false, Disk));
    assert_eq!(actions[1], forward(3, 6, true, false, Disk));
    assert_eq!(actions[2], forward(6, 9, true, false, Disk));
    assert_eq!(actions.last(), Some(&Action::EndReverse));
}

#[test]
fn hrevolve_six_steps_two_ram_one_disk_completes() {
    let mut schedule = HRevolve::new(6, 2, 1).unwrap();
    let actions = drain(&mut schedule);
    assert_eq!(
        actions.iter().filter(|a| **a == Action::EndForward).count(),
        1
    );
    assert_eq!(
        actions.iter().filter(|a| **a == Action::EndReverse).count(),
        1
    );
    let reversed: usize = actions
        .iter()
        .filter(|a| matches!(a, Action::Reverse { .. }))
        .map(Action::len)
        .sum();
    assert_eq!(reversed, 6);
}

#[test]
fn identical_inputs_identical_streams() {
    macro_rules! assert_deterministic {
        ($build:expr) => {{
            let mut a = $build;
            let mut b = $build;
            assert_eq!(drain(&mut a), drain(&mut b));
        }};
    }
    assert_deterministic!(Revolve::new(17, 3).unwrap());
    assert_deterministic!(DiskRevolve::new(17, 2).unwrap());
    assert_deterministic!(PeriodicDiskRevolve::new(17, 2).unwrap());
    assert_deterministic!(HRevolve::new(17, 2, 2).unwrap());
    assert_deterministic!(Multistage::new(17, 2, 2).unwrap());
    assert_deterministic!(Mixed::new(17, 3).unwrap());
}
