//! Schedule actions and storage vocabulary.
//!
//! A schedule is consumed as a stream of [`Action`] values. Each action is a
//! command to the host driver: advance the forward solver, advance the
//! adjoint, or duplicate/relocate checkpoint data between storage kinds.
//! The driver owns the storage back ends; the schedule only names them.

use std::fmt;

/// Sentinel upper bound for a forward sweep whose length is not yet known.
///
/// Online schedules emit their initial `Forward` action with
/// `n1 == UNBOUNDED`, meaning "advance as far as the forward calculation
/// goes". The driver later fixes the true step count through
/// [`finalize`](crate::CheckpointSchedule::finalize).
pub const UNBOUNDED: usize = usize::MAX;

/// Storage kinds addressable by schedule actions.
///
/// The data held in `Ram` or on `Disk` is never consumed directly by the
/// forward or adjoint solvers; a [`Action::Copy`] or [`Action::Move`] into
/// `Work` precedes any use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StorageKind {
    /// Fast, capacity-limited checkpoint storage.
    Ram,

    /// Slow, capacity-limited checkpoint storage with costlier transfers.
    Disk,

    /// The ephemeral buffer holding the data for the step currently being
    /// processed. Used as the sink of restart seeds and as the home of
    /// adjoint-dependency data consumed by the next `Reverse`.
    Work,

    /// No storage. Used by schedules that persist nothing.
    None,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Ram => write!(f, "RAM"),
            StorageKind::Disk => write!(f, "DISK"),
            StorageKind::Work => write!(f, "WORK"),
            StorageKind::None => write!(f, "NONE"),
        }
    }
}

/// The persisted subset of [`StorageKind`]: where a checkpoint may live
/// between the moment it is written and the moment it is read back.
///
/// Schedule options that select a checkpoint destination take a
/// `StorageLevel` so that `Work`/`None` are unrepresentable there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StorageLevel {
    /// Checkpoints held in memory.
    Ram,

    /// Checkpoints held on disk.
    Disk,
}

impl StorageLevel {
    /// Widens the level into the full storage vocabulary.
    #[inline]
    pub fn kind(self) -> StorageKind {
        match self {
            StorageLevel::Ram => StorageKind::Ram,
            StorageLevel::Disk => StorageKind::Disk,
        }
    }
}

impl From<StorageLevel> for StorageKind {
    fn from(level: StorageLevel) -> Self {
        level.kind()
    }
}

impl fmt::Display for StorageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

/// One step of a checkpointing schedule.
///
/// The variants form the complete contract between a schedule and the
/// driver. Ordering rules:
/// - `EndForward` is emitted exactly once, after the forward frontier
///   reaches the (finalized) step count.
/// - Every `Reverse` is preceded by a `Forward` with
///   `write_adj_deps == true` covering the reversed steps, not since
///   cleared.
/// - A `Copy`/`Move` into [`StorageKind::Work`] seeds the restart state for
///   the next `Forward` beginning at the same step.
///
/// # Examples
///
/// `Forward { n0: 10, n1: 25, write_ics: true, write_adj_deps: false,
/// storage: StorageKind::Ram }` reads as: advance the forward solver from
/// the start of step 10 to the start of step 25, and persist the restart
/// state of step 10 in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    /// Advance the forward solver from the start of step `n0` to the start
    /// of step `n1`.
    Forward {
        /// First step of the advance.
        n0: usize,
        /// One past the last step of the advance (`n1 > n0`). May be
        /// [`UNBOUNDED`] on online schedules before finalization.
        n1: usize,
        /// Persist the restart state of step `n0` into `storage`.
        write_ics: bool,
        /// Persist the adjoint-dependency data produced for each step in
        /// `[n0, n1)` into `storage`.
        write_adj_deps: bool,
        /// Destination for whichever of the two datasets is requested. When
        /// both flags are set, both datasets share this destination.
        storage: StorageKind,
    },

    /// Advance the adjoint solver from step `n1` back to step `n0`.
    Reverse {
        /// Step the adjoint starts from (`n1 > n0`).
        n1: usize,
        /// Step the adjoint retreats to.
        n0: usize,
        /// Release the adjoint-dependency data consumed by this retreat.
        clear_adj_deps: bool,
    },

    /// Duplicate the data of step `n`; the source keeps its copy.
    Copy {
        /// Step whose data is copied.
        n: usize,
        /// Storage currently holding the data.
        from_storage: StorageKind,
        /// Destination storage.
        to_storage: StorageKind,
    },

    /// Relocate the data of step `n`; the source no longer holds it.
    Move {
        /// Step whose data is moved.
        n: usize,
        /// Storage currently holding the data.
        from_storage: StorageKind,
        /// Destination storage.
        to_storage: StorageKind,
    },

    /// The forward calculation is complete.
    EndForward,

    /// The adjoint calculation has returned to step 0.
    EndReverse,
}

impl Action {
    /// For a `Forward` or `Reverse` action, the number of steps covered.
    /// Zero for the other variants.
    pub fn len(&self) -> usize {
        match *self {
            Action::Forward { n0, n1, .. } => n1 - n0,
            Action::Reverse { n1, n0, .. } => n1 - n0,
            _ => 0,
        }
    }

    /// Whether the action covers no steps.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `step` lies in the interval covered by a `Forward` or
    /// `Reverse` action.
    pub fn contains(&self, step: usize) -> bool {
        match *self {
            Action::Forward { n0, n1, .. } => (n0..n1).contains(&step),
            Action::Reverse { n1, n0, .. } => (n0..n1).contains(&step),
            _ => false,
        }
    }

    /// Iterator over the steps covered by a `Forward` action (ascending) or
    /// a `Reverse` action (descending). Empty for the other variants.
    pub fn steps(&self) -> Box<dyn Iterator<Item = usize>> {
        match *self {
            Action::Forward { n0, n1, .. } => Box::new(n0..n1),
            Action::Reverse { n1, n0, .. } => Box::new((n0..n1).rev()),
            _ => Box::new(std::iter::empty()),
        }
    }
}

/// Renders a step index, replacing the unbounded sentinel with a symbol.
struct Step(usize);

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == UNBOUNDED {
            write!(f, "*")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Action::Forward {
                n0,
                n1,
                write_ics,
                write_adj_deps,
                storage,
            } => write!(
                f,
                "Forward({}, {}, {}, {}, {})",
                Step(n0),
                Step(n1),
                write_ics,
                write_adj_deps,
                storage
            ),
            Action::Reverse {
                n1,
                n0,
                clear_adj_deps,
            } => write!(f, "Reverse({}, {}, {})", n1, n0, clear_adj_deps),
            Action::Copy {
                n,
                from_storage,
                to_storage,
            } => write!(f, "Copy({}, {}, {})", n, from_storage, to_storage),
            Action::Move {
                n,
                from_storage,
                to_storage,
            } => write!(f, "Move({}, {}, {})", n, from_storage, to_storage),
            Action::EndForward => write!(f, "EndForward()"),
            Action::EndReverse => write!(f, "EndReverse()"),
        }
    }
}
