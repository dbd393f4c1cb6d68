//! Error types for structured error handling.
//!
//! Every schedule surfaces misuse and infeasible configurations as a
//! [`ScheduleError`] value. Planners fail at construction; after a schedule
//! is built, only a misuse of `finalize` or iteration past exhaustion can
//! fail. Library code never panics on these paths.

use thiserror::Error;

/// Categorised schedule errors.
///
/// # Variants
/// - `InvalidBudget`: storage budget too small for the chosen algorithm
/// - `InvalidSteps`: non-positive step count where one is required
/// - `FinalizeConflict`: `finalize` disagrees with the schedule state
/// - `IterationAfterExhausted`: `next_action` called after the schedule
///   concluded
/// - `InternalInvariant`: a planner or adapter invariant broke; indicates a
///   bug in this crate, not in the caller
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ScheduleError {
    /// The storage budget cannot accommodate the requested schedule.
    #[error("storage budget of {snapshots} snapshot slot(s) is too small for {steps} forward step(s)")]
    InvalidBudget {
        /// Snapshot slots offered across all storage levels.
        snapshots: usize,
        /// Forward steps the schedule must cover.
        steps: usize,
    },

    /// A step count was zero where a positive count is required.
    #[error("step count must be positive, got {steps}")]
    InvalidSteps {
        /// The offending step count.
        steps: usize,
    },

    /// `finalize` was called with a step count the schedule cannot accept.
    #[error("cannot finalize at step {requested}: schedule is at step {frontier}")]
    FinalizeConflict {
        /// The step count passed to `finalize`.
        requested: usize,
        /// The forward frontier, or the previously fixed step count when one
        /// was already set.
        frontier: usize,
    },

    /// A cost model parameter is out of range.
    #[error("invalid cost model: {reason}")]
    InvalidCostModel {
        /// Which parameter constraint was violated.
        reason: &'static str,
    },

    /// `next_action` was called after the schedule concluded.
    #[error("schedule is exhausted")]
    IterationAfterExhausted,

    /// An internal invariant of a planner or adapter was violated.
    #[error("internal invariant violated: {reason}")]
    InternalInvariant {
        /// Short description of the broken invariant.
        reason: &'static str,
    },
}

impl ScheduleError {
    /// Shorthand constructor for internal invariant violations.
    pub fn internal(reason: &'static str) -> Self {
        ScheduleError::InternalInvariant { reason }
    }
}

/// Result type for schedule operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;
