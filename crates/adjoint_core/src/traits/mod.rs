//! Protocol traits.
//!
//! This module provides [`schedule::CheckpointSchedule`], the iterator-style
//! protocol every schedule implements, together with the shared
//! [`schedule::ScheduleCursor`] bookkeeping and the [`schedule::ActionIter`]
//! adapter.

pub mod schedule;

pub use schedule::{ActionIter, CheckpointSchedule, ScheduleCursor};
