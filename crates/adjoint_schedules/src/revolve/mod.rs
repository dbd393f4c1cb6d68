//! Dynamic-programming optimal checkpointing schedules.
//!
//! This module implements the revolve family of schedules. A planner first
//! fills dense cost tables over `(remaining steps, slots)` subproblems,
//! then compiles the optimal decisions into a low-level operation sequence,
//! which an adapter translates into the public action stream.
//!
//! Four schedules share this machinery:
//! - [`Revolve`]: single storage level (memory), the classical binomial
//!   optimum.
//! - [`DiskRevolve`]: bounded memory plus unbounded disk.
//! - [`PeriodicDiskRevolve`]: unbounded disk written at a fixed optimal
//!   period.
//! - [`HRevolve`]: bounded memory plus bounded disk.
//!
//! Transfer costs between levels enter through [`CostModel`]. Every
//! tie-break is deterministic, so identical inputs compile to identical
//! action streams.

mod cost;
mod ops;
mod planner;
mod schedule;

pub use cost::CostModel;
pub use schedule::{DiskRevolve, HRevolve, PeriodicDiskRevolve, Revolve};
