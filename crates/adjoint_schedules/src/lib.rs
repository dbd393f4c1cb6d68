//! # adjoint_schedules: Checkpointing Schedule Generators
//!
//! ## Layer 2 (Engine) Role
//!
//! adjoint_schedules computes checkpointing schedules for reverse-mode
//! (adjoint) computation over time-stepped simulations. Given a forward
//! calculation of `max_n` steps and a bounded checkpoint budget across a
//! tiered storage hierarchy, each generator emits a deterministic stream of
//! [`adjoint_core::Action`] values that a host driver executes to advance
//! the forward solver, save and restore restart state, and advance the
//! adjoint, minimising recomputation within the storage budget.
//!
//! ## Schedule Families
//!
//! - [`basic`]: `NoAdjoint` (forward only), plus `SingleMemoryStorage` and
//!   `SingleDiskStorage` as store-everything baselines, all online.
//! - [`revolve`]: `Revolve`, `DiskRevolve`, `PeriodicDiskRevolve` and
//!   `HRevolve`, the dynamic-programming optimal schedules over
//!   forward-step, write and read costs across the storage hierarchy.
//! - [`multistage`]: binomial checkpointing with a traffic-weighted split of
//!   slots between memory and disk.
//! - [`mixed`]: a single checkpoint budget shared between restart data and
//!   adjoint-dependency data.
//! - [`two_level`]: periodic disk checkpoints with inner binomial
//!   recomputation, online.
//!
//! ## Example
//!
//! ```rust
//! use adjoint_core::{Action, CheckpointSchedule};
//! use adjoint_schedules::revolve::Revolve;
//!
//! let mut schedule = Revolve::new(4, 2).unwrap();
//! let mut actions = Vec::new();
//! while let Some(action) = schedule.next_action().unwrap() {
//!     actions.push(action);
//!     if action == Action::EndReverse {
//!         break;
//!     }
//! }
//! assert_eq!(actions.len(), 16);
//! assert!(schedule.is_exhausted());
//! ```
//!
//! ## Determinism
//!
//! All tie-breaks in the planners are explicit, so two schedules built with
//! identical inputs produce identical action streams. The golden-sequence
//! tests in `tests/golden_sequences.rs` pin this contract.
//!
//! ## Feature Flags
//!
//! - `serde`: enable serialisation for schedule options and, transitively,
//!   for the action vocabulary.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod basic;
pub mod binomial;
pub mod mixed;
pub mod multistage;
pub mod revolve;
pub mod two_level;

pub use basic::{NoAdjoint, SingleDiskStorage, SingleMemoryStorage};
pub use binomial::Trajectory;
pub use mixed::Mixed;
pub use multistage::Multistage;
pub use revolve::{CostModel, DiskRevolve, HRevolve, PeriodicDiskRevolve, Revolve};
pub use two_level::TwoLevel;
