//! # adjoint_core: Action Model for Adjoint Checkpointing Schedules
//!
//! ## Layer 1 (Foundation) Role
//!
//! adjoint_core is the bottom layer of the two-crate workspace, providing
//! the vocabulary shared by every schedule generator and by the host driver:
//! - Schedule actions and storage kinds (`types::action`)
//! - Error types: `ScheduleError`, `ScheduleResult` (`types::error`)
//! - The schedule protocol: `CheckpointSchedule`, `ScheduleCursor`,
//!   `ActionIter` (`traits::schedule`)
//!
//! A checkpointing schedule is a deterministic lazy sequence of [`Action`]
//! values. The host driver executes each action against its forward and
//! adjoint solvers and its storage back ends; this crate performs no data
//! movement itself.
//!
//! ## Driver Protocol
//!
//! Actions are pulled one at a time with
//! [`CheckpointSchedule::next_action`] and dispatched by matching on the
//! [`Action`] variants:
//!
//! ```rust
//! use adjoint_core::{Action, CheckpointSchedule, ScheduleResult};
//!
//! fn drive<S: CheckpointSchedule>(schedule: &mut S) -> ScheduleResult<()> {
//!     while let Some(action) = schedule.next_action()? {
//!         match action {
//!             Action::Forward { .. } => { /* advance the solver */ }
//!             Action::Reverse { .. } => { /* advance the adjoint */ }
//!             Action::Copy { .. } | Action::Move { .. } => { /* storage */ }
//!             Action::EndForward => {}
//!             Action::EndReverse => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Schedules that do not know the number of forward steps up front run
//! *online*: the initial `Forward` action uses the [`UNBOUNDED`] sentinel as
//! its upper bound and the driver fixes the true step count later through
//! [`CheckpointSchedule::finalize`].
//!
//! ## Feature Flags
//!
//! - `serde`: enable serialisation for actions, storage kinds and errors.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod traits;
pub mod types;

pub use traits::schedule::{ActionIter, CheckpointSchedule, ScheduleCursor};
pub use types::action::{Action, StorageKind, StorageLevel, UNBOUNDED};
pub use types::error::{ScheduleError, ScheduleResult};
