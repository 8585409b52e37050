//! # vfslog-timemachine
//!
//! Reconstructs the state of the virtual file system at any position of its
//! append-only operation log.
//!
//! ```text
//! TimeMachine::get_snapshot(P)
//!     └─ Snapshot (cache-aware, anchored at the closest cached snapshot < P)
//!          └─ VirtualFileSnapshot per file id
//!               └─ Property per attribute: resolved on first access by a
//!                  backward scan of the log window [anchor, P), falling
//!                  back to the anchor's own answer
//! ```
//!
//! An [`Oracle`] can shortcut scans with live ground truth, and
//! [`with_oracle`] / [`with_contradiction_check`] overlay or cross-check a
//! snapshot source against one.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use vfslog_ops::{LogPosition, MemoryOperationLog, NameId, Operation};
//! use vfslog_timemachine::TimeMachine;
//!
//! let mut log = MemoryOperationLog::new();
//! log.append(Operation::SetParent { file_id: 7, parent_id: 1 });
//! let moved_at = log.append(Operation::SetParent { file_id: 7, parent_id: 2 });
//!
//! let names = |_: NameId| -> Option<String> { None };
//! let machine = TimeMachine::new(Arc::new(log), Arc::new(names));
//!
//! let before = machine.get_snapshot(moved_at);
//! assert_eq!(before.file_by_id(7).parent_id().get().ok(), Some(&1));
//! ```

pub mod attribute;
mod cache;
pub mod chronicle;
pub mod combinators;
pub mod equality;
pub mod machine;
pub mod oracle;
pub mod snapshot;
pub mod state;

pub use combinators::{
    with_contradiction_check, with_contradiction_check_using, with_oracle, Contradiction, DualSourceTimeMachine,
    ResolutionPolicy, Subject,
};
pub use equality::{DeepEquality, DefaultEquality, PropertyValue, ValueRef};
pub use machine::{SnapshotSource, TimeMachine, TimeMachineBuilder};
pub use oracle::{GroundTruth, GroundTruthOracle, Oracle};
pub use snapshot::{RecoveredChildren, Snapshot, SnapshotVariant, VirtualFileSnapshot};
pub use state::{NotAvailableCause, Property, PropertyError, Result, State};
