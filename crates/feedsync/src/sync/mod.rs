//! Reconciliation engine.
//!
//! # Module Structure
//!
//! - [`diff`] - Differencer: feed + mirror (+ remote) → `ChangeSet`
//! - [`guard`] - `SafetyGuard` and its thresholds
//! - [`executor`] - `ActionExecutor`: one action, retries, mirror write
//! - [`state`] - Item sync state machine
//! - [`policy`] - Per-channel `StatusPolicy`
//! - [`reconciler`] - `Reconciler`: the cycle pipeline
//! - `progress` - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - `types` - Change sets, actions, summaries, options

pub mod diff;
pub mod executor;
pub mod guard;
pub mod policy;
mod progress;
pub mod reconciler;
pub mod state;
mod types;

pub use types::{
    ActionKind, ActionOutcome, ChangeSet, CycleOutcome, CycleSummary, DeactivateReason,
    Deactivation, ExecutionWindow, FailedAction, Reactivation, SyncAction, SyncOptions,
    UpdatePair,
};

pub use types::{DEFAULT_MAX_CYCLES_PER_HOUR, DEFAULT_MAX_DESTRUCTIVE_PER_CYCLE};

pub use progress::{ProgressCallback, SyncProgress, emit};

pub use diff::{DiffError, diff, duplicate_skus};
pub use executor::ActionExecutor;
pub use guard::{GuardVerdict, SafetyGuard, SafetyThresholds};
pub use policy::{DefaultStatusPolicy, Normalization, Retention, StatusPolicy};
pub use reconciler::{Plan, ReconcileError, Reconciler, ReconcilerBuilder};
pub use state::{InvalidTransition, SyncEvent};
