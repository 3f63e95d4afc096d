//! Cycle-level safety checks run between diffing and execution.
//!
//! A bad feed snapshot (truncated export, wrong file, upstream bug) shows up
//! as a burst of deactivations. The guard refuses such cycles outright;
//! nothing in an aborted change set executes.

use serde::Deserialize;

use super::types::{ChangeSet, DEFAULT_MAX_DESTRUCTIVE_PER_CYCLE};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SafetyThresholds {
    /// Deactivations allowed in one cycle.
    pub max_destructive_per_cycle: usize,
    /// Allowed gap between remote live count and mirror active count.
    /// `None` uses `max_destructive_per_cycle`.
    pub max_divergence: Option<usize>,
    /// Allowed share of previously active listings deactivated in one cycle.
    pub max_destructive_ratio: Option<f64>,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            max_destructive_per_cycle: DEFAULT_MAX_DESTRUCTIVE_PER_CYCLE,
            max_divergence: None,
            max_destructive_ratio: None,
        }
    }
}

impl SafetyThresholds {
    #[must_use]
    pub fn divergence_limit(&self) -> usize {
        self.max_divergence.unwrap_or(self.max_destructive_per_cycle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Allow,
    Abort { reason: String },
}

impl GuardVerdict {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardVerdict::Allow)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafetyGuard {
    thresholds: SafetyThresholds,
}

impl SafetyGuard {
    pub fn new(thresholds: SafetyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.thresholds
    }

    /// Decide whether `change_set` may execute.
    ///
    /// `previous_active_count` is the number of active mirror records before
    /// the cycle; `remote_active_count` is the channel's live listing count
    /// when it can enumerate.
    #[must_use]
    pub fn check(
        &self,
        change_set: &ChangeSet,
        previous_active_count: usize,
        remote_active_count: Option<usize>,
    ) -> GuardVerdict {
        let destructive = change_set.destructive_count();
        let limit = self.thresholds.max_destructive_per_cycle;

        if destructive > limit {
            return GuardVerdict::Abort {
                reason: format!(
                    "{destructive} deactivations exceed the limit of {limit}: {}",
                    change_set.deactivate_skus().join(", ")
                ),
            };
        }

        if let Some(remote_active) = remote_active_count {
            let divergence = remote_active.abs_diff(previous_active_count);
            let limit = self.thresholds.divergence_limit();
            if divergence > limit {
                return GuardVerdict::Abort {
                    reason: format!(
                        "Channel lists {remote_active} live listings but the mirror has \
                         {previous_active_count} active; divergence {divergence} exceeds {limit}"
                    ),
                };
            }
        }

        if let Some(max_ratio) = self.thresholds.max_destructive_ratio
            && previous_active_count > 0
            && destructive > 0
        {
            let ratio = destructive as f64 / previous_active_count as f64;
            if ratio > max_ratio {
                return GuardVerdict::Abort {
                    reason: format!(
                        "{destructive} of {previous_active_count} active listings ({:.0}%) \
                         would be deactivated, above {:.0}%: {}",
                        ratio * 100.0,
                        max_ratio * 100.0,
                        change_set.deactivate_skus().join(", ")
                    ),
                };
            }
        }

        GuardVerdict::Allow
    }
}
