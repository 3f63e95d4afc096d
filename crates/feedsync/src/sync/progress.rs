//! Progress events for reconciliation cycles.
//!
//! The library never prints; callers (the CLI's reporter, tests) receive
//! [`SyncProgress`] events through an optional [`ProgressCallback`].

use std::time::Duration;

use crate::entity::sync_status::SyncStatus;

use super::types::{ActionKind, CycleSummary};

/// Progress events emitted while reconciling one channel.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Starting to fetch the inventory feed.
    FetchingFeed { channel: String },

    /// Feed snapshot received.
    FeedFetched { channel: String, items: usize },

    /// The feed could not be trusted; no differencing this cycle.
    FeedDown { channel: String, reason: String },

    /// Mirror records loaded for the channel.
    MirrorLoaded {
        channel: String,
        records: usize,
        /// Records considered live on the channel.
        active: usize,
    },

    /// Remote listings enumerated.
    RemoteListed { channel: String, live: usize },

    /// Change set computed.
    Planned {
        channel: String,
        inserts: usize,
        updates: usize,
        deactivations: usize,
        reactivations: usize,
        purges: usize,
    },

    /// A cycle-level check refused the change set.
    GuardAborted { channel: String, reason: String },

    /// About to write one action to the channel.
    ActionStarted {
        sku: String,
        kind: ActionKind,
        /// In-flight state the record moves through.
        status: SyncStatus,
        dry_run: bool,
    },

    /// A transient failure is being retried.
    ActionRetry {
        sku: String,
        kind: ActionKind,
        /// Attempt that just failed (1-indexed).
        attempt: u32,
        delay: Duration,
        error: String,
    },

    /// The action took effect (or would have, in dry-run mode).
    ActionApplied {
        sku: String,
        kind: ActionKind,
        dry_run: bool,
    },

    /// The action failed for good this cycle.
    ActionFailed {
        sku: String,
        kind: ActionKind,
        error: String,
    },

    /// An archived record was dropped from the mirror.
    Purged { sku: String },

    /// Cycle finished (completed or aborted).
    CycleComplete { summary: Box<CycleSummary> },

    /// The execution window refused a scheduled cycle.
    CycleSkipped { channel: String, reason: String },

    /// Something non-fatal worth surfacing.
    Warning { message: String },
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Box::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::FeedFetched {
                channel: "b2b".to_string(),
                items: 10,
            },
        );
        emit(
            Some(&callback),
            SyncProgress::Purged {
                sku: "A".to_string(),
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emit_without_callback() {
        emit(
            None,
            SyncProgress::Warning {
                message: "ignored".to_string(),
            },
        );
    }

    #[test]
    fn action_retry_debug() {
        let event = SyncProgress::ActionRetry {
            sku: "W-1001".to_string(),
            kind: ActionKind::Insert,
            attempt: 2,
            delay: Duration::from_secs(4),
            error: "Rate limited".to_string(),
        };

        let debug_str = format!("{event:?}");
        assert!(debug_str.contains("ActionRetry"));
        assert!(debug_str.contains("W-1001"));
        assert!(debug_str.contains("Rate limited"));
    }

    #[test]
    fn cycle_complete_carries_summary() {
        let summary = CycleSummary::start("b2b", None, true);
        let event = SyncProgress::CycleComplete {
            summary: Box::new(summary),
        };
        let SyncProgress::CycleComplete { summary } = event else {
            unreachable!();
        };
        assert!(summary.dry_run);
        assert_eq!(summary.channel, "b2b");
    }
}
