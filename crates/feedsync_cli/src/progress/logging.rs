use feedsync::sync::{CycleOutcome, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::FetchingFeed { channel } => {
                tracing::debug!(channel = %channel, "Fetching inventory feed");
            }

            SyncProgress::FeedFetched { channel, items } => {
                tracing::info!(channel = %channel, items, "Feed fetched");
            }

            SyncProgress::FeedDown { channel, reason } => {
                tracing::warn!(channel = %channel, reason = %reason, "Feed down, skipping cycle");
            }

            SyncProgress::MirrorLoaded {
                channel,
                records,
                active,
            } => {
                tracing::debug!(channel = %channel, records, active, "Mirror loaded");
            }

            SyncProgress::RemoteListed { channel, live } => {
                tracing::debug!(channel = %channel, live, "Remote listings enumerated");
            }

            SyncProgress::Planned {
                channel,
                inserts,
                updates,
                deactivations,
                reactivations,
                purges,
            } => {
                tracing::info!(
                    channel = %channel,
                    inserts,
                    updates,
                    deactivations,
                    reactivations,
                    purges,
                    "Change set planned"
                );
            }

            SyncProgress::GuardAborted { channel, reason } => {
                tracing::error!(channel = %channel, reason = %reason, "Cycle aborted by safety guard");
            }

            SyncProgress::ActionStarted {
                sku,
                kind,
                status,
                dry_run,
            } => {
                tracing::debug!(sku = %sku, action = %kind, status = %status, dry_run, "Applying action");
            }

            SyncProgress::ActionRetry {
                sku,
                kind,
                attempt,
                delay,
                error,
            } => {
                tracing::warn!(
                    sku = %sku,
                    action = %kind,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient channel error, backing off"
                );
            }

            SyncProgress::ActionApplied { sku, kind, dry_run } => {
                if dry_run {
                    tracing::info!(sku = %sku, action = %kind, "Would apply");
                } else {
                    tracing::info!(sku = %sku, action = %kind, "Applied");
                }
            }

            SyncProgress::ActionFailed { sku, kind, error } => {
                tracing::error!(sku = %sku, action = %kind, error = %error, "Action failed");
            }

            SyncProgress::Purged { sku } => {
                tracing::debug!(sku = %sku, "Purged archived record");
            }

            SyncProgress::CycleComplete { summary } => match &summary.outcome {
                CycleOutcome::Completed => tracing::info!(
                    channel = %summary.channel,
                    inserted = summary.inserted.len(),
                    updated = summary.updated.len(),
                    deactivated = summary.deactivated.len(),
                    reactivated = summary.reactivated.len(),
                    purged = summary.purged.len(),
                    failed = summary.failed.len(),
                    dry_run = summary.dry_run,
                    "Cycle complete"
                ),
                other => tracing::warn!(
                    channel = %summary.channel,
                    outcome = other.as_str(),
                    reason = other.reason().unwrap_or_default(),
                    "Cycle did not complete"
                ),
            },

            SyncProgress::CycleSkipped { channel, reason } => {
                tracing::info!(channel = %channel, reason = %reason, "Cycle skipped");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
