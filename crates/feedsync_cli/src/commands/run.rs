use std::sync::Arc;
use std::time::Duration;

use feedsync::sync::{CycleOutcome, CycleSummary, ExecutionWindow, ReconcileError};
use serde::Serialize;
use tabled::Tabled;

use crate::commands::shared::{OutputFormat, Runtime, print_rows};
use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown::{is_shutdown_requested, sleep_unless_shutdown};

/// One line of the end-of-run report.
#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct SummaryRow {
    #[tabled(rename = "Channel")]
    pub channel: String,
    #[tabled(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Ins")]
    pub inserted: usize,
    #[tabled(rename = "Upd")]
    pub updated: usize,
    #[tabled(rename = "Deact")]
    pub deactivated: usize,
    #[tabled(rename = "React")]
    pub reactivated: usize,
    #[tabled(rename = "Purged")]
    pub purged: usize,
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

impl SummaryRow {
    pub(crate) fn from_summary(summary: &CycleSummary) -> Self {
        let mut outcome = summary.outcome.as_str().to_string();
        if summary.dry_run {
            outcome.push_str(" (dry run)");
        }
        Self {
            channel: summary.channel.clone(),
            outcome,
            inserted: summary.inserted.len(),
            updated: summary.updated.len(),
            deactivated: summary.deactivated.len(),
            reactivated: summary.reactivated.len(),
            purged: summary.purged.len(),
            failed: summary.failed.len(),
            detail: summary.detail().unwrap_or_default(),
        }
    }

    /// Row for a channel whose cycle stopped on an infrastructure error.
    pub(crate) fn from_error(channel: &str, error: &ReconcileError) -> Self {
        Self {
            channel: channel.to_string(),
            outcome: "error".into(),
            inserted: 0,
            updated: 0,
            deactivated: 0,
            reactivated: 0,
            purged: 0,
            failed: 0,
            detail: error.to_string(),
        }
    }
}

fn is_incomplete(summary: &CycleSummary) -> bool {
    matches!(
        summary.outcome,
        CycleOutcome::Aborted { .. } | CycleOutcome::FeedDown { .. }
    )
}

/// Report rows for every channel, and how many did not complete.
pub(crate) fn report(
    results: &[(String, Result<CycleSummary, ReconcileError>)],
) -> (Vec<SummaryRow>, usize) {
    let mut incomplete = 0;
    let rows = results
        .iter()
        .map(|(channel, result)| match result {
            Ok(summary) => {
                if is_incomplete(summary) {
                    incomplete += 1;
                }
                SummaryRow::from_summary(summary)
            }
            Err(e) => {
                incomplete += 1;
                SummaryRow::from_error(channel, e)
            }
        })
        .collect();
    (rows, incomplete)
}

/// Run one cycle per selected channel, or keep cycling with `--watch`.
pub(crate) async fn handle_run(
    config: &Config,
    database_url: &str,
    channel: Option<&str>,
    dry_run: bool,
    watch: bool,
    interval_secs: Option<u64>,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let channels = config.selected_channels(channel)?;
    let runtime = Runtime::open(config, database_url).await?;
    let reporter = Arc::new(ProgressReporter::new());

    let reconcilers = channels
        .iter()
        .map(|c| runtime.reconciler(config, c, dry_run, Some(reporter.as_callback())))
        .collect::<Result<Vec<_>, _>>()?;

    if !watch {
        let mut results = Vec::with_capacity(reconcilers.len());
        for (channel, reconciler) in channels.iter().zip(&reconcilers) {
            let result = reconciler.run_cycle().await;
            if let Err(e) = &result {
                tracing::error!(channel = %channel.name, error = %e, "Cycle failed");
            }
            results.push((channel.name.clone(), result));
        }
        reporter.finish();

        let (rows, failed) = report(&results);
        print_rows(&rows, output)?;

        if failed > 0 {
            return Err(format!("{} of {} channel cycles did not complete", failed, results.len()).into());
        }
        return Ok(());
    }

    let interval = Duration::from_secs(interval_secs.unwrap_or(config.sync.interval_secs).max(1));
    let mut windows: Vec<ExecutionWindow> =
        reconcilers.iter().map(|_| config.execution_window()).collect();

    tracing::info!(
        channels = reconcilers.len(),
        interval_secs = interval.as_secs(),
        max_cycles_per_hour = config.sync.max_cycles_per_hour,
        "Watching feed"
    );

    while !is_shutdown_requested() {
        for (reconciler, window) in reconcilers.iter().zip(windows.iter_mut()) {
            if is_shutdown_requested() {
                break;
            }
            // A failed cycle is reported and retried on the next tick.
            if let Err(e) = reconciler.run_scheduled_cycle(window).await {
                tracing::error!(error = %e, "Cycle failed");
            }
        }
        reporter.finish();
        sleep_unless_shutdown(interval).await;
    }

    tracing::info!("Stopped watching");
    Ok(())
}
