use std::sync::Arc;

use crate::commands::run::report;
use crate::commands::shared::{OutputFormat, Runtime, print_rows};
use crate::config::Config;
use crate::progress::ProgressReporter;

/// Reconcile one SKU on the selected channels.
///
/// Single-SKU runs bypass the safety guard: an operator repairing one
/// listing should not be blocked by a destructive-count threshold.
pub(crate) async fn handle_sku(
    config: &Config,
    database_url: &str,
    sku: &str,
    channel: Option<&str>,
    dry_run: bool,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err("SKU must not be empty".into());
    }

    let channels = config.selected_channels(channel)?;
    let runtime = Runtime::open(config, database_url).await?;
    let reporter = Arc::new(ProgressReporter::new());

    let mut results = Vec::with_capacity(channels.len());
    for channel in channels {
        let reconciler = runtime.reconciler(config, channel, dry_run, Some(reporter.as_callback()))?;
        let result = reconciler.run_single_sku(sku).await;
        if let Err(e) = &result {
            tracing::error!(channel = %channel.name, sku = %sku, error = %e, "Repair failed");
        }
        results.push((channel.name.clone(), result));
    }
    reporter.finish();

    let (rows, incomplete) = report(&results);
    print_rows(&rows, output)?;

    let any_failed = results
        .iter()
        .any(|(_, r)| r.as_ref().is_ok_and(|s| !s.failed.is_empty()));
    if incomplete > 0 || any_failed {
        return Err(format!("SKU {} was not reconciled everywhere", sku).into());
    }
    Ok(())
}
