use feedsync::mirror::{CycleRecord, MirrorStore};
use serde::Serialize;
use tabled::Tabled;

use crate::commands::shared::{OutputFormat, format_time, open_store, print_rows, truncate};

#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct HistoryRow {
    #[tabled(rename = "Started")]
    pub started: String,
    #[tabled(rename = "Took")]
    pub took: String,
    #[tabled(rename = "Outcome")]
    pub outcome: String,
    #[tabled(rename = "Scope")]
    pub scope: String,
    #[tabled(rename = "Ins/Upd/Deact/React")]
    pub counts: String,
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

impl From<&CycleRecord> for HistoryRow {
    fn from(record: &CycleRecord) -> Self {
        let took = record.finished_at.signed_duration_since(record.started_at);
        let mut outcome = record.outcome.clone();
        if record.dry_run {
            outcome.push_str(" (dry run)");
        }
        Self {
            started: format_time(Some(record.started_at)),
            took: format!("{}s", took.num_seconds().max(0)),
            outcome,
            scope: record
                .single_sku
                .as_ref()
                .map(|sku| format!("sku {}", sku))
                .unwrap_or_else(|| "full".into()),
            counts: format!(
                "{}/{}/{}/{}",
                record.inserted, record.updated, record.deactivated, record.reactivated
            ),
            failed: record.failed,
            detail: record
                .detail
                .as_deref()
                .map(|d| truncate(d, 80))
                .unwrap_or_default(),
        }
    }
}

/// Show the newest journaled cycles for a channel.
pub(crate) async fn handle_history(
    database_url: &str,
    channel: &str,
    limit: u64,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(database_url).await?;
    let cycles = store.recent_cycles(channel, limit).await?;

    if cycles.is_empty() {
        eprintln!("No cycles recorded for channel '{}'", channel);
        return Ok(());
    }
    let rows: Vec<HistoryRow> = cycles.iter().map(HistoryRow::from).collect();
    print_rows(&rows, output)
}
