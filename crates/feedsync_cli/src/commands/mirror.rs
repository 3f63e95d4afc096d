use feedsync::entity::sync_status::SyncStatus;
use feedsync::mirror::{MirrorRecord, MirrorStore};
use serde::Serialize;
use tabled::Tabled;

use crate::commands::shared::{OutputFormat, format_time, open_store, print_rows, truncate};

/// One mirror record for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct MirrorRow {
    #[tabled(rename = "SKU")]
    pub sku: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Remote ID")]
    pub remote_id: String,
    #[tabled(rename = "Feed Status")]
    pub feed_status: String,
    #[tabled(rename = "Last Synced")]
    pub last_synced: String,
    #[tabled(rename = "Last Error")]
    pub last_error: String,
}

impl From<&MirrorRecord> for MirrorRow {
    fn from(record: &MirrorRecord) -> Self {
        Self {
            sku: record.sku.clone(),
            status: record.sync_status.to_string(),
            remote_id: record.remote_id.clone().unwrap_or_else(|| "-".into()),
            feed_status: record.feed_status.clone(),
            last_synced: format_time(record.last_synced_at),
            last_error: record
                .last_error
                .as_deref()
                .map(|e| truncate(e, 60))
                .unwrap_or_default(),
        }
    }
}

/// List what the mirror believes a channel holds.
pub(crate) async fn handle_mirror(
    database_url: &str,
    channel: &str,
    status: Option<SyncStatus>,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(database_url).await?;
    let snapshot = store.load(channel).await?;

    let rows: Vec<MirrorRow> = snapshot
        .values()
        .filter(|r| status.is_none_or(|s| r.sync_status == s))
        .map(MirrorRow::from)
        .collect();

    if rows.is_empty() {
        eprintln!("No mirror records for channel '{}'", channel);
        return Ok(());
    }
    print_rows(&rows, output)
}
