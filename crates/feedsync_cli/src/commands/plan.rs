use feedsync::sync::{ChangeSet, GuardVerdict, Plan, SyncAction, UpdatePair};
use serde::Serialize;
use tabled::Tabled;

use crate::commands::shared::{OutputFormat, Runtime, print_rows};
use crate::config::Config;

/// One planned action.
#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct PlanRow {
    #[tabled(rename = "Channel")]
    pub channel: String,
    #[tabled(rename = "Action")]
    pub action: String,
    #[tabled(rename = "SKU")]
    pub sku: String,
    #[tabled(rename = "Remote ID")]
    pub remote_id: String,
    #[tabled(rename = "Detail")]
    pub detail: String,
}

/// Attribute names whose values differ, plus a status change if any.
fn changed_fields(pair: &UpdatePair) -> String {
    let mut fields: Vec<&str> = pair
        .new
        .attributes
        .iter()
        .filter(|(name, value)| pair.old.get(*name) != Some(*value))
        .map(|(name, _)| name.as_str())
        .collect();
    fields.extend(
        pair.old
            .keys()
            .filter(|name| !pair.new.attributes.contains_key(*name))
            .map(String::as_str),
    );
    if fields.is_empty() {
        "status or retry".to_string()
    } else {
        fields.join(", ")
    }
}

/// Flatten a change set into rows, in execution order.
pub(crate) fn plan_rows(channel: &str, change_set: &ChangeSet) -> Vec<PlanRow> {
    let mut rows: Vec<PlanRow> = change_set
        .actions()
        .iter()
        .map(|action| {
            let (remote_id, detail) = match action {
                SyncAction::Insert(item) => (None, format!("status {}", item.feed_status)),
                SyncAction::Update(pair) => (Some(pair.remote_id.clone()), changed_fields(pair)),
                SyncAction::Deactivate(d) => (d.remote_id.clone(), d.reason.as_str().to_string()),
                SyncAction::Reactivate(r) => (Some(r.remote_id.clone()), "approved by channel".into()),
            };
            PlanRow {
                channel: channel.to_string(),
                action: action.kind().to_string(),
                sku: action.sku().to_string(),
                remote_id: remote_id.unwrap_or_else(|| "-".into()),
                detail,
            }
        })
        .collect();

    rows.extend(change_set.to_purge.iter().map(|sku| PlanRow {
        channel: channel.to_string(),
        action: "purge".into(),
        sku: sku.clone(),
        remote_id: "-".into(),
        detail: "archived record no longer on channel".into(),
    }));
    rows
}

/// Show what a cycle would do, without writing anything.
pub(crate) async fn handle_plan(
    config: &Config,
    database_url: &str,
    channel: Option<&str>,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let channels = config.selected_channels(channel)?;
    let runtime = Runtime::open(config, database_url).await?;

    let mut rows = Vec::new();
    for channel in channels {
        let reconciler = runtime.reconciler(config, channel, true, None)?;
        match reconciler.plan().await? {
            Plan::Halted(outcome) => {
                eprintln!(
                    "{}: cycle would stop ({}): {}",
                    channel.name,
                    outcome.as_str(),
                    outcome.reason().unwrap_or_default()
                );
            }
            Plan::Ready {
                change_set,
                verdict,
            } => {
                if let GuardVerdict::Abort { reason } = &verdict {
                    eprintln!("{}: safety guard would abort: {}", channel.name, reason);
                }
                if change_set.is_empty() {
                    eprintln!("{}: in sync", channel.name);
                }
                rows.extend(plan_rows(&channel.name, &change_set));
            }
        }
    }

    if !rows.is_empty() {
        print_rows(&rows, output)?;
    }
    Ok(())
}
