use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use feedsync::alert::{Alerter, FanoutAlerter, TracingAlerter, WebhookAlerter};
use feedsync::channel::{RateLimitedChannel, RestChannel};
use feedsync::feed::{FeedSource, JsonFeedSource};
use feedsync::http::HttpTransport;
use feedsync::http::reqwest_transport::ReqwestTransport;
use feedsync::mirror::DbMirrorStore;
use feedsync::sync::{ProgressCallback, Reconciler};
use serde::Serialize;

use crate::config::{ChannelConfig, Config};

/// Every configured channel is a REST channel behind a governor quota.
pub(crate) type Channel = RateLimitedChannel<RestChannel>;

/// Output format for tabular commands.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Print rows as a rounded table or pretty JSON.
pub(crate) fn print_rows<T>(rows: &[T], format: OutputFormat) -> Result<(), Box<dyn std::error::Error>>
where
    T: Serialize + tabled::Tabled,
{
    match format {
        OutputFormat::Table => {
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
    }
    Ok(())
}

/// Open the mirror database, applying pending migrations.
pub(crate) async fn open_store(
    database_url: &str,
) -> Result<Arc<DbMirrorStore>, Box<dyn std::error::Error>> {
    let db = feedsync::connect_and_migrate(database_url).await?;
    Ok(Arc::new(DbMirrorStore::new(Arc::new(db))))
}

/// Build the feed source from `[feed]`; a local path wins over a URL.
pub(crate) fn build_feed(config: &Config) -> Result<Arc<dyn FeedSource>, Box<dyn std::error::Error>> {
    let feed = &config.feed;
    if let Some(ref path) = feed.path {
        return Ok(Arc::new(JsonFeedSource::file(path.clone())));
    }
    let Some(ref url) = feed.url else {
        return Err("No feed configured. Set [feed] path or url, or FEEDSYNC_FEED__PATH".into());
    };
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(feed.timeout_secs))?;
    Ok(Arc::new(JsonFeedSource::http(
        url.clone(),
        feed.token.clone(),
        Arc::new(transport),
    )))
}

/// Tracing alerts always; webhook alerts when `[alert] webhook_url` is set.
pub(crate) fn build_alerter(config: &Config) -> Result<Arc<dyn Alerter>, Box<dyn std::error::Error>> {
    let Some(ref url) = config.alert.webhook_url else {
        return Ok(Arc::new(TracingAlerter));
    };
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(10))?);
    let webhook = WebhookAlerter::new(url.clone(), transport)
        .with_min_severity(config.alert.min_severity);
    Ok(Arc::new(FanoutAlerter::new(vec![
        Arc::new(TracingAlerter),
        Arc::new(webhook),
    ])))
}

/// Build a rate-limited REST channel from its config entry.
pub(crate) fn build_channel(channel: &ChannelConfig) -> Result<Channel, Box<dyn std::error::Error>> {
    if channel.base_url.is_empty() {
        return Err(format!("Channel '{}' has no base_url", channel.name).into());
    }
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(channel.timeout_secs))?;
    let rest = RestChannel::new(&channel.name, &channel.base_url, Arc::new(transport))
        .with_token(channel.token.clone())
        .with_enumeration(channel.enumerate);
    Ok(RateLimitedChannel::new(rest, channel.rps))
}

/// Shared pieces every channel's reconciler is built from.
pub(crate) struct Runtime {
    pub(crate) store: Arc<DbMirrorStore>,
    pub(crate) feed: Arc<dyn FeedSource>,
    pub(crate) alerter: Arc<dyn Alerter>,
}

impl Runtime {
    pub(crate) async fn open(
        config: &Config,
        database_url: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            store: open_store(database_url).await?,
            feed: build_feed(config)?,
            alerter: build_alerter(config)?,
        })
    }

    /// Assemble the reconciler for one channel.
    pub(crate) fn reconciler(
        &self,
        config: &Config,
        channel: &ChannelConfig,
        dry_run: bool,
        progress: Option<Arc<ProgressCallback>>,
    ) -> Result<Reconciler<Channel>, Box<dyn std::error::Error>> {
        let mut builder = Reconciler::builder()
            .channel(build_channel(channel)?)
            .feed(Arc::clone(&self.feed))
            .store(self.store.clone())
            .alerter(Arc::clone(&self.alerter))
            .policy(Arc::new(channel.policy.clone()))
            .options(config.sync_options(channel, dry_run));
        if let Some(progress) = progress {
            builder = builder.progress(progress);
        }
        Ok(builder.build()?)
    }
}

/// Format an optional timestamp for tables.
pub(crate) fn format_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Cut long error messages down for table cells.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}
