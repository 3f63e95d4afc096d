//! Configuration file support for feedsync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `FEEDSYNC_`, nested keys joined
//!    with `__`, e.g. `FEEDSYNC_SYNC__DRY_RUN=true`)
//! 3. Config file (./feedsync.toml, then ~/.config/feedsync/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/feedsync/feedsync.db`
//! on Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/feedsync/feedsync.db"  # optional, this is the default
//!
//! [feed]
//! path = "/srv/inventory/watches.json"  # or url = "https://..."
//!
//! [alert]
//! webhook_url = "https://hooks.example.com/feedsync"
//! min_severity = "warning"
//!
//! [sync]
//! max_destructive_per_cycle = 25
//! max_attempts = 3
//! max_cycles_per_hour = 4
//!
//! [[channels]]
//! name = "b2b"
//! base_url = "https://b2b.example.com/api"
//! token = "..."
//! rps = 2
//! retention = "archive"
//!
//! [channels.policy]
//! terminal_statuses = ["sold", "on memo"]
//! reactivate_on = ["approved"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use feedsync::alert::Severity;
use feedsync::channel::rate_limits;
use feedsync::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS};
use feedsync::sync::{
    DEFAULT_MAX_CYCLES_PER_HOUR, DEFAULT_MAX_DESTRUCTIVE_PER_CYCLE, DefaultStatusPolicy,
    ExecutionWindow, Retention, SafetyThresholds, SyncOptions,
};
use feedsync::{Pacing, RetryPolicy};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Inventory feed location.
    pub feed: FeedConfig,
    /// Alert delivery.
    pub alert: AlertConfig,
    /// Reconciliation tunables shared by every channel.
    pub sync: SyncConfig,
    /// Sales channels, reconciled in order.
    pub channels: Vec<ChannelConfig>,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/feedsync/feedsync.db` if not specified.
    pub url: Option<String>,
}

/// Where the inventory snapshot comes from. `path` wins over `url`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    /// Bearer token for `url`.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: None,
            url: None,
            token: None,
            timeout_secs: 60,
        }
    }
}

/// Alert delivery configuration. Alerts are always logged; the webhook is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    /// Lowest severity posted to the webhook.
    pub min_severity: Severity,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            min_severity: Severity::Warning,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Deactivations allowed in one cycle before it is aborted.
    pub max_destructive_per_cycle: usize,
    /// Allowed gap between remote live listings and mirror active records.
    pub max_divergence: Option<usize>,
    /// Allowed share (0.0 - 1.0) of active listings ended in one cycle.
    pub max_destructive_ratio: Option<f64>,
    /// Attempts per channel write, including the first.
    pub max_attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Randomized gap between writes of the same kind.
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    /// Report what would change without writing anything.
    pub dry_run: bool,
    /// Scheduled cycles admitted per clock hour; zero disables the cap.
    pub max_cycles_per_hour: u32,
    /// Seconds between cycles in `run --watch`.
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let pacing = Pacing::default();
        Self {
            max_destructive_per_cycle: DEFAULT_MAX_DESTRUCTIVE_PER_CYCLE,
            max_divergence: None,
            max_destructive_ratio: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            pacing_min_ms: pacing.min.as_millis() as u64,
            pacing_max_ms: pacing.max.as_millis() as u64,
            dry_run: false,
            max_cycles_per_hour: DEFAULT_MAX_CYCLES_PER_HOUR,
            interval_secs: 900,
        }
    }
}

/// One sales channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub name: String,
    /// Root of the channel's listing API.
    pub base_url: String,
    pub token: Option<String>,
    /// Requests per second (clamped to 1..=50).
    pub rps: u32,
    /// Whether the channel can list its live listings.
    pub enumerate: bool,
    /// What happens to mirror records of ended listings.
    pub retention: Retention,
    pub policy: DefaultStatusPolicy,
    pub timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            token: None,
            rps: rate_limits::DEFAULT_RPS,
            enumerate: true,
            retention: Retention::default(),
            policy: DefaultStatusPolicy::default(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/feedsync/config.toml)
    /// 3. Local config file (./feedsync.toml)
    /// 4. Environment variables with FEEDSYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("feedsync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./feedsync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., FEEDSYNC_DATABASE__URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("FEEDSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("feedsync.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// Find a configured channel by name.
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// Channels selected by `--channel`, or all of them.
    pub fn selected_channels(&self, only: Option<&str>) -> Result<Vec<&ChannelConfig>, String> {
        if self.channels.is_empty() {
            return Err("No channels configured. Add a [[channels]] entry to feedsync.toml".into());
        }
        match only {
            Some(name) => self
                .channel(name)
                .map(|c| vec![c])
                .ok_or_else(|| format!("Channel '{}' is not configured", name)),
            None => Ok(self.channels.iter().collect()),
        }
    }

    /// Per-channel sync options from `[sync]` and the channel's retention.
    pub fn sync_options(&self, channel: &ChannelConfig, dry_run: bool) -> SyncOptions {
        let sync = &self.sync;
        SyncOptions {
            dry_run: dry_run || sync.dry_run,
            retry: RetryPolicy::new(
                sync.max_attempts,
                Duration::from_millis(sync.min_delay_ms),
                Duration::from_millis(sync.max_delay_ms),
            ),
            pacing: Pacing {
                min: Duration::from_millis(sync.pacing_min_ms),
                max: Duration::from_millis(sync.pacing_max_ms.max(sync.pacing_min_ms)),
            },
            retention: channel.retention,
            thresholds: SafetyThresholds {
                max_destructive_per_cycle: sync.max_destructive_per_cycle,
                max_divergence: sync.max_divergence,
                max_destructive_ratio: sync.max_destructive_ratio,
            },
        }
    }

    /// A fresh hourly admission window for scheduled cycles.
    pub fn execution_window(&self) -> ExecutionWindow {
        ExecutionWindow::new(self.sync.max_cycles_per_hour)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "feedsync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/feedsync` or `~/.local/state/feedsync`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "feedsync").map(|dirs| {
            // state_dir() returns None on macOS/Windows, fall back to data_dir
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
