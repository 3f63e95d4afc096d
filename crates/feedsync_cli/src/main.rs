//! feedsync CLI - runs inventory feed reconciliation against sales channels.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use feedsync::entity::sync_status::SyncStatus;
use tracing_subscriber::EnvFilter;

use crate::commands::shared::OutputFormat;

#[derive(Parser)]
#[command(name = "feedsync")]
#[command(version)]
#[command(about = "Keep a watch inventory feed in sync with sales channels")]
#[command(
    long_about = "feedsync compares the authoritative inventory feed with a local mirror of \
each sales channel, refuses change sets that would end too many listings at once, and \
applies the rest one listing at a time with retry and backoff."
)]
#[command(after_long_help = r#"EXAMPLES
    Reconcile every configured channel once:
        $ feedsync run

    See what a cycle would change on one channel:
        $ feedsync plan --channel b2b

    Keep reconciling every 15 minutes (at most 4 cycles per hour):
        $ feedsync run --watch --interval 900

    Repair a single listing, bypassing the safety guard:
        $ feedsync sku RLX-116610LN --channel b2b

    Show listings whose last publish failed:
        $ feedsync mirror b2b --status publish_failed

CONFIGURATION
    feedsync reads configuration from:
      1. ~/.config/feedsync/config.toml (or $XDG_CONFIG_HOME/feedsync/config.toml)
      2. ./feedsync.toml
      3. Environment variables (FEEDSYNC_* prefix, nested keys joined with __)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    FEEDSYNC_DATABASE__URL     Database connection string (default: ~/.local/state/feedsync/feedsync.db)
    FEEDSYNC_FEED__PATH        Local JSON inventory snapshot
    FEEDSYNC_FEED__URL         HTTP JSON inventory snapshot
    FEEDSYNC_ALERT__WEBHOOK_URL  Webhook receiving JSON alerts
    FEEDSYNC_SYNC__DRY_RUN     Never write to channels
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation cycle on each configured channel
    Run {
        /// Only reconcile this channel
        #[arg(short, long)]
        channel: Option<String>,

        /// Dry run - report what would change without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Keep running cycles until Ctrl+C, subject to the hourly cap
        #[arg(short, long)]
        watch: bool,

        /// Seconds between cycles in watch mode (default from config or 900)
        #[arg(short, long, requires = "watch")]
        interval: Option<u64>,

        /// Output format for the summary
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Reconcile a single SKU, bypassing the safety guard
    Sku {
        /// SKU to reconcile
        sku: String,

        /// Only reconcile on this channel
        #[arg(short, long)]
        channel: Option<String>,

        /// Dry run - report what would change without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Output format for the summary
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show the change set the next cycle would apply
    Plan {
        /// Only plan this channel
        #[arg(short, long)]
        channel: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// List mirror records for a channel
    Mirror {
        /// Channel name
        channel: String,

        /// Only show records in this sync status (e.g. publish_failed)
        #[arg(short, long)]
        status: Option<SyncStatus>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show recent cycles for a channel
    History {
        /// Channel name
        channel: String,

        /// Number of cycles to show
        #[arg(short, long, default_value_t = 20)]
        limit: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

fn init_tracing() {
    // Progress bars own the terminal; only warnings go to stderr there.
    let default_filter = if Term::stdout().is_term() {
        "feedsync=warn,feedsync_cli=warn"
    } else {
        "feedsync=info,feedsync_cli=info"
    };
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_filter),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    // Handle commands that don't require configuration or database access first
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set [database] url")?;
    feedsync::db::ensure_sqlite_parent_dir(&database_url)?;

    match cli.command {
        Commands::Run {
            channel,
            dry_run,
            watch,
            interval,
            output,
        } => {
            if watch {
                shutdown::setup_shutdown_handler();
            }
            commands::run::handle_run(
                &config,
                &database_url,
                channel.as_deref(),
                dry_run,
                watch,
                interval,
                output,
            )
            .await?;
        }
        Commands::Sku {
            sku,
            channel,
            dry_run,
            output,
        } => {
            commands::sku::handle_sku(
                &config,
                &database_url,
                &sku,
                channel.as_deref(),
                dry_run,
                output,
            )
            .await?;
        }
        Commands::Plan { channel, output } => {
            commands::plan::handle_plan(&config, &database_url, channel.as_deref(), output)
                .await?;
        }
        Commands::Mirror {
            channel,
            status,
            output,
        } => {
            commands::mirror::handle_mirror(&database_url, &channel, status, output).await?;
        }
        Commands::History {
            channel,
            limit,
            output,
        } => {
            commands::history::handle_history(&database_url, &channel, limit, output).await?;
        }
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_watch() {
        let cli = Cli::try_parse_from(["feedsync", "run", "--watch", "--interval", "600", "-n"])
            .expect("valid args");
        match cli.command {
            Commands::Run {
                watch,
                interval,
                dry_run,
                channel,
                ..
            } => {
                assert!(watch);
                assert!(dry_run);
                assert_eq!(interval, Some(600));
                assert!(channel.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn interval_requires_watch() {
        assert!(Cli::try_parse_from(["feedsync", "run", "--interval", "600"]).is_err());
    }

    #[test]
    fn parses_mirror_status_filter() {
        let cli = Cli::try_parse_from(["feedsync", "mirror", "b2b", "--status", "publish-failed"])
            .expect("valid args");
        match cli.command {
            Commands::Mirror { channel, status, .. } => {
                assert_eq!(channel, "b2b");
                assert_eq!(status, Some(SyncStatus::PublishFailed));
            }
            _ => panic!("expected mirror"),
        }
    }

    #[test]
    fn sku_requires_an_argument() {
        assert!(Cli::try_parse_from(["feedsync", "sku"]).is_err());
    }
}
