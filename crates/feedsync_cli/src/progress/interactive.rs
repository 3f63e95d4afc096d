use std::sync::Mutex;

use console::style;
use feedsync::sync::{CycleOutcome, SyncProgress};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Bars for the cycle currently running.
#[derive(Default)]
struct ProgressState {
    /// Spinner shown while the feed, mirror and remote are read.
    prepare: Option<ProgressBar>,
    /// Bar over the planned actions.
    actions: Option<ProgressBar>,
}

/// Interactive progress reporter using indicatif.
///
/// One spinner per channel while a cycle is prepared, then a bar over its
/// actions. Failures and aborts are printed above the bars so they stay
/// visible after the bars are cleared.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncProgress::FetchingFeed { channel } => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(std::time::Duration::from_millis(100));
                pb.set_prefix(format!("{:10}", channel));
                pb.set_message("Fetching inventory feed...");
                state.prepare = Some(pb);
            }

            SyncProgress::FeedFetched { items, .. } => {
                if let Some(ref pb) = state.prepare {
                    pb.set_message(format!("{} feed items, loading mirror...", items));
                }
            }

            SyncProgress::MirrorLoaded { active, .. } => {
                if let Some(ref pb) = state.prepare {
                    pb.set_message(format!("{} active listings in mirror", active));
                }
            }

            SyncProgress::RemoteListed { live, .. } => {
                if let Some(ref pb) = state.prepare {
                    pb.set_message(format!("{} live listings on channel", live));
                }
            }

            SyncProgress::FeedDown { channel, reason } => {
                if let Some(pb) = state.prepare.take() {
                    pb.finish_and_clear();
                }
                self.println(format!(
                    "{} {} feed down: {}",
                    style("!").yellow().bold(),
                    style(channel).cyan(),
                    reason
                ));
            }

            SyncProgress::Planned {
                channel,
                inserts,
                updates,
                deactivations,
                reactivations,
                purges,
            } => {
                if let Some(pb) = state.prepare.take() {
                    pb.finish_and_clear();
                }
                let total = inserts + updates + deactivations + reactivations;
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::bar_style());
                pb.set_prefix(format!("{:10}", channel));
                pb.set_message(format!(
                    "+{} ~{} -{} ↺{} purge {}",
                    inserts, updates, deactivations, reactivations, purges
                ));
                state.actions = Some(pb);
            }

            SyncProgress::GuardAborted { channel, reason } => {
                if let Some(pb) = state.actions.take() {
                    pb.finish_and_clear();
                }
                self.println(format!(
                    "{} {} aborted: {}",
                    style("✗").red().bold(),
                    style(channel).cyan(),
                    reason
                ));
            }

            SyncProgress::ActionStarted {
                sku, kind, dry_run, ..
            } => {
                if let Some(ref pb) = state.actions {
                    let verb = if dry_run { "would" } else { "now" };
                    pb.set_message(format!("{} {} {}", verb, kind, sku));
                }
            }

            SyncProgress::ActionRetry {
                sku,
                kind,
                attempt,
                delay,
                ..
            } => {
                if let Some(ref pb) = state.actions {
                    pb.set_message(format!(
                        "{} {} retry {} in {:.1}s",
                        kind,
                        sku,
                        attempt,
                        delay.as_secs_f64()
                    ));
                }
            }

            SyncProgress::ActionApplied { .. } => {
                if let Some(ref pb) = state.actions {
                    pb.inc(1);
                }
            }

            SyncProgress::ActionFailed { sku, kind, error } => {
                if let Some(ref pb) = state.actions {
                    pb.inc(1);
                }
                self.println(format!(
                    "{} {} {}: {}",
                    style("✗").red(),
                    kind,
                    style(sku).bold(),
                    error
                ));
            }

            SyncProgress::CycleComplete { summary } => {
                if let Some(pb) = state.prepare.take() {
                    pb.finish_and_clear();
                }
                let message = match &summary.outcome {
                    CycleOutcome::Completed if summary.is_noop() => "in sync".to_string(),
                    CycleOutcome::Completed => format!(
                        "{} applied, {} failed{}",
                        summary.applied_count(),
                        summary.failed.len(),
                        if summary.dry_run { " (dry run)" } else { "" }
                    ),
                    other => other.as_str().replace('_', " "),
                };
                match state.actions.take() {
                    Some(pb) => pb.finish_with_message(message),
                    None => self.println(format!(
                        "{} {} {}",
                        style("•").dim(),
                        style(&summary.channel).cyan(),
                        message
                    )),
                }
            }

            SyncProgress::CycleSkipped { channel, reason } => {
                self.println(format!(
                    "{} {} skipped: {}",
                    style("•").dim(),
                    style(channel).cyan(),
                    reason
                ));
            }

            SyncProgress::Warning { message } => {
                self.println(format!("{} {}", style("!").yellow(), message));
            }

            _ => {}
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for pb in [&state.prepare, &state.actions].into_iter().flatten() {
            if !pb.is_finished() {
                pb.finish();
            }
        }
    }

    fn println(&self, line: String) {
        self.multi.println(line).ok();
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
