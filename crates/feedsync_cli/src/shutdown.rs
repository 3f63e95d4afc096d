use std::sync::atomic::{AtomicBool, Ordering};

use console::Term;

/// Global shutdown flag, checked by `run --watch` between cycles.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if shutdown has been requested.
#[inline]
pub(crate) fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Acquire)
}

#[inline]
fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Release);
}

/// Set up the Ctrl+C handler.
///
/// The first Ctrl+C lets the running cycle finish so no listing is left
/// between a channel write and its mirror update; the second exits at once.
pub(crate) fn setup_shutdown_handler() {
    tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing the current cycle...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing the current cycle");
        }

        request_shutdown();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });
}

/// Sleep for `duration`, waking early once shutdown is requested.
pub(crate) async fn sleep_unless_shutdown(duration: std::time::Duration) {
    const TICK: std::time::Duration = std::time::Duration::from_millis(250);
    let deadline = tokio::time::Instant::now() + duration;
    while !is_shutdown_requested() {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(TICK.min(deadline - now)).await;
    }
}
