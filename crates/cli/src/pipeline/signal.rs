//! Ctrl-C / SIGTERM handling.

use capture::{Shutdown, ShutdownTrigger};
use tracing::warn;

/// Spawn a task that flips the shutdown flag on Ctrl-C or SIGTERM
///
/// The capture loops observe the flag between ticks and fall through to
/// their teardown.
pub fn install_shutdown_handler() -> Shutdown {
    let (trigger, shutdown) = Shutdown::channel();
    tokio::spawn(wait_for_signal(trigger));
    shutdown
}

async fn wait_for_signal(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Received shutdown signal, finishing current frame and tearing down...");
    trigger.trigger();
}
