//! OS signal handling for graceful shutdown.
//!
//! The future returned by [`os_signal_shutdown`] completes on SIGTERM or SIGINT
//! (Ctrl+C on non-Unix platforms). It is meant for
//! `axum::serve(..).with_graceful_shutdown(..)`, which stops accepting connections and
//! lets in-flight requests finish.

use std::future::Future;
use tracing::{info, warn};

/// Complete on SIGTERM or SIGINT.
#[cfg(unix)]
pub async fn signal_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "failed to install signal handlers, falling back to Ctrl+C");
            ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT (Ctrl+C)");
        }
    }
}

/// Complete on Ctrl+C.
#[cfg(not(unix))]
pub async fn signal_shutdown() {
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            // never resolve rather than shutting down on a handler error
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

pub fn os_signal_shutdown() -> impl Future<Output = ()> + Send + 'static {
    async {
        signal_shutdown().await;
        info!("Shutdown signal received, draining in-flight requests");
    }
}
