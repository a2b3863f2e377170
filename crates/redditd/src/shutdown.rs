//! Signal handling, periodic analytics flush and the exit flush guard.

use reddit_shared::Analytics;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received - shutting down"),
        _ = terminate => info!("SIGTERM received - shutting down"),
    }
}

/// Flush analytics every `every` until the task is aborted. The first flush
/// happens one interval after start. A zero interval disables the task.
pub fn spawn_periodic_flush(analytics: Arc<Analytics>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        info!("Periodic analytics flush disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let analytics = Arc::clone(&analytics);
            if let Err(e) = tokio::task::spawn_blocking(move || analytics.flush()).await {
                warn!("Periodic analytics flush panicked: {}", e);
            }
        }
    }))
}

/// Runs the final analytics flush when dropped, so early returns and
/// panics unwinding through `main` still persist counters.
pub struct FlushOnDrop {
    analytics: Arc<Analytics>,
}

impl FlushOnDrop {
    pub fn new(analytics: Arc<Analytics>) -> Self {
        Self { analytics }
    }
}

impl Drop for FlushOnDrop {
    fn drop(&mut self) {
        self.analytics.shutdown();
    }
}
