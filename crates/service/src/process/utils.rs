use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Time given to in-flight uploads between SIGTERM and the shutdown signal.
const REQUEST_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Spawns a task that listens for SIGINT and SIGTERM and sends a shutdown signal via a watch.
///
/// Returns the join handle, the sender (for programmatic shutdown), and the receiver.
pub fn graceful_shutdown_blocker() -> (JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>) {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();
    let mut requested = tx.subscribe();

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {}
            _ = requested.changed() => {
                tracing::debug!("shutdown requested by the service");
            }
        }
        let _ = signal_tx.send(());
    });

    (handle, tx, rx)
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "unable to listen for SIGTERM, only SIGINT stops the service");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("gracefully exiting immediately on SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::debug!("initiating graceful shutdown with delay on SIGTERM");
            tokio::time::sleep(REQUEST_GRACE_PERIOD).await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::debug!("gracefully exiting on ctrl-c");
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    let build = common::prelude::build_info();

    tracing::info!(
        build_profile = ?build.build_profile,
        build_timestamp = ?build.build_timestamp,
        version = ?build.version,
        "ybfeed starting up"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_programmatic_shutdown_reaches_receivers() {
        let (handle, tx, mut rx) = graceful_shutdown_blocker();
        tx.send(()).unwrap();
        rx.changed().await.unwrap();
        handle.await.unwrap();
    }
}
