//! Synchronization pump.
//!
//! Calls [`StateStore::sync`] at a fixed interval until shutdown. Every
//! round delivers the store's pending change notifications, so the pump has
//! to keep running for as long as bindings exist.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::error::{BridgeError, Result};
use crate::stats::MirrorStats;
use crate::store::StateStore;

/// Completion signal of the store's initial population.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<bool>,
}

impl ReadySignal {
    /// Whether the store has reported a populated sync round.
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the initial population, at most `timeout`.
    pub async fn wait(&mut self, timeout: Duration) -> Result<()> {
        let timed_out = || BridgeError::DiscoveryTimedOut {
            timeout_ms: timeout.as_millis() as u64,
        };

        match tokio::time::timeout(timeout, self.rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            // The pump stopped before the store was ever populated.
            Ok(Err(_)) => Err(timed_out()),
            Err(_) => Err(timed_out()),
        }
    }
}

/// Handle of a running pump task.
#[derive(Debug)]
pub struct SyncPump {
    shutdown: watch::Sender<bool>,
    ready: ReadySignal,
    handle: JoinHandle<()>,
}

impl SyncPump {
    /// Spawn the pump for `store`, syncing every `period`.
    pub fn spawn<S: StateStore>(store: Arc<S>, period: Duration, stats: Arc<MirrorStats>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = watch::channel(false);

        let handle = tokio::spawn(run(store, period, stats, ready_tx, shutdown_rx));

        Self {
            shutdown,
            ready: ReadySignal { rx: ready_rx },
            handle,
        }
    }

    /// A readiness signal that completes on the first populated round.
    pub fn ready(&self) -> ReadySignal {
        self.ready.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop ticking and wait for the round in progress to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Sync pump task failed");
        }
    }
}

async fn run<S: StateStore>(
    store: Arc<S>,
    period: Duration,
    stats: Arc<MirrorStats>,
    ready: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_ms = period.as_millis() as u64, "Starting sync pump");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        match store.sync().await {
            Ok(outcome) => {
                stats.record_sync();
                if outcome.notified > 0 {
                    tracing::trace!(
                        changed = outcome.changed,
                        notified = outcome.notified,
                        "Sync delivered notifications"
                    );
                }
                if outcome.populated && !*ready.borrow() {
                    tracing::info!("Store initial population complete");
                    let _ = ready.send(true);
                }
            }
            Err(e) => {
                stats.record_sync_failure();
                tracing::warn!(error = %e, "Store sync failed");
            }
        }
    }

    tracing::info!("Sync pump stopped");
}
