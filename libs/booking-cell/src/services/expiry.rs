use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use payment_cell::services::reconcile::TransactionReconciler;
use shared_config::AppConfig;
use shared_store::DataStore;

const TIMEOUT_REASON: &str = "payment timed out";

/// Background sweep for redirects the caller never returned from: any
/// transaction still PENDING past the timeout is failed through the
/// reconciler, which also cancels the PENDING_PAYMENT appointment it
/// funds and releases the slot.
pub struct PendingPaymentSweeper {
    store: Arc<DataStore>,
    reconciler: TransactionReconciler,
    timeout: chrono::Duration,
    interval: Duration,
}

impl PendingPaymentSweeper {
    pub fn new(store: Arc<DataStore>, config: &AppConfig) -> Self {
        Self {
            reconciler: TransactionReconciler::new(Arc::clone(&store)),
            timeout: chrono::Duration::minutes(config.pending_payment_timeout_minutes),
            interval: Duration::from_secs(config.expiry_sweep_interval_seconds),
            store,
        }
    }

    /// One sweep pass; returns how many transactions were expired.
    pub async fn run_once(&self) -> usize {
        let cutoff = Utc::now() - self.timeout;
        let stale = self.store.pending_transactions_older_than(cutoff).await;

        if stale.is_empty() {
            debug!("Expiry sweep found nothing pending past the timeout");
            return 0;
        }

        let mut expired = 0;
        for transaction in stale {
            match self
                .reconciler
                .fail_pending(&transaction.reference, TIMEOUT_REASON)
                .await
            {
                Ok(outcome) if !outcome.replayed => {
                    info!(
                        "Expired pending transaction {} (created {})",
                        transaction.reference, transaction.created_at
                    );
                    expired += 1;
                }
                Ok(_) => {
                    // A callback won the race; its terminal state stands.
                }
                Err(e) => {
                    error!("Expiry sweep failed for {}: {}", transaction.reference, e);
                }
            }
        }

        info!("Expiry sweep expired {} transactions", expired);
        expired
    }

    /// Spawn the sweep loop as a single-owner scheduled task. The
    /// returned handle is the only way to stop it; dropping the handle
    /// without calling `shutdown` leaves the loop running for the process
    /// lifetime, which is the intended server behavior.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            info!(
                "Pending-payment sweeper started (interval {:?}, timeout {} min)",
                interval,
                self.timeout.num_minutes()
            );
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a fresh boot
            // does not sweep before the store is seeded.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Pending-payment sweeper shutting down");
                        break;
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Owner handle for the sweep task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
