/// Periodic role and membership reconciliation
///
/// Runs [`reconcile`] on a fixed interval until the shutdown token fires.
/// A failed pass is logged and retried on the next tick; nothing a single
/// pass does is worth stopping the worker for.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use teamsync_shared::store::InMemoryStore;
/// use teamsync_worker::reconciler::RoleReconciler;
///
/// # async fn example() {
/// let reconciler = RoleReconciler::new(Arc::new(InMemoryStore::new()), Duration::from_secs(300));
/// let shutdown = reconciler.shutdown_token();
///
/// let handle = tokio::spawn(async move { reconciler.run().await });
/// shutdown.cancel();
/// let _ = handle.await;
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use teamsync_shared::error::CoreResult;
use teamsync_shared::reconcile::{reconcile, ReconcileReport};
use teamsync_shared::store::Store;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Runs reconciliation passes against a store
pub struct RoleReconciler {
    store: Arc<dyn Store>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl RoleReconciler {
    pub fn new(store: Arc<dyn Store>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`RoleReconciler::run`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// One pass, logged
    pub async fn run_once(&self) -> CoreResult<ReconcileReport> {
        let report = reconcile(self.store.as_ref()).await?;
        if report.is_clean() {
            tracing::debug!("Reconciliation pass clean");
        } else {
            tracing::warn!(
                roles_fixed = report.roles_fixed.len(),
                memberships_fixed = report.memberships_fixed,
                violations = report.violations.len(),
                "Reconciliation repaired drift"
            );
        }
        Ok(report)
    }

    /// Runs passes until shutdown, returning how many completed
    ///
    /// The first pass runs immediately.
    pub async fn run(&self) -> u64 {
        tracing::info!(interval_secs = self.interval.as_secs(), "Role reconciler starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!(passes, "Role reconciler stopped");
                    return passes;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(_) => passes += 1,
                        Err(e) => tracing::error!(error = %e, "Reconciliation pass failed"),
                    }
                }
            }
        }
    }
}
