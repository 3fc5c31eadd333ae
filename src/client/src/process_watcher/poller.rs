use crate::process_watcher::snapshot::capture_snapshot;
use crate::process_watcher::table::{ProcessTable, TableDelta};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Periodic refresher for the attach view. While active, it requests one
/// snapshot at a time on the blocking pool, merges the result into the shared
/// table and publishes the deltas, then waits the configured delay before the
/// next request. The delay is measured from the completion of a merge, never
/// from a fixed-rate timer, so a slow enumeration can not pile up overlapping
/// requests.
pub struct ProcessPoller {
    table: Arc<RwLock<ProcessTable>>,
    updates: mpsc::UnboundedSender<Vec<TableDelta>>,
    interval: Duration,
    active: Option<CancellationToken>,
}

impl ProcessPoller {
    pub fn new(
        table: Arc<RwLock<ProcessTable>>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Vec<TableDelta>>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let poller = ProcessPoller {
            table,
            updates,
            interval,
            active: None,
        };
        (poller, rx)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Starts or stops polling as the attach view is shown or hidden.
    /// Activating an already active poller is a no-op; deactivating cancels
    /// the pending delay, and an in-flight enumeration has its result
    /// discarded instead of merged.
    pub fn set_active(&mut self, active: bool) {
        match (active, self.active.take()) {
            (true, Some(token)) => {
                self.active = Some(token);
            }
            (true, None) => {
                let token = CancellationToken::new();
                self.active = Some(token.clone());
                debug!("attach view shown, polling every {:?}", self.interval);
                tokio::spawn(poll_loop(
                    self.table.clone(),
                    self.updates.clone(),
                    self.interval,
                    token,
                ));
            }
            (false, Some(token)) => {
                debug!("attach view hidden, polling stopped");
                token.cancel();
            }
            (false, None) => {}
        }
    }
}

impl Drop for ProcessPoller {
    fn drop(&mut self) {
        if let Some(token) = self.active.take() {
            token.cancel();
        }
    }
}

async fn poll_loop(
    table: Arc<RwLock<ProcessTable>>,
    updates: mpsc::UnboundedSender<Vec<TableDelta>>,
    interval: Duration,
    token: CancellationToken,
) {
    loop {
        let snapshot = match capture_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("process enumeration failed: {e:#}");
                break;
            }
        };

        if token.is_cancelled() {
            // the view went away while the enumeration was in flight
            break;
        }

        let deltas = table.write().await.merge(snapshot);
        if !deltas.is_empty() && updates.send(deltas).is_err() {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
