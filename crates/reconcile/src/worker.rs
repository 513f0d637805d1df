use std::sync::Arc;

use dashloader_core::RecordEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::Reconciler;

/// Process events one at a time, in arrival order, until `shutdown` flips to
/// true or the channel closes. An event already being handled runs to
/// completion before shutdown is observed.
pub fn spawn_worker(
    reconciler: Arc<Reconciler>,
    mut rx: mpsc::Receiver<RecordEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                maybe = rx.recv() => {
                    match maybe {
                        Some(ev) => {
                            let report = reconciler.reconcile(&ev).await;
                            debug!(kind = ev.kind(), record = %ev.record().key(), ?report, "event reconciled");
                        }
                        None => {
                            debug!("event channel closed");
                            break;
                        }
                    }
                }
            }
        }
        info!("reconcile worker stopped");
    })
}
