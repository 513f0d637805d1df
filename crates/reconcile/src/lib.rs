//! Dashboard loader reconciler.
//!
//! Turns record events into Grafana calls: folder resolution, dashboard
//! upsert with a single overwrite retry on version conflicts, and delete.
//! Nothing here is fatal; failures are logged per dashboard and counted in
//! the returned [`SyncReport`].

#![forbid(unsafe_code)]

mod worker;

pub use worker::spawn_worker;

use dashloader_core::{is_significant, ConfigRecord, RecordEvent};
use dashloader_grafana::{prepare_dashboard, BackendClient, DeleteOutcome, FolderId, UpsertOutcome};
use metrics::counter;
use tracing::{debug, error, info, warn};

/// Upsert attempts per dashboard: the first with `overwrite=false`, one more
/// with `overwrite=true` after a version mismatch.
const MAX_UPSERT_ATTEMPTS: usize = 2;

/// Per-event tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Dashboards created/updated (200).
    pub applied: usize,
    /// Dashboards left alone: name-exists conflicts, or insignificant updates.
    pub skipped: usize,
    pub failed: usize,
    pub deleted: usize,
}

/// How a single dashboard entry ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryResult {
    Applied,
    Skipped,
    Failed,
}

pub struct Reconciler {
    backend: BackendClient,
}

impl Reconciler {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    pub async fn reconcile(&self, event: &RecordEvent) -> SyncReport {
        counter!("reconcile_events_total", 1u64, "kind" => event.kind());
        match event {
            RecordEvent::Added(rec) => {
                info!(name = %rec.name, ns = %rec.namespace, "new dashboard record created");
                self.sync_record(rec).await
            }
            RecordEvent::Updated { old, new } => {
                if !is_significant(old, new) {
                    debug!(name = %new.name, ns = %new.namespace, "record updated without data change; ignoring");
                    return SyncReport { skipped: 1, ..Default::default() };
                }
                info!(name = %new.name, ns = %new.namespace, "dashboard record updated");
                self.sync_record(new).await
            }
            RecordEvent::Deleted(rec) => {
                info!(name = %rec.name, ns = %rec.namespace, "dashboard record deleted");
                self.delete_record(rec).await
            }
        }
    }

    /// Push every dashboard in `rec` to the backend. Entries are independent:
    /// one failing never stops the next.
    pub async fn sync_record(&self, rec: &ConfigRecord) -> SyncReport {
        let mut report = SyncReport::default();
        for (key, raw) in rec.data.iter() {
            match self.sync_entry(rec, key, raw).await {
                EntryResult::Applied => report.applied += 1,
                EntryResult::Skipped => report.skipped += 1,
                EntryResult::Failed => report.failed += 1,
            }
        }
        counter!("dashboards_applied_total", report.applied as u64);
        counter!("dashboards_failed_total", report.failed as u64);
        report
    }

    async fn sync_entry(&self, rec: &ConfigRecord, key: &str, raw: &str) -> EntryResult {
        let folder_id = if rec.uses_general_folder() {
            FolderId::GENERAL
        } else {
            let id = self.backend.ensure_custom_folder().await;
            if !id.is_resolved() {
                error!(name = %rec.name, ns = %rec.namespace, key, "failed to get custom folder id");
                return EntryResult::Failed;
            }
            id
        };

        let uid = rec.dashboard_uid();
        let dashboard = match prepare_dashboard(raw, &uid) {
            Ok(d) => d,
            Err(e) => {
                error!(name = %rec.name, ns = %rec.namespace, key, error = %e, "failed to decode dashboard");
                return EntryResult::Failed;
            }
        };

        let mut overwrite = false;
        for attempt in 1..=MAX_UPSERT_ATTEMPTS {
            let outcome = match self.backend.upsert_dashboard(folder_id, &dashboard, overwrite).await {
                Ok(o) => o,
                Err(e) => {
                    error!(name = %rec.name, ns = %rec.namespace, key, error = %e, "failed to encode upsert request");
                    return EntryResult::Failed;
                }
            };
            match outcome {
                UpsertOutcome::Applied => {
                    info!(name = %rec.name, ns = %rec.namespace, key, uid = %uid, overwrite, "dashboard created/updated");
                    return EntryResult::Applied;
                }
                UpsertOutcome::NameExists => {
                    info!(name = %rec.name, ns = %rec.namespace, key, "the dashboard name already existed");
                    return EntryResult::Skipped;
                }
                UpsertOutcome::VersionMismatch if attempt < MAX_UPSERT_ATTEMPTS => {
                    warn!(name = %rec.name, ns = %rec.namespace, key, "dashboard version mismatch; retrying with overwrite");
                    overwrite = true;
                }
                UpsertOutcome::VersionMismatch => {
                    error!(name = %rec.name, ns = %rec.namespace, key, status = 412, "version mismatch persisted after overwrite");
                    return EntryResult::Failed;
                }
                UpsertOutcome::Failed(status) => {
                    error!(name = %rec.name, ns = %rec.namespace, key, status, "failed to create/update dashboard");
                    return EntryResult::Failed;
                }
            }
        }
        EntryResult::Failed
    }

    /// Remove the record's dashboard by uid.
    ///
    /// Only one uid exists per record, so a record that carried several
    /// dashboards still results in a single delete call.
    pub async fn delete_record(&self, rec: &ConfigRecord) -> SyncReport {
        let uid = rec.dashboard_uid();
        match self.backend.delete_dashboard(&uid).await {
            DeleteOutcome::Deleted => {
                counter!("dashboards_deleted_total", 1u64);
                SyncReport { deleted: 1, ..Default::default() }
            }
            DeleteOutcome::Failed(status) => {
                error!(name = %rec.name, ns = %rec.namespace, uid = %uid, status, "failed to delete dashboard");
                SyncReport { failed: 1, ..Default::default() }
            }
        }
    }
}
