use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::client::{BackendClient, BackendResponse};
use crate::folder::FolderId;
use crate::transport::Method;
use crate::BackendError;

/// Body of `POST /api/dashboards/db`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUpsertRequest<'a> {
    pub folder_id: FolderId,
    pub overwrite: bool,
    pub dashboard: &'a Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Applied,
    /// 412 version-mismatch: the stored version differs; retry with overwrite.
    VersionMismatch,
    /// 412 name-exists: another dashboard already holds the title.
    NameExists,
    Failed(u16),
}

impl UpsertOutcome {
    pub fn from_response(resp: &BackendResponse) -> Self {
        match resp.status {
            200 => UpsertOutcome::Applied,
            412 => {
                let body = resp.body_text();
                if body.contains("version-mismatch") {
                    UpsertOutcome::VersionMismatch
                } else if body.contains("name-exists") {
                    UpsertOutcome::NameExists
                } else {
                    UpsertOutcome::Failed(412)
                }
            }
            other => UpsertOutcome::Failed(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Failed(u16),
}

/// Decode a dashboard document and pin it to `uid`.
///
/// `id` is nulled so the backend matches on uid, not on a numeric id copied
/// from another instance. Every other field passes through untouched.
pub fn prepare_dashboard(raw: &str, uid: &str) -> Result<Map<String, Value>, BackendError> {
    let mut dashboard = match serde_json::from_str::<Value>(raw)? {
        Value::Object(m) => m,
        _ => return Err(BackendError::NotAnObject),
    };
    dashboard.insert("uid".to_string(), Value::String(uid.to_string()));
    dashboard.insert("id".to_string(), Value::Null);
    Ok(dashboard)
}

impl BackendClient {
    /// One create-or-update call; conflict handling is left to the caller.
    pub async fn upsert_dashboard(
        &self,
        folder_id: FolderId,
        dashboard: &Map<String, Value>,
        overwrite: bool,
    ) -> Result<UpsertOutcome, BackendError> {
        let req = DashboardUpsertRequest { folder_id, overwrite, dashboard };
        let body = serde_json::to_vec(&req)?;
        let resp = self.execute(Method::Post, "/api/dashboards/db", Some(body)).await;
        let outcome = UpsertOutcome::from_response(&resp);
        debug!(folder_id = folder_id.0, overwrite, status = resp.status, ?outcome, "dashboard upsert");
        Ok(outcome)
    }

    pub async fn delete_dashboard(&self, uid: &str) -> DeleteOutcome {
        let path = format!("/api/dashboards/uid/{}", uid);
        let resp = self.execute(Method::Delete, &path, None).await;
        if resp.is_ok() {
            info!(uid, "dashboard deleted");
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::Failed(resp.status)
        }
    }
}
