use dashloader_core::CUSTOM_FOLDER_TITLE;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::client::BackendClient;
use crate::transport::Method;

/// Backend folder id. Zero is the General folder in requests and
/// "not resolved" as a lookup result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub i64);

impl FolderId {
    pub const GENERAL: FolderId = FolderId(0);

    pub fn is_resolved(&self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Deserialize)]
struct FolderEntry {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    title: String,
}

impl BackendClient {
    /// Id of the folder titled exactly "Custom", or zero.
    pub async fn find_custom_folder(&self) -> FolderId {
        let resp = self.execute(Method::Get, "/api/folders", None).await;
        let folders: Vec<FolderEntry> = match serde_json::from_slice(resp.body_bytes()) {
            Ok(f) => f,
            Err(e) => {
                error!(status = resp.status, error = %e, "failed to decode folder list");
                return FolderId::default();
            }
        };
        folders
            .into_iter()
            .find(|f| f.title == CUSTOM_FOLDER_TITLE)
            .and_then(|f| f.id)
            .map(FolderId)
            .unwrap_or_default()
    }

    /// Look up the "Custom" folder and create it when missing. Zero on failure.
    pub async fn ensure_custom_folder(&self) -> FolderId {
        let found = self.find_custom_folder().await;
        if found.is_resolved() {
            return found;
        }
        let body = serde_json::json!({ "title": CUSTOM_FOLDER_TITLE }).to_string().into_bytes();
        let resp = self.execute(Method::Post, "/api/folders", Some(body)).await;
        let created: FolderEntry = match serde_json::from_slice(resp.body_bytes()) {
            Ok(f) => f,
            Err(e) => {
                error!(status = resp.status, error = %e, "failed to decode created folder");
                return FolderId::default();
            }
        };
        let id = created.id.map(FolderId).unwrap_or_default();
        if id.is_resolved() {
            info!(folder_id = id.0, "created Custom folder");
        } else {
            error!(status = resp.status, "folder creation returned no id");
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::client_with;

    #[tokio::test]
    async fn finds_custom_folder_by_exact_title() {
        let body = r#"[{"id":3,"title":"custom"},{"id":7,"uid":"x","title":"Custom"}]"#;
        let (client, _t) = client_with(vec![Ok((200, body))], 0);
        assert_eq!(client.find_custom_folder().await, FolderId(7));
    }

    #[tokio::test]
    async fn missing_or_undecodable_folder_list_is_zero() {
        let (client, _t) = client_with(vec![Ok((200, r#"[{"id":1,"title":"Other"}]"#))], 0);
        assert_eq!(client.find_custom_folder().await, FolderId::GENERAL);
        let (client, _t) = client_with(vec![Ok((500, "oops"))], 0);
        assert!(!client.find_custom_folder().await.is_resolved());
        let (client, _t) = client_with(vec![Err(())], 0);
        assert!(!client.find_custom_folder().await.is_resolved());
    }

    #[tokio::test]
    async fn ensure_reuses_existing_folder() {
        let (client, t) = client_with(vec![Ok((200, r#"[{"id":1,"title":"Custom"}]"#))], 0);
        assert_eq!(client.ensure_custom_folder().await, FolderId(1));
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn ensure_creates_missing_folder() {
        let (client, t) = client_with(vec![Ok((200, "[]")), Ok((200, r#"{"id":12,"title":"Custom"}"#))], 0);
        assert_eq!(client.ensure_custom_folder().await, FolderId(12));
        let seen = t.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].method, Method::Post);
        let sent: serde_json::Value = serde_json::from_slice(seen[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, serde_json::json!({ "title": "Custom" }));
    }

    #[tokio::test]
    async fn ensure_reports_zero_when_creation_fails() {
        let (client, _t) = client_with(vec![Ok((200, "[]")), Ok((409, r#"{"message":"conflict"}"#))], 0);
        assert_eq!(client.ensure_custom_folder().await, FolderId::GENERAL);
    }
}
