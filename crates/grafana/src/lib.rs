//! Grafana management API client used by the dashboard loader.
//!
//! Covers the four calls the loader needs: list folders, create folder,
//! upsert dashboard and delete dashboard. Transport failures are retried here;
//! HTTP statuses are handed back to callers for interpretation.

#![forbid(unsafe_code)]

mod client;
mod config;
mod dashboard;
mod folder;
mod transport;

pub use client::{BackendClient, BackendResponse};
pub use config::{BackendConfig, DEFAULT_ADMIN_USER, DEFAULT_GRAFANA_URL};
pub use dashboard::{prepare_dashboard, DashboardUpsertRequest, DeleteOutcome, UpsertOutcome};
pub use folder::FolderId;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};

/// Errors surfaced by the backend layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("dashboard payload is not a JSON object")]
    NotAnObject,
}
