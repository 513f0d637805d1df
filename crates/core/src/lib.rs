//! Dashboard loader core types: observed records, change events, identity and change detection.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

mod identity;

pub use identity::{derive_identity, MAX_VERBATIM_UID_LEN};

/// Label selector used to list and watch dashboard ConfigMaps.
pub const DASHBOARD_SELECTOR: &str = "grafana-custom-dashboard=true";
/// Label that places a record's dashboards in the backend's General folder.
pub const GENERAL_FOLDER_LABEL: &str = "general-folder";
/// Title of the folder the loader owns in the backend.
pub const CUSTOM_FOLDER_TITLE: &str = "Custom";

/// A labeled ConfigMap as seen by the loader. Observed, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRecord {
    pub name: String,
    pub namespace: String,
    /// Dashboard JSON documents keyed by ConfigMap data key.
    pub data: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

impl ConfigRecord {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into(), ..Default::default() }
    }

    pub fn with_entry(mut self, key: impl Into<String>, dashboard: impl Into<String>) -> Self {
        self.data.insert(key.into(), dashboard.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// `general-folder` present and equal to "true" ignoring case.
    pub fn uses_general_folder(&self) -> bool {
        self.labels
            .get(GENERAL_FOLDER_LABEL)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Backend UID shared by upsert and delete.
    ///
    /// Name goes first: dashboards already stored in the backend were keyed
    /// as `<name>-<namespace>`, and a different order would orphan them.
    pub fn dashboard_uid(&self) -> String {
        derive_identity(&self.name, &self.namespace)
    }

    /// `namespace/name`, for logs.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A change observed on the watched record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    Added(ConfigRecord),
    Updated { old: ConfigRecord, new: ConfigRecord },
    Deleted(ConfigRecord),
}

impl RecordEvent {
    pub fn record(&self) -> &ConfigRecord {
        match self {
            RecordEvent::Added(r) | RecordEvent::Deleted(r) => r,
            RecordEvent::Updated { new, .. } => new,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecordEvent::Added(_) => "added",
            RecordEvent::Updated { .. } => "updated",
            RecordEvent::Deleted(_) => "deleted",
        }
    }
}

/// Whether an update carries new dashboard content.
///
/// Only `data` is compared. Label and metadata changes (including toggling
/// `general-folder`) are not significant.
pub fn is_significant(old: &ConfigRecord, new: &ConfigRecord) -> bool {
    old.data != new.data
}

pub mod prelude {
    pub use super::{
        derive_identity, is_significant, ConfigRecord, RecordEvent, CUSTOM_FOLDER_TITLE, DASHBOARD_SELECTOR,
        GENERAL_FOLDER_LABEL,
    };
}
