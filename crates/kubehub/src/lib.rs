//! Dashboard loader kubehub: ConfigMap list+watch wiring.
//!
//! The kube watcher reports `Applied`/`Deleted`/`Restarted`. The loader needs
//! informer-style add/update/delete with the previous object on updates, so a
//! small cache keyed by `namespace/name` sits between the two.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use dashloader_core::{ConfigRecord, RecordEvent, DASHBOARD_SELECTOR};
use futures::TryStreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::Api,
    config::{KubeConfigOptions, Kubeconfig},
    runtime::{
        watcher::{self, Event},
        WatchStreamExt,
    },
    Client, Config,
};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Build a client from an explicit kubeconfig, or from the default chain
/// (in-cluster service account, then `$KUBECONFIG`).
pub async fn client_from(kubeconfig: Option<&Path>) -> Result<Client> {
    match kubeconfig {
        Some(path) => {
            let kc = Kubeconfig::read_from(path).with_context(|| format!("reading kubeconfig {}", path.display()))?;
            let cfg = Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                .await
                .context("loading kubeconfig")?;
            Client::try_from(cfg).context("building kube client")
        }
        None => Client::try_default().await.context("building default kube client"),
    }
}

pub fn record_from_configmap(cm: &ConfigMap) -> ConfigRecord {
    ConfigRecord {
        name: cm.metadata.name.clone().unwrap_or_default(),
        namespace: cm.metadata.namespace.clone().unwrap_or_default(),
        data: cm.data.clone().unwrap_or_default(),
        labels: cm.metadata.labels.clone().unwrap_or_default(),
    }
}

/// Last seen state of every watched record.
#[derive(Debug, Default)]
pub struct RecordCache {
    known: HashMap<String, ConfigRecord>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn applied(&mut self, rec: ConfigRecord) -> RecordEvent {
        match self.known.insert(rec.key(), rec.clone()) {
            Some(old) => RecordEvent::Updated { old, new: rec },
            None => RecordEvent::Added(rec),
        }
    }

    pub fn deleted(&mut self, rec: ConfigRecord) -> RecordEvent {
        // Prefer the object carried by the delete notification; the cache
        // entry only matters for its removal.
        self.known.remove(&rec.key());
        RecordEvent::Deleted(rec)
    }

    /// Reconcile the cache against a full relist.
    ///
    /// Listed records come out as adds or updates in list order; cached
    /// records absent from the list come out as deletes, sorted by key.
    pub fn restarted(&mut self, list: Vec<ConfigRecord>) -> Vec<RecordEvent> {
        let mut stale: HashMap<String, ConfigRecord> = std::mem::take(&mut self.known);
        let mut out = Vec::with_capacity(list.len());
        for rec in list {
            let key = rec.key();
            let ev = match stale.remove(&key) {
                Some(old) => RecordEvent::Updated { old, new: rec.clone() },
                None => RecordEvent::Added(rec.clone()),
            };
            self.known.insert(key, rec);
            out.push(ev);
        }
        let mut gone: Vec<_> = stale.into_iter().collect();
        gone.sort_by(|a, b| a.0.cmp(&b.0));
        out.extend(gone.into_iter().map(|(_, rec)| RecordEvent::Deleted(rec)));
        out
    }

    pub fn classify(&mut self, ev: Event<ConfigMap>) -> Vec<RecordEvent> {
        match ev {
            Event::Applied(cm) => vec![self.applied(record_from_configmap(&cm))],
            Event::Deleted(cm) => vec![self.deleted(record_from_configmap(&cm))],
            Event::Restarted(list) => {
                debug!(count = list.len(), "watch restart");
                self.restarted(list.iter().map(record_from_configmap).collect())
            }
        }
    }
}

/// List+watch dashboard ConfigMaps in `namespace` and send classified events
/// into `tx` in stream order. Returns when the stream ends or `tx` closes.
pub async fn start_watcher(client: Client, namespace: &str, tx: mpsc::Sender<RecordEvent>) -> Result<()> {
    let api: Api<ConfigMap> = Api::namespaced(client, namespace);
    let cfg = watcher::Config::default().labels(DASHBOARD_SELECTOR);
    let stream = watcher::watcher(api, cfg).default_backoff();
    futures::pin_mut!(stream);
    let mut cache = RecordCache::new();
    info!(ns = %namespace, selector = DASHBOARD_SELECTOR, "watcher started");
    loop {
        let ev = match stream.try_next().await {
            Ok(Some(ev)) => ev,
            Ok(None) => break,
            Err(e) => {
                counter!("watch_errors_total", 1u64);
                warn!(error = %e, "watch error; backing off");
                continue;
            }
        };
        for rev in cache.classify(ev) {
            counter!("watch_events_total", 1u64, "kind" => rev.kind());
            if tx.send(rev).await.is_err() {
                info!("event channel closed; stopping watcher");
                return Ok(());
            }
        }
    }
    warn!("watcher stream ended");
    Ok(())
}
