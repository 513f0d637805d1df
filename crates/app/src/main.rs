use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dashloader_grafana::{BackendClient, BackendConfig, DEFAULT_GRAFANA_URL};
use dashloader_reconcile::{spawn_worker, Reconciler};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "grafana-dashboard-loader", version, about = "Sync labeled ConfigMaps into Grafana dashboards")]
struct Cli {
    /// Namespace whose dashboard ConfigMaps are watched
    #[arg(long = "namespace", env = "POD_NAMESPACE")]
    namespace: String,

    /// Path to a kubeconfig file. If unset, in-cluster configuration will be used
    #[arg(long = "kubeconfig-path")]
    kubeconfig_path: Option<PathBuf>,

    /// Grafana base URL
    #[arg(long = "grafana-url", env = "GRAFANA_URL", default_value = DEFAULT_GRAFANA_URL)]
    grafana_url: String,

    /// Retries after a failed HTTP send
    #[arg(long = "retries", default_value_t = 10)]
    retries: u32,

    /// Seconds between HTTP send retries
    #[arg(long = "retry-interval-secs", default_value_t = 5)]
    retry_interval_secs: u64,

    /// Capacity of the watch -> reconcile queue
    #[arg(long = "queue-cap", default_value_t = 256)]
    queue_cap: usize,
}

impl Cli {
    fn backend_config(&self) -> BackendConfig {
        BackendConfig::default()
            .with_base_url(self.grafana_url.as_str())
            .with_max_retries(self.retries)
            .with_retry_interval(Duration::from_secs(self.retry_interval_secs))
    }
}

fn init_tracing() {
    let env = std::env::var("DASHLOADER_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("DASHLOADER_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid DASHLOADER_METRICS_ADDR; expected host:port");
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                    _ = term.recv() => info!("SIGTERM received"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "cannot listen for SIGTERM; falling back to Ctrl-C only"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
    info!("SIGINT received");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    info!(ns = %cli.namespace, grafana = %cli.grafana_url, retries = cli.retries, "dashboard loader starting");

    let client = dashloader_kubehub::client_from(cli.kubeconfig_path.as_deref()).await?;
    let backend = BackendClient::new(cli.backend_config()).context("building grafana client")?;
    let reconciler = Arc::new(Reconciler::new(backend));

    let (event_tx, event_rx) = mpsc::channel(cli.queue_cap.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = spawn_worker(reconciler, event_rx, shutdown_rx);

    let watcher = tokio::spawn({
        let ns = cli.namespace.clone();
        async move {
            if let Err(e) = dashloader_kubehub::start_watcher(client, &ns, event_tx).await {
                error!(error = ?e, "watcher failed");
            }
        }
    });

    wait_for_signal().await;

    // Stop accepting events, let the in-flight one finish.
    watcher.abort();
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker.await {
        warn!(error = %e, "reconcile worker ended abnormally");
    }
    info!("dashboard loader terminated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_backend_config() {
        let cli = Cli::try_parse_from([
            "grafana-dashboard-loader",
            "--namespace",
            "open-cluster-management-observability",
            "--grafana-url",
            "http://grafana:3000/",
            "--retries",
            "3",
            "--retry-interval-secs",
            "1",
        ])
        .expect("parse");
        let cfg = cli.backend_config();
        assert_eq!(cfg.base_url, "http://grafana:3000");
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_interval, Duration::from_secs(1));
        assert_eq!(cli.queue_cap, 256);
    }
}
