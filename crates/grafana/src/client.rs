use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, warn};

use crate::config::BackendConfig;
use crate::transport::{HttpRequest, Method, ReqwestTransport, Transport, TransportError};

/// Status reported when every transport attempt failed.
const EXHAUSTED_STATUS: u16 = 404;

/// Status and body of a completed call. `body` is `None` only when no
/// response was ever received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: Option<Vec<u8>>,
}

impl BackendResponse {
    pub fn exhausted() -> Self {
        Self { status: EXHAUSTED_STATUS, body: None }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or(&[])
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body_bytes())
    }
}

/// Request executor for the Grafana management API.
#[derive(Clone)]
pub struct BackendClient {
    cfg: BackendConfig,
    transport: Arc<dyn Transport>,
}

impl BackendClient {
    pub fn new(cfg: BackendConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(cfg.request_timeout)?;
        Ok(Self::with_transport(cfg, Arc::new(transport)))
    }

    pub fn with_transport(cfg: BackendConfig, transport: Arc<dyn Transport>) -> Self {
        Self { cfg, transport }
    }

    /// Send `method path` with the JSON content type and auth-proxy identity.
    ///
    /// Transport failures are retried after `retry_interval`, at most
    /// `max_retries` times; when they run out the exhausted sentinel (404, no
    /// body) is returned. HTTP error statuses are returned as-is.
    pub async fn execute(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> BackendResponse {
        let req = HttpRequest {
            method,
            url: self.cfg.url(path),
            headers: vec![
                ("Content-Type", "application/json".to_string()),
                ("X-Forwarded-User", self.cfg.admin_user.clone()),
            ],
            body,
        };
        let started = Instant::now();
        counter!("backend_requests_total", 1u64, "method" => method.as_str());
        let mut retries = 0u32;
        loop {
            match self.transport.send(&req).await {
                Ok(resp) => {
                    histogram!("backend_request_ms", started.elapsed().as_secs_f64() * 1000.0);
                    debug!(method = method.as_str(), url = %req.url, status = resp.status, retries, "backend call done");
                    return BackendResponse { status: resp.status, body: Some(resp.body) };
                }
                Err(e) => {
                    if retries >= self.cfg.max_retries {
                        counter!("backend_retries_exhausted_total", 1u64);
                        error!(method = method.as_str(), url = %req.url, retries, error = %e, "giving up on HTTP request");
                        return BackendResponse::exhausted();
                    }
                    retries += 1;
                    counter!("backend_transport_retries_total", 1u64);
                    warn!(
                        method = method.as_str(),
                        url = %req.url,
                        attempt = retries,
                        wait_ms = self.cfg.retry_interval.as_millis() as u64,
                        error = %e,
                        "failed to send HTTP request; retrying"
                    );
                    tokio::time::sleep(self.cfg.retry_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::HttpResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a fixed script of outcomes and records every request it saw.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, ()>>>,
        pub(crate) seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<(u16, &str), ()>>) -> Self {
            let script = script
                .into_iter()
                .map(|r| r.map(|(status, body)| HttpResponse { status, body: body.as_bytes().to_vec() }))
                .collect();
            Self { script: Mutex::new(script), seen: Mutex::new(Vec::new()) }
        }

        pub(crate) fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(req.clone());
            match self.script.lock().unwrap().pop_front() {
                Some(Ok(resp)) => Ok(resp),
                _ => Err(TransportError::Send { method: req.method.as_str(), url: req.url.clone(), reason: "connection refused".into() }),
            }
        }
    }

    pub(crate) fn client_with(script: Vec<Result<(u16, &str), ()>>, max_retries: u32) -> (BackendClient, Arc<ScriptedTransport>) {
        let t = Arc::new(ScriptedTransport::new(script));
        let cfg = BackendConfig::default()
            .with_base_url("http://grafana.test")
            .with_max_retries(max_retries)
            .with_retry_interval(Duration::from_secs(5));
        (BackendClient::with_transport(cfg, t.clone()), t)
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_failures_then_succeeds() {
        let (client, t) = client_with(vec![Err(()), Err(()), Err(()), Ok((200, "[]"))], 10);
        let started = tokio::time::Instant::now();
        let resp = client.execute(Method::Get, "/api/folders", None).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_bytes(), b"[]");
        // three failures -> three retries, four attempts total
        assert_eq!(t.calls(), 4);
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_yield_not_found_sentinel() {
        let (client, t) = client_with(vec![Err(()), Err(()), Err(()), Ok((200, "late"))], 2);
        let resp = client.execute(Method::Delete, "/api/dashboards/uid/x", None).await;
        assert_eq!(resp, BackendResponse::exhausted());
        assert_eq!(resp.status, 404);
        assert!(resp.body.is_none());
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn http_errors_are_not_retried() {
        let (client, t) = client_with(vec![Ok((500, "boom")), Ok((200, "unused"))], 10);
        let resp = client.execute(Method::Post, "/api/folders", Some(b"{}".to_vec())).await;
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body_text(), "boom");
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn attaches_content_type_and_admin_identity() {
        let (client, t) = client_with(vec![Ok((200, ""))], 0);
        client.execute(Method::Get, "/api/folders", None).await;
        let seen = t.seen.lock().unwrap();
        let req = &seen[0];
        assert_eq!(req.url, "http://grafana.test/api/folders");
        assert!(req.headers.contains(&("Content-Type", "application/json".to_string())));
        assert!(req.headers.iter().any(|(k, v)| *k == "X-Forwarded-User" && v == crate::DEFAULT_ADMIN_USER));
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let (client, t) = client_with(vec![Err(())], 0);
        let resp = client.execute(Method::Get, "/api/folders", None).await;
        assert_eq!(resp.status, 404);
        assert_eq!(t.calls(), 1);
    }
}
