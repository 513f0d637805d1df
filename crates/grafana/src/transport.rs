use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// A fully built request; cloned freely across retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Failure to obtain any HTTP response (connect, DNS, timeout).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("building http client: {0}")]
    Build(String),
    #[error("sending {method} {url}: {reason}")]
    Send { method: &'static str, url: String, reason: String },
}

/// Sends one request and returns whatever status came back.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &req.url);
        for (k, v) in req.headers.iter() {
            builder = builder.header(*k, v.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        let resp = builder.send().await.map_err(|e| TransportError::Send {
            method: req.method.as_str(),
            url: req.url.clone(),
            reason: e.to_string(),
        })?;
        let status = resp.status().as_u16();
        // Consuming the body releases the connection on both paths.
        let body = match resp.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                warn!(url = %req.url, status, error = %e, "failed to read response body");
                Vec::new()
            }
        };
        Ok(HttpResponse { status, body })
    }
}
