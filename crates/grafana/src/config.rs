use std::time::Duration;

/// Grafana listens on loopback next to the loader (auth-proxy sidecar mode).
pub const DEFAULT_GRAFANA_URL: &str = "http://127.0.0.1:3001";

/// Identity sent in `X-Forwarded-User`; Grafana's auth proxy maps it to the admin user.
pub const DEFAULT_ADMIN_USER: &str =
    "WHAT_YOU_ARE_DOING_IS_VOIDING_SUPPORT_0000000000000000000000000000000000000000000000000000000000000000";

/// Connection settings for the Grafana backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    /// Retries after a transport failure (the first attempt is not counted).
    /// The default of 10 therefore allows up to 11 sends in total.
    pub max_retries: u32,
    /// Fixed pause between transport retries.
    pub retry_interval: Duration,
    pub request_timeout: Duration,
    pub admin_user: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GRAFANA_URL.to_string(),
            max_retries: 10,
            retry_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            admin_user: DEFAULT_ADMIN_USER.to_string(),
        }
    }
}

impl BackendConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_retry_interval(mut self, d: Duration) -> Self {
        self.retry_interval = d;
        self
    }

    pub fn with_request_timeout(mut self, d: Duration) -> Self {
        self.request_timeout = d;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
