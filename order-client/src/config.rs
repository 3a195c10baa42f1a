//! Client configuration

use std::time::Duration;

/// Delay between two reconnect attempts of the live subscription
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Safety-net polling interval of the order watcher
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Client configuration for connecting to the order server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:8080")
    pub base_url: String,

    /// Live subscription endpoint, derived from `base_url` by default
    pub ws_url: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Fixed delay before reconnecting a dropped subscription
    pub retry_interval: Duration,

    /// Consecutive failed connection attempts before giving up (`None` = never)
    pub max_attempts: Option<u32>,

    /// Interval of the order list re-fetch, independent of the socket
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let ws_url = ws_url_for(&base_url);
        Self {
            base_url,
            ws_url,
            timeout: 30,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the live subscription endpoint
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

/// `http(s)://host[/]` → `ws(s)://host/api/ws`
fn ws_url_for(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}/api/ws")
}
