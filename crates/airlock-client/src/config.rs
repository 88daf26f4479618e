//! Client configuration.

use std::time::Duration;

/// Default launcher origin: the local daemon on its conventional port.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8100";

/// Connection configuration for the launcher client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base origin of the launcher (e.g. `http://localhost:8100`).
    pub base_url: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Config pointing at a specific launcher origin.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}
