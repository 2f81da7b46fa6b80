use std::env;
use std::time::Duration;

/// Where the bridge server lives and how long a request may wait for its
/// response.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9001,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = env::var("BADGE_BRIDGE_SERVER_HOST").unwrap_or(defaults.host);
        let port = env::var("BADGE_BRIDGE_SERVER_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(defaults.port);
        let request_timeout = env::var("BADGE_BRIDGE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        Self {
            host,
            port,
            request_timeout,
        }
    }
}
