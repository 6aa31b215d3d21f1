//! Endpoint configuration.

/// Default REST base URL for a local deployment.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default WebSocket endpoint for a local deployment.
pub const DEFAULT_WS_URL: &str = "ws://localhost:50054/ws";

/// Base URLs for the REST gateway and the WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub ws_url: String,
}

impl Config {
    /// Reads `PALAVER_API_URL` and `PALAVER_WS_URL` from the environment,
    /// falling back to the local defaults.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("PALAVER_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            ws_url: std::env::var("PALAVER_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
        }
    }
}
