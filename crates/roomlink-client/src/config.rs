use std::time::Duration;

use crate::error::{ClientError, Result};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TYPING_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_HEARTBEAT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash.
    pub api_url: String,
    /// Base URL for room channels; `/ws/{room_id}` is appended.
    pub ws_url: String,
    /// Quiet period after the last keystroke before `typing:false` is sent.
    pub typing_debounce: Duration,
    /// Interval between transport pings on an idle channel.
    pub heartbeat_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_api_url(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    /// Config pointing at `api_url`, with the channel URL derived from it.
    pub fn with_api_url(api_url: &str) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        Self {
            ws_url: derive_ws_url(&api_url),
            api_url,
            typing_debounce: Duration::from_millis(DEFAULT_TYPING_DEBOUNCE_MS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
        }
    }

    /// Read `ROOMLINK_*` variables. Call `dotenvy::dotenv()` first to pick up
    /// a `.env` file.
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("ROOMLINK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let mut config = Self::with_api_url(&api_url);

        if let Ok(ws_url) = std::env::var("ROOMLINK_WS_URL") {
            config.ws_url = ws_url.trim_end_matches('/').to_string();
        }
        if let Ok(raw) = std::env::var("ROOMLINK_TYPING_DEBOUNCE_MS") {
            config.typing_debounce = Duration::from_millis(parse_number("ROOMLINK_TYPING_DEBOUNCE_MS", &raw)?);
        }
        if let Ok(raw) = std::env::var("ROOMLINK_HEARTBEAT_SECS") {
            config.heartbeat_interval = Duration::from_secs(parse_number("ROOMLINK_HEARTBEAT_SECS", &raw)?);
        }

        Ok(config)
    }
}

fn parse_number(var: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ClientError::Config(format!(
            "{var} must be a positive integer, got '{raw}'"
        ))),
        Ok(n) => Ok(n),
    }
}

fn derive_ws_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_follows_api_scheme() {
        assert_eq!(ClientConfig::with_api_url("http://chat.local:8000/").ws_url, "ws://chat.local:8000");
        assert_eq!(ClientConfig::with_api_url("https://chat.example").ws_url, "wss://chat.example");
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(parse_number("X", "0").is_err());
        assert!(parse_number("X", "fast").is_err());
        assert_eq!(parse_number("X", " 250 ").unwrap(), 250);
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.typing_debounce, Duration::from_millis(1000));
    }
}
