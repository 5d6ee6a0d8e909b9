use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

const DEFAULT_POWERBI_CLIENT_URL: &str =
    "https://cdn.jsdelivr.net/npm/powerbi-client@2.23.1/dist/powerbi.min.js";

/// Runtime configuration for the embed server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Origin (and optional path prefix) hosting `GET /embed-token`.
    pub token_base_url: Url,
    pub powerbi_client_url: String,
    pub enable_cors: bool,
    /// Idle time before a page that never sent its unmount beacon is dropped.
    pub page_ttl: Duration,
    /// Same, for pages showing the widget; kept long enough for token expiry
    /// errors to arrive.
    pub ready_page_ttl: Duration,
    pub view_poll_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr: SocketAddr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let token_base_url: Url = var("EMBED_TOKEN_BASE")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .parse()
            .context("failed to parse EMBED_TOKEN_BASE")?;

        let powerbi_client_url = var("POWERBI_CLIENT_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_POWERBI_CLIENT_URL.to_string());

        let enable_cors = var("ENABLE_CORS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let page_ttl = var("PAGE_TTL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));
        let ready_page_ttl = var("READY_PAGE_TTL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(86_400));
        let view_poll_interval = var("VIEW_POLL_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(250));

        Ok(Self {
            bind_addr,
            token_base_url,
            powerbi_client_url,
            enable_cors,
            page_ttl,
            ready_page_ttl,
            view_poll_interval,
        })
    }
}
