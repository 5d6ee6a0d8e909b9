use async_trait::async_trait;
use http::StatusCode;
use http::header::{CACHE_CONTROL, PRAGMA};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

const TOKEN_PATH: &str = "embed-token";

/// Validated credentials handed to the embedding widget.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub token: String,
    pub embed_url: String,
    pub report_id: String,
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("token", &"<redacted>")
            .field("embed_url", &self.embed_url)
            .field("report_id", &self.report_id)
            .finish()
    }
}

impl CredentialBundle {
    /// Builds a bundle from a token response body. Every field must be a
    /// non-empty string or a non-zero number; the first one that is not is
    /// reported.
    pub fn from_response(body: &Value) -> Result<Self, LoadError> {
        let field = |name: &'static str| {
            body.get(name)
                .and_then(field_text)
                .ok_or(LoadError::MissingField(name))
        };
        Ok(Self {
            token: field("embedToken")?,
            embed_url: field("embedUrl")?,
            report_id: field("reportId")?,
        })
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{message}")]
    Transport { message: String },
    #[error("{}", describe_status(.status, .message))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("invalid JSON from /embed-token: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("No {0} returned from /embed-token")]
    MissingField(&'static str),
}

impl LoadError {
    fn transport(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Transport { message }
    }
}

fn describe_status(status: &StatusCode, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("embed-token failed ({})", status.as_u16()),
    }
}

/// Interprets a raw token endpoint response.
pub fn parse_token_response(status: StatusCode, body: &[u8]) -> Result<CredentialBundle, LoadError> {
    if !status.is_success() {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|json| {
                json.get("error")
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            });
        return Err(LoadError::Status { status, message });
    }
    let json: Value = serde_json::from_slice(body)?;
    CredentialBundle::from_response(&json)
}

/// Resolves `{base}/embed-token`, treating the base path as a directory.
pub fn token_endpoint(base: &Url) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(TOKEN_PATH)
}

#[async_trait]
pub trait CredentialLoader: Send + Sync {
    async fn fetch(&self) -> Result<CredentialBundle, LoadError>;
}

/// Single-shot loader against the token endpoint. No retries, no caching.
#[derive(Clone)]
pub struct HttpCredentialLoader {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpCredentialLoader {
    pub fn new(base: &Url) -> anyhow::Result<Self> {
        let endpoint = token_endpoint(base)?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CredentialLoader for HttpCredentialLoader {
    async fn fetch(&self) -> Result<CredentialBundle, LoadError> {
        debug!(endpoint = %self.endpoint, "requesting embed token");
        let resp = self
            .client
            .get(self.endpoint.clone())
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(LoadError::transport)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(LoadError::transport)?;
        parse_token_response(status, &body)
    }
}
