//! Remote GNS3 API access.
//!
//! Everything above this module talks to the server through the [`Api`]
//! trait, which reduces every call to "bytes with a status, or an error".
//! [`HttpClient`] is the production implementation; tests swap in fakes.

use crate::config::ClientConfig;
use crate::error::ConfigError;
use base64::Engine as _;
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Which timeout budget a request falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Api,
    Document,
    Symbol,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Fetched {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

pub trait Api: Send + Sync {
    /// Server root every API path is resolved against.
    fn base_url(&self) -> &Url;

    /// Absolute URL for an API path given as raw segments, e.g.
    /// `["v2", "projects", id]`. Each segment is percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url().clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }

    fn get(&self, url: &str, kind: RequestKind) -> Result<Fetched, ApiError>;

    fn post(&self, url: &str) -> Result<Fetched, ApiError>;

    /// GET an API path and decode it as JSON. Any failure becomes `None`.
    fn get_json(&self, segments: &[&str]) -> Option<Value> {
        let url = self.url(segments);
        let result = self
            .get(&url, RequestKind::Api)
            .and_then(|res| {
                if res.is_success() {
                    res.json()
                } else {
                    Err(ApiError::Status(res.status))
                }
            });
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(url, error = %err, "API GET failed");
                None
            }
        }
    }

    /// POST to an API path. A `204 No Content` reply decodes as `{}`.
    fn post_json(&self, segments: &[&str]) -> Option<Value> {
        let url = self.url(segments);
        let result = self.post(&url).and_then(|res| {
            if !res.is_success() {
                Err(ApiError::Status(res.status))
            } else if res.status == 204 || res.body.is_empty() {
                Ok(Value::Object(Default::default()))
            } else {
                res.json()
            }
        });
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(url, error = %err, "API POST failed");
                None
            }
        }
    }
}

/// Blocking HTTP client backed by a pooled `ureq` agent.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    base: Url,
    config: ClientConfig,
    authorization: Option<String>,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.server_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base() && matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| ConfigError::ServerUrl(config.server_url.clone()))?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.api_timeout))
            .http_status_as_error(false)
            .build()
            .into();
        let authorization = config.credentials().map(|(user, pass)| {
            let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
            format!("Basic {token}")
        });
        Ok(Self {
            agent,
            base,
            config,
            authorization,
        })
    }

    fn timeout(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Api => self.config.api_timeout,
            RequestKind::Document => self.config.file_timeout,
            RequestKind::Symbol => self.config.symbol_timeout,
            RequestKind::Fallback => self.config.fallback_timeout,
        }
    }

    fn authorize<B>(&self, url: &str, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        // Credentials belong to the GNS3 server only, never to fallback hosts.
        match &self.authorization {
            Some(value) if url.starts_with(self.base.as_str()) => {
                request.header("Authorization", value)
            }
            _ => request,
        }
    }
}

impl Api for HttpClient {
    fn base_url(&self) -> &Url {
        &self.base
    }

    fn get(&self, url: &str, kind: RequestKind) -> Result<Fetched, ApiError> {
        let request = self
            .agent
            .get(url)
            .config()
            .timeout_global(Some(self.timeout(kind)))
            .build();
        let mut response = self
            .authorize(url, request)
            .call()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Fetched { status, body })
    }

    fn post(&self, url: &str) -> Result<Fetched, ApiError> {
        let mut response = self
            .authorize(url, self.agent.post(url))
            .send_empty()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Fetched { status, body })
    }
}
