//! Page fetching used by source normalizers.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Expected format of a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Html,
    Xml,
}

/// A fetched page, decoded according to the requested [`Format`]
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn into_json(self) -> Result<Value, FetchError> {
        match self {
            Payload::Json(value) => Ok(value),
            Payload::Text(text) => serde_json::from_str(&text).map_err(FetchError::from),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Payload::Json(value) => value.to_string(),
            Payload::Text(text) => text,
        }
    }
}

/// Errors from the fetch layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(format!("JSON: {}", err))
    }
}

/// Capability to retrieve a page. Retry policy, if any, lives behind this trait.
#[async_trait]
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    async fn fetch(&self, url: &str, format: Format) -> Result<Payload, FetchError>;
}

/// [`Fetcher`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Arc<Client>,
}

impl HttpFetcher {
    /// Create a new fetcher with default settings
    pub fn new() -> Result<Self, FetchError> {
        Self::with_user_agent(
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            Duration::from_secs(30),
        )
    }

    /// Create a new fetcher with a custom user agent and request timeout
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, format: Format) -> Result<Payload, FetchError> {
        tracing::debug!(url, ?format, "fetching page");

        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        match format {
            Format::Json => response
                .json::<Value>()
                .await
                .map(Payload::Json)
                .map_err(|e| FetchError::Decode(format!("JSON from {}: {}", url, e))),
            Format::Html | Format::Xml => {
                response.text().await.map(Payload::Text).map_err(transport)
            }
        }
    }
}

/// In-memory [`Fetcher`] serving canned pages keyed by URL.
///
/// Unknown URLs answer with HTTP 404. Every requested URL is recorded.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Result<Payload, FetchError>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, url: impl Into<String>, value: Value) -> Self {
        self.pages.insert(url.into(), Ok(Payload::Json(value)));
        self
    }

    pub fn with_text(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Ok(Payload::Text(text.into())));
        self
    }

    pub fn with_error(mut self, url: impl Into<String>, error: FetchError) -> Self {
        self.pages.insert(url.into(), Err(error));
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str, format: Format) -> Result<Payload, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        match self.pages.get(url) {
            Some(Ok(Payload::Text(text))) if format == Format::Json => {
                serde_json::from_str(text).map(Payload::Json).map_err(FetchError::from)
            }
            Some(page) => page.clone(),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
