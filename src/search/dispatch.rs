//! Execution of a single query spec against the remote search API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{DispatchConfig, SearchApiConfig};
use crate::models::{QuerySpec, RawRecord, SortOrder};

/// Errors from one remote query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteQueryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited by search API")]
    RateLimited,

    #[error("Search API rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("Search API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Undecodable response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteQueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteQueryError::Decode(err.to_string())
        } else {
            RemoteQueryError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteQueryError {
    fn from(err: serde_json::Error) -> Self {
        RemoteQueryError::Decode(format!("JSON: {}", err))
    }
}

/// Request parameters sent to the search API, in a stable order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams(Vec<(&'static str, String)>);

impl SearchParams {
    fn push(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.push((key, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.0
    }
}

/// Capability to run one query against the search API
#[async_trait]
pub trait SearchApi: Send + Sync + std::fmt::Debug {
    /// Run a query and return the raw JSON records
    async fn search(&self, params: &SearchParams) -> Result<Vec<Value>, RemoteQueryError>;
}

/// [`SearchApi`] over HTTP: `GET {endpoint}/search`
#[derive(Debug, Clone)]
pub struct HttpSearchApi {
    client: Arc<Client>,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSearchApi {
    pub fn new(config: &SearchApiConfig) -> Result<Self, RemoteQueryError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;

        Ok(Self::from_client(Arc::new(client), config))
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>, config: &SearchApiConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl SearchApi for HttpSearchApi {
    async fn search(&self, params: &SearchParams) -> Result<Vec<Value>, RemoteQueryError> {
        let url = format!("{}/search", self.endpoint);

        let mut request = self.client.get(&url).query(params.pairs());
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(RemoteQueryError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(RemoteQueryError::Unauthorized(status.as_u16()))
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteQueryError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Settings shared by every dispatched spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub attrs: Vec<String>,
    pub order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl DispatchOptions {
    pub fn from_config(config: &DispatchConfig, order: SortOrder) -> Self {
        Self {
            attrs: config.attrs.clone(),
            order,
            limit: config.limit,
            offset: config.offset,
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default(), SortOrder::None)
    }
}

/// Turns [`QuerySpec`]s into remote requests. No retries.
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    api: Arc<dyn SearchApi>,
    options: DispatchOptions,
}

impl QueryDispatcher {
    pub fn new(api: Arc<dyn SearchApi>, options: DispatchOptions) -> Self {
        Self { api, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Request parameters for one spec
    pub fn params(&self, spec: &QuerySpec) -> SearchParams {
        let mut params = SearchParams::default();

        if let Some(title) = spec.title() {
            params.push("title", title);
        }
        if let Some(author) = spec.author() {
            let key = if spec.author_is_id() { "author_id" } else { "author" };
            params.push(key, author);
        }
        if let Some(words) = spec.words() {
            params.push("words", words);
        }
        if let Some(keywords) = spec.keywords() {
            params.push("keywords", keywords);
        }
        if let Some(institution) = spec.institution() {
            params.push("institution", institution);
        }
        let daterange = spec.daterange();
        if !daterange.is_unbounded() {
            params.push("daterange", daterange.as_param());
        }
        if !self.options.attrs.is_empty() {
            params.push("attrs", self.options.attrs.join(","));
        }
        params.push("orderby", self.options.order.as_param());
        params.push("count", self.options.limit.to_string());
        params.push("offset", self.options.offset.to_string());

        params
    }

    /// Run one spec. Records without a usable ID are dropped and counted.
    pub async fn dispatch(&self, spec: &QuerySpec) -> Result<SpecBatch, RemoteQueryError> {
        let params = self.params(spec);
        let values = self.api.search(&params).await?;

        let mut batch = SpecBatch::default();
        for value in values {
            match RawRecord::from_value(value) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    tracing::warn!(author = spec.author(), error = %e, "dropping search record");
                    batch.skipped += 1;
                }
            }
        }

        tracing::debug!(
            author = spec.author(),
            kept = batch.records.len(),
            skipped = batch.skipped,
            "dispatched query spec"
        );

        Ok(batch)
    }
}

/// Records returned for one spec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecBatch {
    pub records: Vec<RawRecord>,
    /// Records dropped because they could not be keyed
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchRequest;
    use crate::search::mock::MockSearchApi;
    use crate::search::FanoutBuilder;
    use serde_json::json;

    fn spec(request: &SearchRequest) -> QuerySpec {
        FanoutBuilder::new(request).build().unwrap().remove(0)
    }

    fn options() -> DispatchOptions {
        DispatchOptions {
            attrs: vec!["id".into(), "title".into()],
            order: SortOrder::MostRecentFirst,
            limit: 50,
            offset: 10,
        }
    }

    #[test]
    fn test_params() {
        let request = SearchRequest::new()
            .title("graphs")
            .author("Hopper")
            .year(2020);
        let dispatcher = QueryDispatcher::new(Arc::new(MockSearchApi::new()), options());

        let params = dispatcher.params(&spec(&request));

        assert_eq!(params.get("title"), Some("graphs"));
        assert_eq!(params.get("author"), Some("Hopper"));
        assert_eq!(params.get("author_id"), None);
        assert_eq!(params.get("daterange"), Some("2020-01-01,2020-12-31"));
        assert_eq!(params.get("attrs"), Some("id,title"));
        assert_eq!(params.get("orderby"), Some("date-desc"));
        assert_eq!(params.get("count"), Some("50"));
        assert_eq!(params.get("offset"), Some("10"));
        assert_eq!(params.get("words"), None);
    }

    #[test]
    fn test_numeric_author_is_sent_as_id() {
        let request = SearchRequest::new().author("12345").start("2019");
        let dispatcher = QueryDispatcher::new(Arc::new(MockSearchApi::new()), options());

        let params = dispatcher.params(&spec(&request));

        assert_eq!(params.get("author_id"), Some("12345"));
        assert_eq!(params.get("author"), None);
        assert_eq!(params.get("daterange"), Some("2019-01-01,"));
    }

    #[tokio::test]
    async fn test_dispatch_drops_records_without_id() {
        let api = MockSearchApi::new().with_default(vec![
            json!({"id": "a", "title": "A"}),
            json!({"title": "no id"}),
            json!({"id": 7, "title": "B"}),
        ]);
        let dispatcher = QueryDispatcher::new(Arc::new(api), DispatchOptions::default());

        let batch = dispatcher
            .dispatch(&spec(&SearchRequest::new()))
            .await
            .unwrap();

        let ids: Vec<_> = batch.records.iter().map(RawRecord::id).collect();
        assert_eq!(ids, vec!["a", "7"]);
        assert_eq!(batch.skipped, 1);
    }

    fn api_config(endpoint: String, api_key: Option<&str>) -> SearchApiConfig {
        SearchApiConfig {
            endpoint,
            api_key: api_key.map(String::from),
            ..SearchApiConfig::default()
        }
    }

    #[tokio::test]
    async fn test_http_search_api_sends_key_and_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_header("x-api-key", "secret")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("title".into(), "graphs".into()),
                mockito::Matcher::UrlEncoded("orderby".into(), "none".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": "p1", "title": "Graphs"}]"#)
            .create_async()
            .await;

        let api = HttpSearchApi::new(&api_config(server.url(), Some("secret"))).unwrap();
        let dispatcher = QueryDispatcher::new(Arc::new(api), DispatchOptions::default());

        let batch = dispatcher
            .dispatch(&spec(&SearchRequest::new().title("graphs")))
            .await
            .unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].get_str("title"), Some("Graphs"));
        assert_eq!(batch.skipped, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_search_api_error_mapping() {
        let mut server = mockito::Server::new_async().await;
        let api = HttpSearchApi::new(&api_config(server.url(), None)).unwrap();
        let params = SearchParams::default();

        let limited = server
            .mock("GET", "/search")
            .with_status(429)
            .create_async()
            .await;
        assert_eq!(api.search(&params).await, Err(RemoteQueryError::RateLimited));
        limited.remove_async().await;

        let forbidden = server
            .mock("GET", "/search")
            .with_status(403)
            .create_async()
            .await;
        assert_eq!(api.search(&params).await, Err(RemoteQueryError::Unauthorized(403)));
        forbidden.remove_async().await;

        let _broken = server
            .mock("GET", "/search")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        assert_eq!(
            api.search(&params).await,
            Err(RemoteQueryError::Status {
                status: 500,
                body: "boom".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_http_search_api_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search")
            .with_status(200)
            .with_body(r#"{"not": "an array"}"#)
            .create_async()
            .await;

        let api = HttpSearchApi::new(&api_config(server.url(), None)).unwrap();

        assert!(matches!(
            api.search(&SearchParams::default()).await,
            Err(RemoteQueryError::Decode(_))
        ));
    }
}
