//! Mock search API for testing purposes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::dispatch::{RemoteQueryError, SearchApi, SearchParams};

/// A search API that answers from canned responses keyed by the author
/// filter (`author` or `author_id`).
#[derive(Debug, Default)]
pub struct MockSearchApi {
    responses: HashMap<String, Result<Vec<Value>, RemoteQueryError>>,
    default: Vec<Value>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<SearchParams>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockSearchApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records returned when no author-specific response matches
    pub fn with_default(mut self, records: Vec<Value>) -> Self {
        self.default = records;
        self
    }

    pub fn with_response(mut self, author: impl Into<String>, records: Vec<Value>) -> Self {
        self.responses.insert(author.into(), Ok(records));
        self
    }

    pub fn with_failure(mut self, author: impl Into<String>, error: RemoteQueryError) -> Self {
        self.responses.insert(author.into(), Err(error));
        self
    }

    /// Delay the answer for one author
    pub fn with_delay(mut self, author: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(author.into(), delay);
        self
    }

    /// Parameters of every call, in arrival order
    pub fn calls(&self) -> Vec<SearchParams> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Highest number of concurrent calls observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SearchApi for MockSearchApi {
    async fn search(&self, params: &SearchParams) -> Result<Vec<Value>, RemoteQueryError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(current, Ordering::SeqCst);

        let author = params
            .get("author")
            .or_else(|| params.get("author_id"))
            .unwrap_or_default();

        // yield so sibling calls can overlap
        match self.delays.get(author) {
            Some(delay) => tokio::time::sleep(*delay).await,
            None => tokio::task::yield_now().await,
        }

        self.responses
            .get(author)
            .cloned()
            .unwrap_or_else(|| Ok(self.default.clone()))
    }
}
