//! Mock scraper for testing purposes.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{acquisition, Acquired, QueryCriteria, Scraper, ScraperError};
use crate::models::{Paper, PaperBuilder, Quality};

/// A scraper that replays a fixed list of items
#[derive(Debug)]
pub struct MockScraper {
    name: String,
    items: Vec<Result<Paper, ScraperError>>,
    prepare_error: Option<String>,
    prepare_calls: AtomicUsize,
    queries: Mutex<Vec<QueryCriteria>>,
}

impl MockScraper {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            prepare_error: None,
            prepare_calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_paper(mut self, paper: Paper) -> Self {
        self.items.push(Ok(paper));
        self
    }

    pub fn with_error(mut self, error: ScraperError) -> Self {
        self.items.push(Err(error));
        self
    }

    /// Make `prepare` fail with the given message
    pub fn failing_prepare(mut self, message: impl Into<String>) -> Self {
        self.prepare_error = Some(message.into());
        self
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepare_calls.load(Ordering::SeqCst)
    }

    /// Criteria passed to `query`, in call order
    pub fn queries(&self) -> Vec<QueryCriteria> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Scraper for MockScraper {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(&self) -> Result<(), ScraperError> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        match &self.prepare_error {
            Some(message) => Err(ScraperError::Prepare(message.clone())),
            None => Ok(()),
        }
    }

    fn query(&self, criteria: &QueryCriteria) -> BoxStream<'static, Result<Paper, ScraperError>> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(criteria.clone());
        stream::iter(self.items.clone()).boxed()
    }

    fn acquire(&self) -> BoxStream<'static, Result<Acquired, ScraperError>> {
        acquisition(&self.name, stream::iter(self.items.clone()).boxed())
    }
}

/// Helper function to create a scraped paper for testing.
pub fn make_paper(title: &str) -> Paper {
    PaperBuilder::new(title, Quality::scraped()).build()
}
