//! Registry for looking up scrapers by name.

use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Acquired, Scraper, ScraperError};
use crate::config::Config;
use crate::utils::Fetcher;

/// Explicit map of scraper name to scraper
#[derive(Debug, Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every scraper compiled into this build
    #[allow(unused_variables, unused_mut)]
    pub fn with_defaults(fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "source-crossref")]
        registry.register(Arc::new(super::CrossrefScraper::new(
            Arc::clone(&fetcher),
            &config.crossref,
        )));

        #[cfg(feature = "source-biorxiv")]
        registry.register(Arc::new(super::BiorxivScraper::new(
            Arc::clone(&fetcher),
            &config.biorxiv,
        )));

        #[cfg(feature = "source-pmc")]
        registry.register(Arc::new(super::PmcScraper::new(
            Arc::clone(&fetcher),
            &config.pmc,
        )));

        registry
    }

    /// Register a scraper, replacing any previous one with the same name
    pub fn register(&mut self, scraper: Arc<dyn Scraper>) {
        self.scrapers.insert(scraper.name().to_string(), scraper);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Scraper>> {
        self.scrapers.get(name)
    }

    /// Get a scraper by name, returning an error if not found
    pub fn get_required(&self, name: &str) -> Result<&Arc<dyn Scraper>, ScraperError> {
        self.get(name)
            .ok_or_else(|| ScraperError::NotFound(format!("Scraper '{}' not found", name)))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scrapers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }

    /// Prepare the named scraper and start its acquisition run.
    ///
    /// A `prepare` failure aborts the run before anything is fetched.
    pub async fn acquire(
        &self,
        name: &str,
    ) -> Result<BoxStream<'static, Result<Acquired, ScraperError>>, ScraperError> {
        let scraper = self.get_required(name)?;
        scraper.prepare().await.map_err(|e| {
            tracing::warn!(scraper = name, error = %e, "prepare failed");
            e
        })?;
        tracing::info!(scraper = name, "starting acquisition");
        Ok(scraper.acquire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockScraper;
    use crate::utils::StaticFetcher;
    use futures_util::StreamExt;

    #[test]
    #[cfg(all(
        feature = "source-crossref",
        feature = "source-biorxiv",
        feature = "source-pmc"
    ))]
    fn test_registry_defaults() {
        let registry =
            ScraperRegistry::with_defaults(Arc::new(StaticFetcher::new()), &Config::default());

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["biorxiv", "crossref", "pmc"]);
        assert_eq!(registry.get("crossref").unwrap().name(), "crossref");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_get_required() {
        let registry = ScraperRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get_required("crossref"),
            Err(ScraperError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_acquire_runs_prepare_first() {
        let mock = Arc::new(MockScraper::new("mock"));
        let mut registry = ScraperRegistry::new();
        registry.register(mock.clone());

        let items: Vec<_> = registry.acquire("mock").await.unwrap().collect().await;

        assert_eq!(mock.prepare_calls(), 1);
        assert!(matches!(&items[..], [Ok(Acquired::Meta(_))]));
    }

    #[tokio::test]
    async fn test_acquire_aborts_on_prepare_failure() {
        let mut registry = ScraperRegistry::new();
        registry.register(Arc::new(
            MockScraper::new("broken").failing_prepare("no credentials"),
        ));

        let result = registry.acquire("broken").await;

        assert!(matches!(result, Err(ScraperError::Prepare(msg)) if msg == "no credentials"));
    }
}
