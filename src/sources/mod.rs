//! Source scrapers that normalize external records into the entity model.
//!
//! Each source implements the [`Scraper`] trait on its own; there is no
//! shared base state. Scrapers are looked up through an explicit
//! [`ScraperRegistry`].
//!
//! # Feature Flags
//!
//! - `crossref` - Enable the CrossRef scraper (default: enabled)
//! - `biorxiv` - Enable the bioRxiv scraper (default: enabled)
//! - `pmc` - Enable the PubMed Central scraper (default: enabled)
//!
//! # Refinement
//!
//! [`Refiner`] routes the links of an existing paper to the registered
//! scrapers by priority and merges what they return.
//!
//! # Streams
//!
//! [`Scraper::query`] and [`Scraper::acquire`] return lazy streams. A record
//! that cannot be normalized is yielded as an `Err` and the stream moves on;
//! a failed fetch is yielded as a final `Err`. Dropping a stream early
//! releases everything it holds.

#[cfg(feature = "source-biorxiv")]
mod biorxiv;
#[cfg(feature = "source-crossref")]
mod crossref;
#[cfg(any(feature = "source-biorxiv", feature = "source-pmc"))]
mod jats;
pub mod mock;
#[cfg(feature = "source-pmc")]
mod pmc;
mod refine;
mod registry;

#[cfg(feature = "source-biorxiv")]
pub use biorxiv::BiorxivScraper;
#[cfg(feature = "source-crossref")]
pub use crossref::CrossrefScraper;
pub use mock::MockScraper;
#[cfg(feature = "source-pmc")]
pub use pmc::PmcScraper;
pub use refine::{merge_refined, RefineRoute, Refined, Refiner};
pub use registry::ScraperRegistry;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::models::{Link, MalformedRecordError, Meta, Paper};
use crate::utils::{DateResolutionError, FetchError};

/// What to look up in a single [`Scraper::query`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCriteria {
    pub title: Option<String>,
    pub doi: Option<String>,
    /// PubMed Central identifier
    pub pmc: Option<String>,
}

impl QueryCriteria {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn doi(doi: impl Into<String>) -> Self {
        Self {
            doi: Some(doi.into()),
            ..Self::default()
        }
    }

    pub fn pmc(id: impl Into<String>) -> Self {
        Self {
            pmc: Some(id.into()),
            ..Self::default()
        }
    }

    /// Criteria looking up the target of a `doi` or `pmc` link
    pub fn from_link(link: &Link) -> Option<Self> {
        match link.kind.as_str() {
            "doi" => Some(Self::doi(link.target.as_str())),
            "pmc" => Some(Self::pmc(link.target.as_str())),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.doi.is_none() && self.pmc.is_none()
    }
}

/// Item of an acquisition run: one [`Meta`] marker, then papers
#[derive(Debug, Clone, PartialEq)]
pub enum Acquired {
    Meta(Meta),
    Paper(Paper),
}

impl Acquired {
    pub fn into_paper(self) -> Option<Paper> {
        match self {
            Acquired::Paper(paper) => Some(paper),
            Acquired::Meta(_) => None,
        }
    }
}

/// A source adapter that turns source records into [`Paper`] values.
///
/// # Implementing a New Scraper
///
/// 1. Hold only `Arc`s and plain configuration, so streams can own clones
/// 2. Validate configuration in `prepare`; it must be safe to call twice
/// 3. Yield record-level failures as `Err` items and keep going
/// 4. Register the scraper in [`ScraperRegistry::with_defaults`]
#[async_trait]
pub trait Scraper: Send + Sync + std::fmt::Debug {
    /// Unique name of this scraper (e.g. "crossref")
    fn name(&self) -> &str;

    /// One-time setup before an acquisition run
    async fn prepare(&self) -> Result<(), ScraperError>;

    /// Look up papers matching `criteria`
    fn query(&self, criteria: &QueryCriteria) -> BoxStream<'static, Result<Paper, ScraperError>>;

    /// Run a full ingestion pass using the scraper's configured criteria
    fn acquire(&self) -> BoxStream<'static, Result<Acquired, ScraperError>>;
}

/// Prefix a stream of papers with the run's [`Meta`] marker
pub(crate) fn acquisition(
    scraper: &str,
    papers: BoxStream<'static, Result<Paper, ScraperError>>,
) -> BoxStream<'static, Result<Acquired, ScraperError>> {
    let meta = Acquired::Meta(Meta::now(scraper));
    stream::once(async move { Ok(meta) })
        .chain(papers.map(|item| item.map(Acquired::Paper)))
        .boxed()
}

/// Errors raised by scrapers
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScraperError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed record: {0}")]
    MalformedRecord(#[from] MalformedRecordError),

    #[error("Date resolution failed: {0}")]
    DateResolution(#[from] DateResolutionError),

    /// Setup failed; fatal for an acquisition run
    #[error("Prepare failed: {0}")]
    Prepare(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The scraper cannot serve this kind of lookup
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),
}

impl ScraperError {
    /// Whether only a single record is affected, so the stream continues
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            ScraperError::MalformedRecord(_) | ScraperError::DateResolution(_)
        )
    }
}

impl From<quick_xml::Error> for ScraperError {
    fn from(err: quick_xml::Error) -> Self {
        ScraperError::Fetch(FetchError::Decode(format!("XML: {}", err)))
    }
}

impl From<serde_json::Error> for ScraperError {
    fn from(err: serde_json::Error) -> Self {
        ScraperError::Fetch(FetchError::from(err))
    }
}

/// Validate a configured base URL and return it without a trailing slash
pub(crate) fn validate_base_url(base_url: &str) -> Result<String, ScraperError> {
    let parsed = url::Url::parse(base_url)
        .map_err(|e| ScraperError::Prepare(format!("invalid base URL '{}': {}", base_url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ScraperError::Prepare(format!(
            "unsupported scheme in base URL '{}'",
            base_url
        )));
    }

    Ok(base_url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperBuilder, Quality};

    #[test]
    fn test_record_level_errors() {
        let malformed = ScraperError::from(MalformedRecordError::MissingId);
        let date = ScraperError::from(DateResolutionError::NoCandidate);
        let fetch = ScraperError::from(FetchError::Decode("bad".into()));

        assert!(malformed.is_record_level());
        assert!(date.is_record_level());
        assert!(!fetch.is_record_level());
        assert!(!ScraperError::Prepare("x".into()).is_record_level());
    }

    #[test]
    fn test_validate_base_url() {
        assert_eq!(
            validate_base_url("https://api.crossref.org/").unwrap(),
            "https://api.crossref.org"
        );
        assert!(matches!(
            validate_base_url("not a url"),
            Err(ScraperError::Prepare(_))
        ));
        assert!(validate_base_url("ftp://example.org").is_err());
    }

    #[tokio::test]
    async fn test_acquisition_emits_meta_first() {
        let paper = PaperBuilder::new("A", Quality::scraped()).build();
        let papers = stream::iter(vec![Ok(paper.clone())]).boxed();

        let items: Vec<_> = acquisition("mock", papers).collect().await;

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Ok(Acquired::Meta(m)) if m.scraper == "mock"));
        assert_eq!(items[1].clone().unwrap().into_paper(), Some(paper));
    }

    #[test]
    fn test_query_criteria() {
        assert!(QueryCriteria::default().is_empty());
        assert_eq!(QueryCriteria::doi("10.1/x").doi.as_deref(), Some("10.1/x"));
        assert!(!QueryCriteria::title("x").is_empty());
        assert!(!QueryCriteria::pmc("123").is_empty());
    }

    #[test]
    fn test_criteria_from_link() {
        assert_eq!(
            QueryCriteria::from_link(&Link::new("doi", "10.1/x")),
            Some(QueryCriteria::doi("10.1/x"))
        );
        assert_eq!(
            QueryCriteria::from_link(&Link::new("pmc", "7654321")),
            Some(QueryCriteria::pmc("7654321"))
        );
        assert_eq!(QueryCriteria::from_link(&Link::new("url", "http://x")), None);
    }
}
