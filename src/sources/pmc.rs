//! PubMed Central scraper.
//!
//! Fetches front matter through the PMC OAI-PMH service (`GetRecord` with
//! the `pmc_fm` metadata prefix) and maps the embedded JATS article.

use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

use super::jats;
use super::{acquisition, validate_base_url, Acquired, QueryCriteria, Scraper, ScraperError};
use crate::config::PmcConfig;
use crate::models::{Link, Paper};
use crate::utils::{FetchError, Fetcher, Format, Payload};

/// PubMed Central scraper
#[derive(Debug, Clone)]
pub struct PmcScraper {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
    acquisition_ids: Arc<Vec<String>>,
}

impl PmcScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &PmcConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            acquisition_ids: Arc::new(config.ids.clone()),
        }
    }

    fn record_url(&self, id: &str) -> String {
        format!(
            "{}?verb=GetRecord&identifier=oai:pubmedcentral.nih.gov:{}&metadataPrefix=pmc_fm",
            self.base_url, id
        )
    }

    fn lookup(&self, ids: Vec<String>) -> BoxStream<'static, Result<Paper, ScraperError>> {
        let fetcher = Arc::clone(&self.fetcher);
        let requests: Vec<(String, String)> = ids
            .iter()
            .map(|id| normalize_id(id).to_string())
            .map(|id| (self.record_url(&id), id))
            .collect();

        stream! {
            for (url, id) in requests {
                match fetch_paper(fetcher.as_ref(), &url, &id).await {
                    Ok(paper) => {
                        yield Ok(paper);
                    }
                    Err(e) if e.is_record_level() || matches!(e, ScraperError::NotFound(_)) => {
                        yield Err(e);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
        .boxed()
    }
}

/// Numeric part of a PMC identifier; `PMC123` and `123` name the same record
fn normalize_id(id: &str) -> &str {
    let id = id.trim();
    id.strip_prefix("PMC").unwrap_or(id)
}

fn is_valid_id(id: &str) -> bool {
    let id = normalize_id(id);
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

#[async_trait]
impl Scraper for PmcScraper {
    fn name(&self) -> &str {
        "pmc"
    }

    async fn prepare(&self) -> Result<(), ScraperError> {
        validate_base_url(&self.base_url)?;
        if let Some(id) = self.acquisition_ids.iter().find(|id| !is_valid_id(id)) {
            return Err(ScraperError::Prepare(format!(
                "'{}' is not a PMC identifier",
                id
            )));
        }
        tracing::debug!(scraper = "pmc", ids = self.acquisition_ids.len(), "prepared");
        Ok(())
    }

    fn query(&self, criteria: &QueryCriteria) -> BoxStream<'static, Result<Paper, ScraperError>> {
        let invalid = |reason: String| -> BoxStream<'static, Result<Paper, ScraperError>> {
            stream::once(async move { Err(ScraperError::InvalidCriteria(reason)) }).boxed()
        };

        match &criteria.pmc {
            Some(id) if is_valid_id(id) => self.lookup(vec![id.clone()]),
            Some(id) => invalid(format!("'{}' is not a PMC identifier", id)),
            None => invalid("pmc only supports PMC identifier lookup".to_string()),
        }
    }

    fn acquire(&self) -> BoxStream<'static, Result<Acquired, ScraperError>> {
        let ids = self.acquisition_ids.as_ref().clone();
        acquisition(self.name(), self.lookup(ids))
    }
}

async fn fetch_paper(fetcher: &dyn Fetcher, url: &str, id: &str) -> Result<Paper, ScraperError> {
    tracing::debug!(scraper = "pmc", id, "fetching OAI record");

    let xml = match fetcher.fetch(url, Format::Xml).await {
        Ok(payload) => payload.into_text(),
        Err(FetchError::Status { status: 404, .. }) => {
            return Err(ScraperError::NotFound(id.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let root = jats::parse(&xml)?;

    if let Some(error) = root.find("error") {
        return match error.attr("code") {
            Some("idDoesNotExist") => Err(ScraperError::NotFound(id.to_string())),
            code => Err(FetchError::Decode(format!(
                "OAI error {}: {}",
                code.unwrap_or("unknown"),
                error.text()
            ))
            .into()),
        };
    }

    let article = root
        .find("article")
        .ok_or_else(|| ScraperError::NotFound(id.to_string()))?;

    let mut links = vec![Link::new("pmc", id)];
    if let Some(doi) = article.find_with("article-id", "pub-id-type", "doi") {
        links.push(Link::new("doi", doi.text()));
    }

    jats::paper_from_article(article, id, links)
}
