//! bioRxiv scraper.
//!
//! Looks a DOI up through the bioRxiv details API, then fetches and parses
//! the JATS XML the details point at.

use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use super::jats;
use super::{acquisition, validate_base_url, Acquired, QueryCriteria, Scraper, ScraperError};
use crate::config::BiorxivConfig;
use crate::models::{Link, Paper};
use crate::utils::{FetchError, Fetcher, Format, Payload};

/// DOI prefix shared by every bioRxiv preprint
const BIORXIV_DOI_PREFIX: &str = "10.1101/";

/// bioRxiv scraper
#[derive(Debug, Clone)]
pub struct BiorxivScraper {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
    acquisition_dois: Arc<Vec<String>>,
}

impl BiorxivScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &BiorxivConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            acquisition_dois: Arc::new(config.dois.clone()),
        }
    }

    fn details_url(&self, doi: &str) -> String {
        format!("{}/details/biorxiv/{}", self.base_url, doi)
    }

    fn lookup(&self, dois: Vec<String>) -> BoxStream<'static, Result<Paper, ScraperError>> {
        let fetcher = Arc::clone(&self.fetcher);
        let urls: Vec<(String, String)> = dois
            .into_iter()
            .map(|doi| (self.details_url(&doi), doi))
            .collect();

        stream! {
            for (url, doi) in urls {
                match fetch_paper(fetcher.as_ref(), &url, &doi).await {
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

#[async_trait]
impl Scraper for BiorxivScraper {
    fn name(&self) -> &str {
        "biorxiv"
    }

    async fn prepare(&self) -> Result<(), ScraperError> {
        validate_base_url(&self.base_url)?;
        if let Some(doi) = self
            .acquisition_dois
            .iter()
            .find(|doi| !doi.starts_with(BIORXIV_DOI_PREFIX))
        {
            return Err(ScraperError::Prepare(format!(
                "'{}' is not a bioRxiv DOI",
                doi
            )));
        }
        tracing::debug!(scraper = "biorxiv", dois = self.acquisition_dois.len(), "prepared");
        Ok(())
    }

    fn query(&self, criteria: &QueryCriteria) -> BoxStream<'static, Result<Paper, ScraperError>> {
        let invalid = |reason: String| -> BoxStream<'static, Result<Paper, ScraperError>> {
            stream::once(async move { Err(ScraperError::InvalidCriteria(reason)) }).boxed()
        };

        match &criteria.doi {
            Some(doi) if doi.starts_with(BIORXIV_DOI_PREFIX) => self.lookup(vec![doi.clone()]),
            Some(doi) => invalid(format!("'{}' is not a bioRxiv DOI", doi)),
            None => invalid("biorxiv only supports DOI lookup".to_string()),
        }
    }

    fn acquire(&self) -> BoxStream<'static, Result<Acquired, ScraperError>> {
        let dois = self.acquisition_dois.as_ref().clone();
        acquisition(self.name(), self.lookup(dois))
    }
}

async fn fetch_paper(fetcher: &dyn Fetcher, url: &str, doi: &str) -> Result<Paper, ScraperError> {
    let details: Details = match fetcher.fetch(url, Format::Json).await {
        Ok(payload) => serde_json::from_value(payload.into_json()?)?,
        Err(FetchError::Status { status: 404, .. }) => {
            return Err(ScraperError::NotFound(doi.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let jats_url = details
        .jats_url()
        .ok_or_else(|| ScraperError::NotFound(doi.to_string()))?;

    tracing::debug!(scraper = "biorxiv", doi, jats_url, "fetching JATS");

    let xml = fetcher
        .fetch(jats_url, Format::Xml)
        .await
        .map(Payload::into_text)?;

    jats::paper_from_jats(&xml, doi, vec![Link::new("doi", doi)])
}

// ===== bioRxiv API Types =====

#[derive(Debug, Deserialize)]
struct Details {
    #[serde(default)]
    messages: Vec<DetailsMessage>,
    #[serde(default)]
    collection: Vec<DetailsEntry>,
}

impl Details {
    fn jats_url(&self) -> Option<&str> {
        let ok = self
            .messages
            .iter()
            .any(|m| m.status.as_deref() == Some("ok"));
        if !ok {
            return None;
        }
        self.collection.first()?.jatsxml.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct DetailsMessage {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsEntry {
    jatsxml: Option<String>,
}
