//! CrossRef scraper.
//!
//! Uses the CrossRef REST API for title search and DOI lookup. A work tied
//! to an event gets a conference release named after that event.

use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{acquisition, validate_base_url, Acquired, QueryCriteria, Scraper, ScraperError};
use crate::config::CrossrefConfig;
use crate::models::{
    Author, Institution, Link, MalformedRecordError, Paper, PaperAuthor, PaperBuilder, Quality,
    Release, Venue, VenueType,
};
use crate::utils::{resolve_date, FetchError, Fetcher, Format, Payload};

/// CrossRef scraper
#[derive(Debug, Clone)]
pub struct CrossrefScraper {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
    mailto: Option<String>,
    acquisition_title: Option<String>,
}

impl CrossrefScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &CrossrefConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            acquisition_title: config.title.clone(),
        }
    }

    fn search_url(&self, title: &str) -> String {
        let mut url = format!(
            "{}/works?query.title={}",
            self.base_url,
            urlencoding::encode(&format!("\"{}\"", title))
        );
        if let Some(mailto) = &self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(mailto)));
        }
        url
    }

    fn work_url(&self, doi: &str) -> String {
        let mut url = format!("{}/works/{}", self.base_url, urlencoding::encode(doi));
        if let Some(mailto) = &self.mailto {
            url.push_str(&format!("?mailto={}", urlencoding::encode(mailto)));
        }
        url
    }
}

#[derive(Debug, Clone)]
enum Lookup {
    Search { url: String },
    Doi { url: String, doi: String },
}

impl Lookup {
    fn url(&self) -> &str {
        match self {
            Lookup::Search { url } | Lookup::Doi { url, .. } => url,
        }
    }

    /// Raw works carried by a response
    fn items(&self, json: Value) -> Result<Vec<Value>, ScraperError> {
        match self {
            Lookup::Search { .. } => {
                let envelope: Envelope<WorksPage> = serde_json::from_value(json)?;
                Ok(envelope.message.items)
            }
            Lookup::Doi { .. } => {
                let envelope: Envelope<Value> = serde_json::from_value(json)?;
                Ok(vec![envelope.message])
            }
        }
    }
}

#[async_trait]
impl Scraper for CrossrefScraper {
    fn name(&self) -> &str {
        "crossref"
    }

    async fn prepare(&self) -> Result<(), ScraperError> {
        validate_base_url(&self.base_url)?;
        tracing::debug!(scraper = "crossref", base_url = %self.base_url, "prepared");
        Ok(())
    }

    fn query(&self, criteria: &QueryCriteria) -> BoxStream<'static, Result<Paper, ScraperError>> {
        let lookup = match (&criteria.doi, &criteria.title) {
            (Some(doi), _) => Lookup::Doi {
                url: self.work_url(doi),
                doi: doi.clone(),
            },
            (None, Some(title)) => Lookup::Search {
                url: self.search_url(title),
            },
            (None, None) => {
                return stream::once(async {
                    Err(ScraperError::InvalidCriteria(
                        "crossref needs a title or a DOI".to_string(),
                    ))
                })
                .boxed()
            }
        };

        let fetcher = Arc::clone(&self.fetcher);

        stream! {
            let payload = fetcher
                .fetch(lookup.url(), Format::Json)
                .await
                .and_then(Payload::into_json);

            let items = match (payload, &lookup) {
                (Ok(json), _) => match lookup.items(json) {
                    Ok(items) => items,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                },
                (Err(FetchError::Status { status: 404, .. }), Lookup::Doi { doi, .. }) => {
                    yield Err(ScraperError::NotFound(doi.clone()));
                    return;
                }
                (Err(e), _) => {
                    yield Err(e.into());
                    return;
                }
            };

            tracing::debug!(
                scraper = "crossref",
                url = lookup.url(),
                count = items.len(),
                "fetched works"
            );

            for item in items {
                yield normalize_work(item);
            }
        }
        .boxed()
    }

    fn acquire(&self) -> BoxStream<'static, Result<Acquired, ScraperError>> {
        let criteria = QueryCriteria {
            title: self.acquisition_title.clone(),
            ..QueryCriteria::default()
        };
        acquisition(self.name(), self.query(&criteria))
    }
}

/// Convert one CrossRef work into a [`Paper`]
pub(crate) fn normalize_work(value: Value) -> Result<Paper, ScraperError> {
    let record = value
        .get("DOI")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();

    let work: Work =
        serde_json::from_value(value).map_err(|e| MalformedRecordError::Undecodable {
            record: record.clone(),
            reason: e.to_string(),
        })?;

    let title = work
        .title
        .first()
        .filter(|t| !t.trim().is_empty())
        .ok_or(MalformedRecordError::MissingField {
            record,
            field: "title",
        })?;

    let mut builder = PaperBuilder::new(title.as_str(), Quality::scraped())
        .abstract_text(work.r#abstract.clone().unwrap_or_default())
        .authors(work.author.iter().map(paper_author));

    if let Some(doi) = &work.doi {
        builder = builder.link(Link::new("doi", doi.as_str()));
    }
    if let Some(url) = &work.url {
        builder = builder.link(Link::new("url", url.as_str()));
    }
    if let Some(release) = event_release(&work)? {
        builder = builder.release(release);
    }

    Ok(builder.build())
}

fn paper_author(author: &WorkAuthor) -> PaperAuthor {
    let name = match (&author.given, &author.family) {
        (Some(given), Some(family)) => format!("{} {}", given, family),
        _ => String::new(),
    };

    PaperAuthor {
        author: Author::named(name),
        affiliations: author
            .affiliation
            .iter()
            .filter_map(|aff| aff.name.as_deref())
            .map(Institution::unknown)
            .collect(),
    }
}

/// Release at the event the work was presented at, if any.
///
/// The event start date wins; otherwise the print, generic, online and
/// creation dates are tried in that order.
fn event_release(work: &Work) -> Result<Option<Release>, ScraperError> {
    let Some(event) = &work.event else {
        return Ok(None);
    };
    let Some(name) = event.name.as_deref() else {
        return Ok(None);
    };

    let event_start = event.start.as_ref().and_then(DateParts::first);
    let candidates = [
        &work.published_print,
        &work.published,
        &work.published_online,
        &work.created,
    ]
    .map(|field| field.as_ref().and_then(DateParts::first));

    let resolved = resolve_date(
        event_start.as_deref(),
        candidates.iter().map(|c| c.as_deref()),
    )?;

    let venue = Venue::new(
        name,
        VenueType::Conference,
        resolved.date,
        resolved.precision,
        // event venues outrank the scraped paper record
        Quality::new([1]),
    );

    Ok(Some(Release::published(venue)))
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    message: T,
}

#[derive(Debug, Deserialize)]
struct WorksPage {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Work {
    #[serde(default)]
    title: Vec<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    r#abstract: Option<String>,
    event: Option<Event>,
    published_print: Option<DateParts>,
    published: Option<DateParts>,
    published_online: Option<DateParts>,
    created: Option<DateParts>,
}

#[derive(Debug, Deserialize)]
struct WorkAuthor {
    given: Option<String>,
    family: Option<String>,
    #[serde(default)]
    affiliation: Vec<Affiliation>,
}

#[derive(Debug, Deserialize)]
struct Affiliation {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Event {
    name: Option<String>,
    start: Option<DateParts>,
}

#[derive(Debug, Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl DateParts {
    /// Leading non-null components of the first date, if any
    fn first(&self) -> Option<Vec<i32>> {
        let parts: Vec<i32> = self
            .date_parts
            .first()?
            .iter()
            .map_while(|p| *p)
            .collect();
        (!parts.is_empty()).then_some(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatePrecision;
    use crate::utils::{DateResolutionError, StaticFetcher};
    use chrono::NaiveDate;
    use serde_json::json;

    const BASE: &str = "https://api.crossref.org";

    fn scraper(fetcher: StaticFetcher) -> CrossrefScraper {
        CrossrefScraper::new(Arc::new(fetcher), &CrossrefConfig::default())
    }

    fn works(items: Value) -> Value {
        json!({"status": "ok", "message": {"items": items}})
    }

    #[test]
    fn test_author_without_affiliation() {
        let paper = normalize_work(json!({
            "title": ["Notes on the Analytical Engine"],
            "author": [{"given": "Ada", "family": "Lovelace"}],
        }))
        .unwrap();

        assert_eq!(paper.authors.len(), 1);
        assert_eq!(paper.authors[0].author.name, "Ada Lovelace");
        assert!(paper.authors[0].affiliations.is_empty());
        assert_eq!(paper.r#abstract, "");
        assert!(paper.releases.is_empty());
        assert_eq!(paper.quality, Quality::scraped());
    }

    #[test]
    fn test_partial_author_name_is_empty() {
        let paper = normalize_work(json!({
            "title": ["T"],
            "author": [
                {"family": "Babbage", "affiliation": [{"name": "Cambridge"}]},
            ],
        }))
        .unwrap();

        assert_eq!(paper.authors[0].author.name, "");
        assert_eq!(paper.authors[0].affiliations[0].name, "Cambridge");
    }

    #[test]
    fn test_event_start_wins() {
        let paper = normalize_work(json!({
            "title": ["T"],
            "DOI": "10.1/t",
            "URL": "http://dx.doi.org/10.1/t",
            "event": {"name": "ICML 2021", "start": {"date-parts": [[2021, 7]]}},
            "published-print": {"date-parts": [[2022, 1, 5]]},
        }))
        .unwrap();

        let venue = &paper.releases[0].venue;
        assert_eq!(venue.name, "ICML 2021");
        assert_eq!(venue.series, "ICML 2021");
        assert_eq!(venue.kind, VenueType::Conference);
        assert_eq!(venue.date, NaiveDate::from_ymd_opt(2021, 7, 1).unwrap());
        assert_eq!(venue.date_precision, DatePrecision::Month);
        assert_eq!(venue.quality, Quality::new([1]));
        assert_eq!(paper.quality, Quality::scraped());
        assert_eq!(paper.releases[0].status, "published");
        assert_eq!(paper.link("doi").unwrap().target, "10.1/t");
        assert_eq!(paper.link("url").unwrap().target, "http://dx.doi.org/10.1/t");
    }

    #[test]
    fn test_event_falls_back_in_priority_order() {
        let paper = normalize_work(json!({
            "title": ["T"],
            "event": {"name": "Workshop"},
            "created": {"date-parts": [[2019, 3, 4]]},
            "published-online": {"date-parts": [[2020]]},
        }))
        .unwrap();

        let venue = &paper.releases[0].venue;
        assert_eq!(venue.date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(venue.date_precision, DatePrecision::Year);
    }

    #[test]
    fn test_null_date_parts_are_absent() {
        let paper = normalize_work(json!({
            "title": ["T"],
            "event": {"name": "E", "start": {"date-parts": [[null]]}},
            "published": {"date-parts": [[2018, 2, 3]]},
        }))
        .unwrap();

        assert_eq!(
            paper.releases[0].venue.date,
            NaiveDate::from_ymd_opt(2018, 2, 3).unwrap()
        );
    }

    #[test]
    fn test_event_without_date_fails_record() {
        let err = normalize_work(json!({"title": ["T"], "event": {"name": "E"}})).unwrap_err();
        assert_eq!(
            err,
            ScraperError::DateResolution(DateResolutionError::NoCandidate)
        );
        assert!(err.is_record_level());
    }

    #[test]
    fn test_missing_title_is_malformed() {
        let err = normalize_work(json!({"DOI": "10.1/x", "title": []})).unwrap_err();
        assert_eq!(
            err,
            ScraperError::MalformedRecord(MalformedRecordError::MissingField {
                record: "10.1/x".to_string(),
                field: "title",
            })
        );
    }

    #[test]
    fn test_urls() {
        let config = CrossrefConfig {
            mailto: Some("me@example.org".to_string()),
            ..CrossrefConfig::default()
        };
        let s = CrossrefScraper::new(Arc::new(StaticFetcher::new()), &config);

        assert_eq!(
            s.search_url("Deep Nets"),
            "https://api.crossref.org/works?query.title=%22Deep%20Nets%22&mailto=me%40example.org"
        );
        assert_eq!(
            s.work_url("10.1/x"),
            "https://api.crossref.org/works/10.1%2Fx?mailto=me%40example.org"
        );
    }

    #[tokio::test]
    async fn test_query_skips_bad_records_and_continues() {
        let fetcher = StaticFetcher::new().with_json(
            format!("{}/works?query.title=%22Notes%22", BASE),
            works(json!([
                {"title": ["First"]},
                {"title": []},
                {"title": ["Third"]},
            ])),
        );

        let items: Vec<_> = scraper(fetcher)
            .query(&QueryCriteria::title("Notes"))
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().title, "First");
        assert!(items[1].as_ref().unwrap_err().is_record_level());
        assert_eq!(items[2].as_ref().unwrap().title, "Third");
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_stream() {
        let url = format!("{}/works?query.title=%22Notes%22", BASE);
        let fetcher = StaticFetcher::new().with_error(
            url.clone(),
            FetchError::Status {
                url: url.clone(),
                status: 503,
            },
        );

        let items: Vec<_> = scraper(fetcher)
            .query(&QueryCriteria::title("Notes"))
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(ScraperError::Fetch(FetchError::Status { status: 503, .. }))
        ));
    }

    #[tokio::test]
    async fn test_doi_lookup() {
        let fetcher = StaticFetcher::new().with_json(
            format!("{}/works/10.1%2Fada", BASE),
            json!({"message": {"DOI": "10.1/ada", "title": ["Notes"]}}),
        );

        let items: Vec<_> = scraper(fetcher)
            .query(&QueryCriteria::doi("10.1/ada"))
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().link("doi").unwrap().target, "10.1/ada");
    }

    #[tokio::test]
    async fn test_unknown_doi_is_not_found() {
        let items: Vec<_> = scraper(StaticFetcher::new())
            .query(&QueryCriteria::doi("10.1/missing"))
            .collect()
            .await;

        assert_eq!(items, vec![Err(ScraperError::NotFound("10.1/missing".to_string()))]);
    }

    #[tokio::test]
    async fn test_empty_criteria() {
        let items: Vec<_> = scraper(StaticFetcher::new())
            .query(&QueryCriteria::default())
            .collect()
            .await;

        assert!(matches!(items[..], [Err(ScraperError::InvalidCriteria(_))]));
    }

    #[tokio::test]
    async fn test_acquire_emits_meta_then_papers() {
        let fetcher = StaticFetcher::new().with_json(
            format!("{}/works?query.title=%22Notes%22", BASE),
            works(json!([{"title": ["Notes"]}])),
        );
        let config = CrossrefConfig {
            title: Some("Notes".to_string()),
            ..CrossrefConfig::default()
        };
        let s = CrossrefScraper::new(Arc::new(fetcher), &config);

        s.prepare().await.unwrap();
        let items: Vec<_> = s.acquire().collect().await;

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Ok(Acquired::Meta(m)) if m.scraper == "crossref"));
        assert!(matches!(&items[1], Ok(Acquired::Paper(p)) if p.title == "Notes"));
    }

    #[tokio::test]
    async fn test_prepare_rejects_bad_base_url() {
        let config = CrossrefConfig {
            base_url: "not a url".to_string(),
            ..CrossrefConfig::default()
        };
        let s = CrossrefScraper::new(Arc::new(StaticFetcher::new()), &config);

        assert!(matches!(s.prepare().await, Err(ScraperError::Prepare(_))));
    }
}
