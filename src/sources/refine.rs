//! Paper refinement through registered scrapers.
//!
//! A paper's links are routed to scrapers by link type. Each route carries a
//! priority; higher priorities are asked first and come first when results
//! are merged.

use futures_util::StreamExt;
use std::cmp::Reverse;
use std::sync::Arc;

use super::{QueryCriteria, Scraper, ScraperError, ScraperRegistry};
use crate::models::{Link, Paper};

/// Sends links of one type to one scraper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineRoute {
    pub link_type: String,
    pub scraper: String,
    pub priority: u32,
}

impl RefineRoute {
    pub fn new(link_type: impl Into<String>, scraper: impl Into<String>, priority: u32) -> Self {
        Self {
            link_type: link_type.into(),
            scraper: scraper.into(),
            priority,
        }
    }
}

/// Routes used by [`Refiner::new`]
pub fn default_routes() -> Vec<RefineRoute> {
    vec![
        RefineRoute::new("doi", "biorxiv", 190),
        RefineRoute::new("pmc", "pmc", 110),
        RefineRoute::new("doi", "crossref", 100),
    ]
}

/// A paper one scraper returned for one link
#[derive(Debug, Clone, PartialEq)]
pub struct Refined {
    pub scraper: String,
    pub link: Link,
    pub paper: Paper,
}

/// Looks a paper up again through the scrapers its links route to
#[derive(Debug, Clone)]
pub struct Refiner {
    registry: ScraperRegistry,
    routes: Vec<RefineRoute>,
}

impl Refiner {
    /// A refiner over `registry` with the default doi and pmc routes
    pub fn new(registry: ScraperRegistry) -> Self {
        Self {
            registry,
            routes: default_routes(),
        }
    }

    /// Add a route
    pub fn route(mut self, route: RefineRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Scrapers to ask for `links`, highest priority first.
    ///
    /// Routes to scrapers missing from the registry are left out. Equal
    /// priorities keep link order, then route order.
    pub fn plan<'a>(
        &'a self,
        links: impl IntoIterator<Item = &'a Link>,
    ) -> Vec<(&'a Link, &'a RefineRoute)> {
        let mut plan: Vec<_> = links
            .into_iter()
            .flat_map(move |link| {
                self.routes
                    .iter()
                    .filter(move |route| route.link_type == link.kind)
                    .map(move |route| (link, route))
            })
            .filter(|(_, route)| self.registry.get(&route.scraper).is_some())
            .collect();
        plan.sort_by_key(|(_, route)| Reverse(route.priority));
        plan
    }

    /// Ask every routed scraper about `paper`, in priority order.
    ///
    /// Each scraper contributes at most its first result. Failures are
    /// logged and skipped.
    pub async fn refine(&self, paper: &Paper) -> Vec<Refined> {
        let mut results = Vec::new();

        for (link, route) in self.plan(&paper.links) {
            let Some(criteria) = QueryCriteria::from_link(link) else {
                tracing::debug!(link = %link.kind, "no lookup for link type");
                continue;
            };
            let Some(scraper) = self.registry.get(&route.scraper) else {
                continue;
            };

            match first_result(scraper, &criteria).await {
                Some(Ok(found)) => {
                    tracing::debug!(
                        scraper = %route.scraper,
                        link = %link.target,
                        "refined"
                    );
                    results.push(Refined {
                        scraper: route.scraper.clone(),
                        link: link.clone(),
                        paper: found,
                    });
                }
                Some(Err(ScraperError::InvalidCriteria(reason))) => {
                    tracing::debug!(scraper = %route.scraper, %reason, "link not served");
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        scraper = %route.scraper,
                        link = %link.target,
                        error = %e,
                        "refinement failed"
                    );
                }
                None => {}
            }
        }

        results
    }

    /// [`Refiner::refine`] followed by [`merge_refined`]
    pub async fn refine_merged(&self, paper: &Paper) -> Option<Paper> {
        let results = self.refine(paper).await;
        merge_refined(&paper.title, results.into_iter().map(|r| r.paper))
    }
}

async fn first_result(
    scraper: &Arc<dyn Scraper>,
    criteria: &QueryCriteria,
) -> Option<Result<Paper, ScraperError>> {
    scraper.query(criteria).next().await
}

/// Fold refinement results into one paper, first result first.
///
/// A single result is returned as is. With more than one, the title is
/// `title`, the first non-empty abstract and release list win, authors are
/// replaced until some author has an affiliation, and links and topics are
/// unioned in order. Quality is the first result's.
pub fn merge_refined(title: &str, results: impl IntoIterator<Item = Paper>) -> Option<Paper> {
    let mut results = results.into_iter();
    let mut merged = results.next()?;

    for result in results {
        merged.title = title.to_string();
        if merged.r#abstract.is_empty() {
            merged.r#abstract = result.r#abstract;
        }
        if !merged.authors.iter().any(|a| !a.affiliations.is_empty()) {
            merged.authors = result.authors;
        }
        merged.links.extend(result.links);
        merged.topics = unique(merged.topics.into_iter().chain(result.topics));
        if merged.releases.is_empty() {
            merged.releases = result.releases;
        }
    }

    Some(merged)
}

fn unique(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
