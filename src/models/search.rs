//! Search request and query spec models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Ordering requested from the remote search API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    None,
    MostRecentFirst,
    MostCitedFirst,
}

impl SortOrder {
    /// Value of the `orderby` request parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            SortOrder::None => "none",
            SortOrder::MostRecentFirst => "date-desc",
            SortOrder::MostCitedFirst => "citation-desc",
        }
    }

    /// Record field the merged collection is re-sorted by
    pub fn sort_field(&self) -> Option<&'static str> {
        match self {
            SortOrder::None => None,
            SortOrder::MostRecentFirst => Some(super::record::DATE_FIELD),
            SortOrder::MostCitedFirst => Some(super::record::CITATION_FIELD),
        }
    }
}

/// Inclusive date range; either side may be open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Value of the `daterange` request parameter (`start,end`, open sides empty)
    pub fn as_param(&self) -> String {
        let fmt = |d: Option<NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        format!("{},{}", fmt(self.start), fmt(self.end))
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// A logical search request, before fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Words in the title
    pub title: Option<String>,

    /// Author name, or author ID when made of digits only
    pub author: Option<String>,

    /// Words in the title or abstract
    pub words: Option<String>,

    pub keywords: Option<String>,

    pub institution: Option<String>,

    /// Year used for both bounds unless `start`/`end` are given
    pub year: Option<i32>,

    /// Start bound (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    pub start: Option<String>,

    /// End bound (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    pub end: Option<String>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn words(mut self, words: impl Into<String>) -> Self {
        self.words = Some(words.into());
        self
    }

    pub fn keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    pub fn institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = Some(institution.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }
}

/// One independent query produced by fan-out.
///
/// Specs are immutable once built; the only constructor is
/// [`crate::search::FanoutBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    title: Option<String>,
    author: Option<String>,
    words: Option<String>,
    keywords: Option<String>,
    institution: Option<String>,
    daterange: DateRange,
}

impl QuerySpec {
    pub(crate) fn new(
        request: &SearchRequest,
        author: Option<String>,
        daterange: DateRange,
    ) -> Self {
        Self {
            title: request.title.clone(),
            author,
            words: request.words.clone(),
            keywords: request.keywords.clone(),
            institution: request.institution.clone(),
            daterange,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Whether the author filter is a numeric author ID rather than a name
    pub fn author_is_id(&self) -> bool {
        self.author
            .as_deref()
            .is_some_and(|a| !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()))
    }

    pub fn words(&self) -> Option<&str> {
        self.words.as_deref()
    }

    pub fn keywords(&self) -> Option<&str> {
        self.keywords.as_deref()
    }

    pub fn institution(&self) -> Option<&str> {
        self.institution.as_deref()
    }

    pub fn daterange(&self) -> DateRange {
        self.daterange
    }
}
