//! Canonical entity graph shared by every source.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How much of a resolved date can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

impl DatePrecision {
    /// Precision implied by the number of date components a source supplied
    pub fn from_component_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(DatePrecision::Year),
            2 => Some(DatePrecision::Month),
            3 => Some(DatePrecision::Day),
            _ => None,
        }
    }
}

/// Kind of institution an affiliation points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionCategory {
    #[default]
    Unknown,
    Academic,
    Industry,
    Government,
    Nonprofit,
}

/// Kind of venue a paper was released at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueType {
    Journal,
    Conference,
    Workshop,
    Preprint,
    Book,
    #[default]
    Unknown,
}

impl VenueType {
    /// Parse a venue type tag as reported by a search API
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "journal" => VenueType::Journal,
            "conference" => VenueType::Conference,
            "workshop" => VenueType::Workshop,
            "preprint" => VenueType::Preprint,
            "book" => VenueType::Book,
            _ => VenueType::Unknown,
        }
    }
}

/// Provenance/confidence rank.
///
/// Tuples compare lexicographically, but only against tuples of the same
/// length: `partial_cmp` returns `None` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quality(Vec<u32>);

impl Quality {
    pub fn new(rank: impl Into<Vec<u32>>) -> Self {
        Self(rank.into())
    }

    /// Rank given to records built by scrapers
    pub fn scraped() -> Self {
        Self(vec![0])
    }

    /// Rank given to records mapped from the search API
    pub fn api() -> Self {
        Self(vec![1])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

impl PartialOrd for Quality {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.0.len() != other.0.len() {
            return None;
        }
        Some(self.0.cmp(&other.0))
    }
}

/// A typed external link (`doi`, `url`, `pmc`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

impl Link {
    pub fn new(kind: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    /// Display name; empty means "unknown", not "no author"
    pub name: String,
    pub roles: Vec<String>,
    pub aliases: Vec<String>,
    pub links: Vec<Link>,
}

impl Author {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    pub name: String,
    pub category: InstitutionCategory,
    pub aliases: Vec<String>,
}

impl Institution {
    /// An institution known only by name
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: InstitutionCategory::Unknown,
            aliases: Vec::new(),
        }
    }
}

/// An author together with the affiliations credited on one specific paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperAuthor {
    pub author: Author,
    pub affiliations: Vec<Institution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: VenueType,
    pub series: String,
    pub aliases: Vec<String>,
    pub links: Vec<Link>,
    pub open: bool,
    pub peer_reviewed: bool,
    pub publisher: Option<String>,
    pub volume: Option<String>,
    pub date_precision: DatePrecision,
    pub date: NaiveDate,
    pub quality: Quality,
}

impl Venue {
    /// A venue whose series is its own name, with no links or aliases
    pub fn new(
        name: impl Into<String>,
        kind: VenueType,
        date: NaiveDate,
        date_precision: DatePrecision,
        quality: Quality,
    ) -> Self {
        let name = name.into();
        Self {
            series: name.clone(),
            name,
            kind,
            aliases: Vec::new(),
            links: Vec::new(),
            open: false,
            peer_reviewed: false,
            publisher: None,
            volume: None,
            date_precision,
            date,
            quality,
        }
    }

    pub fn with_publisher(mut self, publisher: Option<String>) -> Self {
        self.publisher = publisher;
        self
    }
}

/// Binds a paper to the venue it was published at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub venue: Venue,
    pub status: String,
    pub pages: Option<String>,
}

impl Release {
    pub fn published(venue: Venue) -> Self {
        Self {
            venue,
            status: "published".to_string(),
            pages: None,
        }
    }
}

/// A research paper in canonical form
///
/// Values are built once by a normalizer or the search-API mapper and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub r#abstract: String,
    pub authors: Vec<PaperAuthor>,
    pub links: BTreeSet<Link>,
    pub topics: Vec<String>,
    pub releases: Vec<Release>,
    pub quality: Quality,
}

impl Paper {
    /// Author display names in paper order
    pub fn author_names(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.author.name.as_str()).collect()
    }

    /// First link of the given type, if any
    pub fn link(&self, kind: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.kind == kind)
    }

    /// Date of the earliest release, if the paper has one
    pub fn release_date(&self) -> Option<NaiveDate> {
        self.releases.iter().map(|r| r.venue.date).min()
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    pub fn new(title: impl Into<String>, quality: Quality) -> Self {
        Self {
            paper: Paper {
                title: title.into(),
                r#abstract: String::new(),
                authors: Vec::new(),
                links: BTreeSet::new(),
                topics: Vec::new(),
                releases: Vec::new(),
                quality,
            },
        }
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    pub fn author(mut self, author: PaperAuthor) -> Self {
        self.paper.authors.push(author);
        self
    }

    pub fn authors(mut self, authors: impl IntoIterator<Item = PaperAuthor>) -> Self {
        self.paper.authors.extend(authors);
        self
    }

    pub fn link(mut self, link: Link) -> Self {
        self.paper.links.insert(link);
        self
    }

    pub fn topics(mut self, topics: impl IntoIterator<Item = String>) -> Self {
        self.paper.topics.extend(topics);
        self
    }

    pub fn release(mut self, release: Release) -> Self {
        self.paper.releases.push(release);
        self
    }

    pub fn build(self) -> Paper {
        self.paper
    }
}

/// Marker emitted once at the start of an acquisition run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub scraper: String,
    pub date: DateTime<Utc>,
}

impl Meta {
    pub fn now(scraper: impl Into<String>) -> Self {
        Self {
            scraper: scraper.into(),
            date: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_ordering() {
        assert!(Quality::scraped() < Quality::api());
        assert!(Quality::new([1, 2]) < Quality::new([1, 3]));
        assert_eq!(Quality::new([1]).partial_cmp(&Quality::new([1, 0])), None);
        assert!(!(Quality::new([0]) < Quality::new([0, 5])));
    }

    #[test]
    fn test_precision_from_count() {
        assert_eq!(DatePrecision::from_component_count(1), Some(DatePrecision::Year));
        assert_eq!(DatePrecision::from_component_count(3), Some(DatePrecision::Day));
        assert_eq!(DatePrecision::from_component_count(0), None);
        assert_eq!(DatePrecision::from_component_count(4), None);
    }

    #[test]
    fn test_paper_builder_dedups_links() {
        let paper = PaperBuilder::new("Test", Quality::scraped())
            .link(Link::new("doi", "10.1/x"))
            .link(Link::new("doi", "10.1/x"))
            .link(Link::new("url", "https://example.com"))
            .build();

        assert_eq!(paper.links.len(), 2);
        assert_eq!(paper.link("doi").map(|l| l.target.as_str()), Some("10.1/x"));
        assert_eq!(paper.r#abstract, "");
        assert!(paper.releases.is_empty());
    }

    #[test]
    fn test_venue_series_defaults_to_name() {
        let date = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
        let venue = Venue::new(
            "NeurIPS",
            VenueType::Conference,
            date,
            DatePrecision::Month,
            Quality::scraped(),
        );
        assert_eq!(venue.series, "NeurIPS");
        assert!(venue.publisher.is_none());
    }

    #[test]
    fn test_venue_type_from_tag() {
        assert_eq!(VenueType::from_tag("Journal"), VenueType::Journal);
        assert_eq!(VenueType::from_tag(" conference "), VenueType::Conference);
        assert_eq!(VenueType::from_tag("zine"), VenueType::Unknown);
    }

    #[test]
    fn test_link_serializes_type_key() {
        let json = serde_json::to_value(Link::new("doi", "10.1/x")).unwrap();
        assert_eq!(json["type"], "doi");
        assert_eq!(json["target"], "10.1/x");
    }
}
