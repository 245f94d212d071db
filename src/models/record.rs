//! Raw records returned by the search API and their mapping to [`Paper`].

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::entity::{
    Author, DatePrecision, Institution, Link, Paper, PaperAuthor, PaperBuilder, Quality, Release,
    Venue, VenueType,
};
use crate::utils::dates::ResolvedDate;

/// Field carrying the source-provided identity of a record
pub const ID_FIELD: &str = "id";
/// Field the `most-recent-first` order sorts by
pub const DATE_FIELD: &str = "date";
/// Field the `most-cited-first` order sorts by
pub const CITATION_FIELD: &str = "citation_count";

/// Attributes requested from the search API by default
pub const DEFAULT_ATTRS: &[&str] = &[
    ID_FIELD,
    "title",
    "abstract",
    "authors",
    DATE_FIELD,
    CITATION_FIELD,
    "venue",
    "doi",
    "url",
    "keywords",
];

/// A source record missing something required to use it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedRecordError {
    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Record has no usable 'id' field")]
    MissingId,

    #[error("Record {record} is missing required field '{field}'")]
    MissingField { record: String, field: &'static str },

    #[error("Record {record} could not be decoded: {reason}")]
    Undecodable { record: String, reason: String },
}

/// One record as returned by the search API: an ID plus the requested attributes
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    id: String,
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Build a record from a JSON object. The `id` may be a string or a number.
    pub fn from_value(value: Value) -> Result<Self, MalformedRecordError> {
        let Value::Object(fields) = value else {
            return Err(MalformedRecordError::NotAnObject);
        };

        let id = match fields.get(ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(MalformedRecordError::MissingId),
        };

        Ok(Self { id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Publication date, from a `YYYY[-MM[-DD]]` string or a bare numeric year
    pub fn date(&self) -> Option<NaiveDate> {
        match self.get(DATE_FIELD)? {
            Value::String(s) => ResolvedDate::parse(s).ok().map(|r| r.date),
            Value::Number(n) => n
                .as_i64()
                .and_then(|y| i32::try_from(y).ok())
                .and_then(|y| ResolvedDate::from_parts(&[y]).ok())
                .map(|r| r.date),
            _ => None,
        }
    }

    pub fn citation_count(&self) -> Option<f64> {
        match self.get(CITATION_FIELD)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Map a search-API record onto the entity model.
///
/// Records from the API rank above scraped ones (`Quality::api()`). A
/// release is only built when the record has both a venue and a date.
pub fn paper_from_record(record: &RawRecord) -> Result<Paper, MalformedRecordError> {
    let title = record
        .get_str("title")
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| MalformedRecordError::MissingField {
            record: record.id().to_string(),
            field: "title",
        })?;

    let mut builder = PaperBuilder::new(title, Quality::api())
        .abstract_text(record.get_str("abstract").unwrap_or_default())
        .authors(parse_authors(record.get("authors")))
        .topics(parse_keywords(record.get("keywords")));

    if let Some(doi) = record.get_str("doi") {
        builder = builder.link(Link::new("doi", doi));
    }
    if let Some(url) = record.get_str("url") {
        builder = builder.link(Link::new("url", url));
    }

    let date = record
        .get_str(DATE_FIELD)
        .and_then(|d| ResolvedDate::parse(d).ok())
        .or_else(|| {
            record
                .date()
                .map(|date| ResolvedDate { date, precision: DatePrecision::Year })
        });

    if let (Some(venue), Some(date)) = (record.get("venue"), date) {
        if let Some(venue) = parse_venue(venue, date) {
            builder = builder.release(Release::published(venue));
        }
    }

    Ok(builder.build())
}

fn parse_authors(value: Option<&Value>) -> Vec<PaperAuthor> {
    let Some(Value::Array(authors)) = value else {
        return Vec::new();
    };

    authors
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(PaperAuthor {
                author: Author::named(name.as_str()),
                affiliations: Vec::new(),
            }),
            Value::Object(obj) => {
                let name = obj.get("name").and_then(Value::as_str).unwrap_or_default();
                let affiliations = obj
                    .get("affiliations")
                    .and_then(Value::as_array)
                    .map(|affs| affs.iter().filter_map(parse_institution).collect())
                    .unwrap_or_default();
                Some(PaperAuthor {
                    author: Author::named(name),
                    affiliations,
                })
            }
            _ => None,
        })
        .collect()
}

fn parse_institution(value: &Value) -> Option<Institution> {
    let name = match value {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("name")?.as_str()?,
        _ => return None,
    };
    Some(Institution::unknown(name))
}

fn parse_keywords(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_venue(value: &Value, date: ResolvedDate) -> Option<Venue> {
    let (name, kind, publisher) = match value {
        Value::String(name) => (name.as_str(), VenueType::Unknown, None),
        Value::Object(obj) => (
            obj.get("name")?.as_str()?,
            obj.get("type")
                .and_then(Value::as_str)
                .map(VenueType::from_tag)
                .unwrap_or_default(),
            obj.get("publisher").and_then(Value::as_str).map(str::to_string),
        ),
        _ => return None,
    };

    if name.trim().is_empty() {
        return None;
    }

    Some(
        Venue::new(name, kind, date.date, date.precision, Quality::api())
            .with_publisher(publisher),
    )
}
