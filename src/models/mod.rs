//! Core data models: the entity graph, rosters, search requests and raw records.

mod entity;
pub mod record;
mod roster;
mod search;

pub use entity::{
    Author, DatePrecision, Institution, InstitutionCategory, Link, Meta, Paper, PaperAuthor,
    PaperBuilder, Quality, Release, Venue, VenueType,
};
pub use record::{paper_from_record, MalformedRecordError, RawRecord};
pub use roster::{Researcher, Role};
pub use search::{DateRange, QuerySpec, SearchRequest, SortOrder};
