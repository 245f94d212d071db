//! Resolution of ambiguous source dates and user-supplied search bounds.
//!
//! Sources report dates as 1 to 3 numeric components (`[year]`,
//! `[year, month]`, `[year, month, day]`), often in several competing fields.
//! [`resolve_date`] picks one according to a priority order and records how
//! precise it is; missing trailing components are padded with `1`.

use chrono::{Months, NaiveDate};

use crate::models::{DatePrecision, DateRange};

/// Errors raised while resolving a date
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateResolutionError {
    /// No candidate field carried a date
    #[error("No usable date candidate in record")]
    NoCandidate,

    /// A candidate had zero or more than three components
    #[error("Expected 1 to 3 date components, got {0:?}")]
    InvalidParts(Vec<i32>),

    /// The padded components do not form a calendar date
    #[error("Invalid calendar date: {year}-{month}-{day}")]
    InvalidDate { year: i32, month: i32, day: i32 },

    /// A search bound could not be parsed
    #[error("Invalid date bound: {0}")]
    InvalidBound(String),
}

/// A single calendar date plus the precision the source vouched for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub precision: DatePrecision,
}

impl ResolvedDate {
    /// Pad `[year, month?, day?]` to a full date.
    pub fn from_parts(parts: &[i32]) -> Result<Self, DateResolutionError> {
        let precision = DatePrecision::from_component_count(parts.len())
            .ok_or_else(|| DateResolutionError::InvalidParts(parts.to_vec()))?;

        let year = parts[0];
        let month = parts.get(1).copied().unwrap_or(1);
        let day = parts.get(2).copied().unwrap_or(1);

        let invalid = || DateResolutionError::InvalidDate { year, month, day };
        let m = u32::try_from(month).map_err(|_| invalid())?;
        let d = u32::try_from(day).map_err(|_| invalid())?;
        let date = NaiveDate::from_ymd_opt(year, m, d).ok_or_else(invalid)?;

        Ok(Self { date, precision })
    }

    /// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`. A trailing time part
    /// (`2020-06-15T10:00:00Z`) is ignored.
    pub fn parse(text: &str) -> Result<Self, DateResolutionError> {
        let text = text.trim();
        let date_part = text.split('T').next().unwrap_or(text);

        let parts = date_part
            .split('-')
            .map(|p| p.parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DateResolutionError::InvalidBound(text.to_string()))?;

        Self::from_parts(&parts)
    }
}

/// Select the date to use for a record.
///
/// The event start wins when present; otherwise the first present candidate
/// in caller order is used.
pub fn resolve_date<'a, I>(
    event_start: Option<&'a [i32]>,
    candidates: I,
) -> Result<ResolvedDate, DateResolutionError>
where
    I: IntoIterator<Item = Option<&'a [i32]>>,
{
    let chosen = event_start
        .or_else(|| candidates.into_iter().flatten().next())
        .ok_or(DateResolutionError::NoCandidate)?;

    ResolvedDate::from_parts(chosen)
}

/// Which end of a search range a bound belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Start,
    End,
}

/// Widen a user-supplied bound into a concrete date.
///
/// `YYYY` becomes January 1st or December 31st, `YYYY-MM` the first or last
/// day of that month, and a full `YYYY-MM-DD` is kept as is.
pub fn widen_bound(value: &str, side: BoundSide) -> Result<NaiveDate, DateResolutionError> {
    let value = value.trim();
    let invalid = || DateResolutionError::InvalidBound(value.to_string());

    let parts: Vec<&str> = value.split('-').collect();
    if parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return Err(invalid());
    }

    let numbers = parts
        .iter()
        .map(|p| p.parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;

    match (numbers.as_slice(), side) {
        ([year], BoundSide::Start) => NaiveDate::from_ymd_opt(*year, 1, 1).ok_or_else(invalid),
        ([year], BoundSide::End) => NaiveDate::from_ymd_opt(*year, 12, 31).ok_or_else(invalid),
        ([_, _], BoundSide::Start) => ResolvedDate::from_parts(&numbers)
            .map(|r| r.date)
            .map_err(|_| invalid()),
        ([_, _], BoundSide::End) => ResolvedDate::from_parts(&numbers)
            .ok()
            .and_then(|r| r.date.checked_add_months(Months::new(1)))
            .and_then(|d| d.pred_opt())
            .ok_or_else(invalid),
        ([_, _, _], _) => ResolvedDate::from_parts(&numbers)
            .map(|r| r.date)
            .map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Resolve the date range of a search request.
///
/// `start` and `end` default to `year`; explicit values always win over the
/// bounds derived from the year.
pub fn resolve_bounds(
    year: Option<i32>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<DateRange, DateResolutionError> {
    let year = year.map(|y| y.to_string());

    let start = start
        .or(year.as_deref())
        .map(|s| widen_bound(s, BoundSide::Start))
        .transpose()?;
    let end = end
        .or(year.as_deref())
        .map(|s| widen_bound(s, BoundSide::End))
        .transpose()?;

    Ok(DateRange::new(start, end))
}
