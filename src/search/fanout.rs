//! Expansion of one search request into independent query specs.

use crate::models::{DateRange, QuerySpec, Researcher, SearchRequest};
use crate::utils::{resolve_bounds, DateResolutionError};

/// Builds the [`QuerySpec`]s for one [`SearchRequest`].
///
/// Without a roster the request maps to exactly one spec. With a roster,
/// every identifier of every researcher yields one spec per role whose
/// status passes the filter, bounded by that role's dates.
#[derive(Debug, Clone)]
pub struct FanoutBuilder<'a> {
    request: &'a SearchRequest,
    roster: Option<&'a [Researcher]>,
    statuses: Vec<String>,
}

impl<'a> FanoutBuilder<'a> {
    pub fn new(request: &'a SearchRequest) -> Self {
        Self {
            request,
            roster: None,
            statuses: Vec::new(),
        }
    }

    /// Scope the request to tracked researchers
    pub fn roster(mut self, roster: &'a [Researcher]) -> Self {
        self.roster = Some(roster);
        self
    }

    /// Role statuses to include; an empty set matches no role
    pub fn statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self) -> Result<Vec<QuerySpec>, DateResolutionError> {
        let Some(roster) = self.roster else {
            let daterange = resolve_bounds(
                self.request.year,
                self.request.start.as_deref(),
                self.request.end.as_deref(),
            )?;
            return Ok(vec![QuerySpec::new(
                self.request,
                self.request.author.clone(),
                daterange,
            )]);
        };

        let specs: Vec<QuerySpec> = roster
            .iter()
            .flat_map(|researcher| {
                researcher.with_status(&self.statuses).flat_map(move |role| {
                    researcher.ids.iter().map(move |id| {
                        QuerySpec::new(
                            self.request,
                            Some(id.clone()),
                            DateRange::new(role.begin, role.end),
                        )
                    })
                })
            })
            .collect();

        tracing::debug!(
            researchers = roster.len(),
            specs = specs.len(),
            "expanded roster query"
        );

        Ok(specs)
    }
}
