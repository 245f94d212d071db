//! Tracked researchers and their time-bounded roles.
//!
//! Rosters are owned by the caller; this crate only reads them to scope
//! per-researcher queries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A time-bounded status assignment (e.g. an active affiliation period)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub status: String,
    #[serde(default)]
    pub begin: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl Role {
    pub fn new(
        status: impl Into<String>,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        Self {
            status: status.into(),
            begin,
            end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Researcher {
    #[serde(default)]
    pub name: String,
    /// External identifiers used as the author filter of generated queries
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Researcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ids: Vec::new(),
            roles: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Roles whose status is one of `statuses`. An empty filter matches nothing.
    pub fn with_status<'a, S>(&'a self, statuses: &'a [S]) -> impl Iterator<Item = &'a Role> + 'a
    where
        S: AsRef<str>,
    {
        self.roles
            .iter()
            .filter(move |role| statuses.iter().any(|s| s.as_ref() == role.status))
    }
}
