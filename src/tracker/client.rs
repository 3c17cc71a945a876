use crate::config::ItemType;
use crate::error::ApiError;
use crate::format::search_string;
use serde::{Deserialize, Serialize};

/// Field the tracker searches the phrase in
pub const SEARCH_FIELD: &str = "name";

/// Field search results are sorted by, oldest first
pub const SORT_FIELD: &str = "created_date_time";

/// Trait for remote ticket tracker implementations
///
/// Calls are blocking and are never retried by callers; timeouts are the
/// implementation's concern.
#[cfg_attr(test, mockall::automock)]
pub trait TicketClient: Send {
    /// List tickets matching the query, in the tracker's sort order
    fn search(&self, query: &SearchQuery) -> Result<Vec<Ticket>, ApiError>;

    /// Create a ticket and return its id
    fn create(&self, ticket: &NewTicket) -> Result<u64, ApiError>;

    /// Replace the description of an existing ticket
    fn comment(&self, ticket: &Ticket, description: &str) -> Result<(), ApiError>;
}

/// Parameters of a ticket search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    /// Project to search in, 0 for all projects
    pub project_id: u64,
    pub search_string: String,
    pub search_field: String,
    pub sort_fields: String,
}

impl SearchQuery {
    /// Exact-phrase search for a summary in ticket names
    pub fn for_summary(project_id: u64, summary: &str) -> Self {
        Self {
            project_id,
            search_string: search_string(summary),
            search_field: SEARCH_FIELD.to_string(),
            sort_fields: SORT_FIELD.to_string(),
        }
    }

    /// The search phrase without its surrounding quotes
    pub fn phrase(&self) -> &str {
        let s = self.search_string.as_str();
        s.strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(s)
    }
}

/// A ticket as returned by the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: TicketStatus,
    /// Tracker descriptions may be null
    #[serde(default)]
    pub description: Option<String>,
    /// Collection the ticket lives in, e.g. `defects`
    #[serde(default)]
    pub item_type: String,
}

impl Ticket {
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Workflow status of a ticket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatus {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: String,
}

impl TicketStatus {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Payload of a ticket creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub item_type: ItemType,
    pub name: String,
    pub project_id: u64,
    pub release_id: Option<u64>,
    pub description: String,
}
