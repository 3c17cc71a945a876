use crate::error::ApiError;
use crate::tracker::{NewTicket, SearchQuery, Ticket, TicketClient, TicketStatus};
use log::info;
use std::sync::{Arc, Mutex, MutexGuard};

/// Status given to tickets created through this client
pub const NEW_TICKET_STATUS: &str = "New";

/// Ticket tracker held entirely in memory
///
/// Backs dry runs and tests. Clones share the same store, so a test can hand
/// one clone to the engine and inspect or reconfigure the other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketClient {
    state: Arc<Mutex<TrackerState>>,
}

#[derive(Debug, Default)]
struct TrackerState {
    tickets: Vec<StoredTicket>,
    next_id: u64,
    hide_new_tickets: bool,
    search_failure: Option<String>,
    create_failure: Option<String>,
    comment_failure: Option<String>,
    search_calls: usize,
    create_calls: usize,
    comment_calls: usize,
}

#[derive(Debug, Clone)]
struct StoredTicket {
    ticket: Ticket,
    project_id: u64,
    searchable: bool,
}

impl InMemoryTicketClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing ticket; returns its id
    pub fn insert(&self, project_id: u64, name: &str, status: &str, description: &str) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.tickets.push(StoredTicket {
            ticket: Ticket {
                id,
                name: name.to_string(),
                status: TicketStatus::named(status),
                description: Some(description.to_string()),
                item_type: "defects".to_string(),
            },
            project_id,
            searchable: true,
        });
        id
    }

    /// Keep newly created tickets out of search results until published
    ///
    /// Simulates a tracker whose search index lags behind writes.
    pub fn hide_new_tickets(&self, hide: bool) {
        self.state().hide_new_tickets = hide;
    }

    /// Make a ticket visible to searches
    pub fn publish(&self, id: u64) {
        if let Some(stored) = self.state().tickets.iter_mut().find(|t| t.ticket.id == id) {
            stored.searchable = true;
        }
    }

    pub fn set_status(&self, id: u64, status: &str) {
        if let Some(stored) = self.state().tickets.iter_mut().find(|t| t.ticket.id == id) {
            stored.ticket.status = TicketStatus::named(status);
        }
    }

    /// Make every search fail with the given message, or succeed again with `None`
    pub fn fail_searches(&self, message: Option<&str>) {
        self.state().search_failure = message.map(str::to_string);
    }

    pub fn fail_creates(&self, message: Option<&str>) {
        self.state().create_failure = message.map(str::to_string);
    }

    pub fn fail_comments(&self, message: Option<&str>) {
        self.state().comment_failure = message.map(str::to_string);
    }

    /// All stored tickets in creation order
    pub fn tickets(&self) -> Vec<Ticket> {
        self.state()
            .tickets
            .iter()
            .map(|stored| stored.ticket.clone())
            .collect()
    }

    pub fn ticket(&self, id: u64) -> Option<Ticket> {
        self.state()
            .tickets
            .iter()
            .find(|stored| stored.ticket.id == id)
            .map(|stored| stored.ticket.clone())
    }

    pub fn search_calls(&self) -> usize {
        self.state().search_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    pub fn comment_calls(&self) -> usize {
        self.state().comment_calls
    }
}

impl TicketClient for InMemoryTicketClient {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Ticket>, ApiError> {
        let mut state = self.state();
        state.search_calls += 1;

        if let Some(message) = &state.search_failure {
            return Err(ApiError::Remote(message.clone()));
        }

        let phrase = query.phrase();
        Ok(state
            .tickets
            .iter()
            .filter(|stored| stored.searchable)
            .filter(|stored| query.project_id == 0 || stored.project_id == query.project_id)
            .filter(|stored| stored.ticket.name.contains(phrase))
            .map(|stored| stored.ticket.clone())
            .collect())
    }

    fn create(&self, ticket: &NewTicket) -> Result<u64, ApiError> {
        let mut state = self.state();
        state.create_calls += 1;

        if let Some(message) = &state.create_failure {
            return Err(ApiError::Remote(message.clone()));
        }

        state.next_id += 1;
        let id = state.next_id;
        let searchable = !state.hide_new_tickets;
        state.tickets.push(StoredTicket {
            ticket: Ticket {
                id,
                name: ticket.name.clone(),
                status: TicketStatus::named(NEW_TICKET_STATUS),
                description: Some(ticket.description.clone()),
                item_type: ticket.item_type.endpoint().to_string(),
            },
            project_id: ticket.project_id,
            searchable,
        });

        info!("In-memory tracker stored {} {}: {}", ticket.item_type.endpoint(), id, ticket.name);
        Ok(id)
    }

    fn comment(&self, ticket: &Ticket, description: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.comment_calls += 1;

        if let Some(message) = &state.comment_failure {
            return Err(ApiError::Remote(message.clone()));
        }

        let stored = state
            .tickets
            .iter_mut()
            .find(|stored| stored.ticket.id == ticket.id)
            .ok_or_else(|| ApiError::Remote(format!("Item {} not found", ticket.id)))?;
        stored.ticket.description = Some(description.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ItemType;

    fn new_ticket(name: &str, project_id: u64) -> NewTicket {
        NewTicket {
            item_type: ItemType::Defect,
            name: name.to_string(),
            project_id,
            release_id: None,
            description: "body".to_string(),
        }
    }

    #[test]
    fn test_search_matches_phrase_and_project() {
        let tracker = InMemoryTicketClient::new();
        tracker.insert(1, "Null pointer in Foo", "Open", "");
        tracker.insert(2, "Null pointer in Foo", "Open", "");
        tracker.insert(1, "Disk full", "Open", "");

        let all = tracker
            .search(&SearchQuery::for_summary(0, "Null pointer in Foo"))
            .unwrap();
        assert_eq!(all.len(), 2);

        let scoped = tracker
            .search(&SearchQuery::for_summary(2, "Null pointer in Foo"))
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, 2);
        assert_eq!(tracker.search_calls(), 2);
    }

    #[test]
    fn test_hidden_tickets_appear_after_publish() {
        let tracker = InMemoryTicketClient::new();
        tracker.hide_new_tickets(true);
        let id = tracker.create(&new_ticket("Late index", 0)).unwrap();

        let query = SearchQuery::for_summary(0, "Late index");
        assert!(tracker.search(&query).unwrap().is_empty());

        tracker.publish(id);
        let found = tracker.search(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status.name, NEW_TICKET_STATUS);
        assert_eq!(found[0].item_type, "defects");
    }

    #[test]
    fn test_comment_replaces_description() {
        let tracker = InMemoryTicketClient::new();
        let id = tracker.insert(0, "A", "Open", "first");
        let ticket = tracker.ticket(id).unwrap();

        tracker.comment(&ticket, "first<br/>- again").unwrap();
        assert_eq!(tracker.ticket(id).unwrap().description(), "first<br/>- again");
    }

    #[test]
    fn test_injected_failures() {
        let tracker = InMemoryTicketClient::new();
        tracker.fail_creates(Some("quota exceeded"));

        let result = tracker.create(&new_ticket("A", 0));
        assert!(matches!(result, Err(ApiError::Remote(ref m)) if m == "quota exceeded"));
        assert!(tracker.tickets().is_empty());
        assert_eq!(tracker.create_calls(), 1);

        tracker.fail_creates(None);
        assert!(tracker.create(&new_ticket("A", 0)).is_ok());
    }
}
