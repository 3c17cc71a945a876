/// Remote ticket tracker client and implementations
pub mod axosoft;
pub mod client;
pub mod memory;

pub use axosoft::AxosoftClient;
pub use client::{NewTicket, SearchQuery, Ticket, TicketClient, TicketStatus};
pub use memory::InMemoryTicketClient;

#[cfg(test)]
pub use client::MockTicketClient;
