/// Error types for the ticket logger
pub mod error;

/// Log event types
pub mod events;

/// Configuration management
pub mod config;

/// Time source used for throttling and timestamps
pub mod clock;

/// Summary and description formatting
pub mod format;

/// Ticket tracker clients
pub mod tracker;

/// Deduplicating submission engine
pub mod submission;

// Re-export commonly used types
pub use error::{ApiError, ConfigError, LoggerError};
pub use events::{Context, ErrorEvent, Severity};
pub use submission::{Submission, TicketLogger};
