use thiserror::Error;

/// Errors returned by the ticket tracker API client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tracker returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Tracker reported an error: {0}")]
    Remote(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur while turning a log event into a ticket
///
/// Each variant names the step that failed. A throttled submission is not
/// an error and never produces one of these.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Existing item search failed: {0}")]
    Search(#[source] ApiError),

    #[error("Could not add comment to item {ticket_id}: {source}")]
    Comment {
        ticket_id: u64,
        #[source]
        source: ApiError,
    },

    #[error("Could not create item: {0}")]
    Create(#[source] ApiError),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("Invalid summary preprocessor pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
