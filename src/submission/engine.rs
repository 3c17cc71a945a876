use crate::clock::{Clock, SystemClock};
use crate::config::LoggerOptions;
use crate::error::{ConfigError, LoggerError};
use crate::events::{Context, ErrorEvent, Severity};
use crate::format::{DescriptionFormatter, StringFormatter};
use crate::submission::SubmissionThrottle;
use crate::tracker::{NewTicket, SearchQuery, Ticket, TicketClient};
use chrono::SecondsFormat;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of a single log call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Submission {
    /// A new ticket was created
    Created { summary: String, ticket_id: u64 },
    /// An open ticket with the same summary received a note
    Commented { summary: String, ticket_id: u64 },
    /// The summary produced a ticket too recently; nothing was sent
    Throttled { summary: String },
}

impl Submission {
    pub fn summary(&self) -> &str {
        match self {
            Submission::Created { summary, .. }
            | Submission::Commented { summary, .. }
            | Submission::Throttled { summary } => summary,
        }
    }
}

/// Turns log events into tracker tickets, deduplicating repeats
///
/// For every event the logger derives a summary, looks for an open ticket
/// with that summary and either appends a note to it or creates a new
/// ticket. Creation is throttled per summary for `try_resubmit_timeout`
/// seconds.
///
/// Each call runs to completion; the logger does no internal concurrency
/// and never retries. Separate instances (e.g. one per worker process) do
/// not share their throttle, and search-then-create is not atomic on the
/// tracker, so concurrent identical errors in different instances can
/// still produce duplicate tickets.
pub struct TicketLogger {
    client: Box<dyn TicketClient>,
    formatter: Box<dyn DescriptionFormatter>,
    clock: Arc<dyn Clock>,
    options: LoggerOptions,
    throttle: SubmissionThrottle,
}

impl TicketLogger {
    /// Create a logger with the default formatter and the system clock
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the options fail validation.
    pub fn new(client: Box<dyn TicketClient>, options: LoggerOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let formatter = StringFormatter::from_options(&options)?;

        Ok(Self {
            client,
            formatter: Box::new(formatter),
            clock: Arc::new(SystemClock),
            throttle: SubmissionThrottle::new(options.try_resubmit_timeout),
            options,
        })
    }

    /// Replace the summary/description formatter
    pub fn with_formatter(mut self, formatter: Box<dyn DescriptionFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &LoggerOptions {
        &self.options
    }

    /// Throttle state, primarily for monitoring and tests
    pub fn throttle(&self) -> &SubmissionThrottle {
        &self.throttle
    }

    /// Drop expired throttle entries; returns how many were removed
    pub fn sweep_throttle(&mut self) -> usize {
        let now = self.clock.now();
        self.throttle.sweep_expired(now)
    }

    /// Log a message with extra context
    ///
    /// # Returns
    ///
    /// What happened on the tracker. A throttled submission is `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::Search`, `LoggerError::Comment` or
    /// `LoggerError::Create` when the corresponding tracker call fails.
    pub fn log(
        &mut self,
        severity: Severity,
        message: &str,
        context: Context,
    ) -> Result<Submission, LoggerError> {
        let event = ErrorEvent {
            severity,
            message: message.to_string(),
            context,
            session: None,
        };
        self.log_event(&event)
    }

    /// Log a prepared event, e.g. one carrying session data or a captured error
    pub fn log_event(&mut self, event: &ErrorEvent) -> Result<Submission, LoggerError> {
        let summary = self.prepare_summary(event.severity, &event.message);

        if let Some(ticket) = self.find_open_ticket(&summary)? {
            self.add_comment(&ticket, &summary)?;
            return Ok(Submission::Commented {
                summary,
                ticket_id: ticket.id,
            });
        }

        self.create_issue(summary, event)
    }

    /// Derive the ticket summary for an event
    pub fn prepare_summary(&self, severity: Severity, message: &str) -> String {
        self.formatter.summary(severity, message)
    }

    /// Find the first ticket named `summary` that is not in a closed status
    ///
    /// Results are taken in the order the tracker returns them (sorted by
    /// creation time on the tracker side).
    pub fn find_open_ticket(&self, summary: &str) -> Result<Option<Ticket>, LoggerError> {
        let query = SearchQuery::for_summary(self.options.project_id_to_check_for_issues, summary);
        let tickets = self.client.search(&query).map_err(LoggerError::Search)?;

        debug!(
            "Search for {} returned {} item(s)",
            query.search_string,
            tickets.len()
        );

        Ok(tickets
            .into_iter()
            .find(|ticket| !self.options.is_closed_status(&ticket.status.name)))
    }

    /// Append an "occurred again" note to a ticket's description
    pub fn add_comment(&self, ticket: &Ticket, summary: &str) -> Result<(), LoggerError> {
        let occurred_at = self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let description = format!(
            "{}{}- Error occurred again: {} {}",
            ticket.description(),
            self.options.line_break,
            occurred_at,
            summary
        );

        self.client
            .comment(ticket, &description)
            .map_err(|source| LoggerError::Comment {
                ticket_id: ticket.id,
                source,
            })?;

        info!("Added occurrence note to item {}: {}", ticket.id, summary);
        Ok(())
    }

    /// Create a ticket for `summary` unless it was created within the throttle window
    pub fn create_issue(
        &mut self,
        summary: String,
        event: &ErrorEvent,
    ) -> Result<Submission, LoggerError> {
        let now = self.clock.now();

        if !self.throttle.can_create_at(&summary, now) {
            debug!("Skipping recently submitted item: {}", summary);
            return Ok(Submission::Throttled { summary });
        }

        let ticket = NewTicket {
            item_type: self.options.item_type,
            name: summary.clone(),
            project_id: self.options.project_id,
            release_id: self.options.release_id,
            description: self.formatter.description(event, now),
        };

        let ticket_id = match self.client.create(&ticket) {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not create item for {}: {}", summary, e);
                return Err(LoggerError::Create(e));
            }
        };

        self.throttle.record_at(&summary, now);
        info!(
            "Created {} item {}: {}",
            self.options.item_type.endpoint(),
            ticket_id,
            summary
        );

        Ok(Submission::Created { summary, ticket_id })
    }
}
