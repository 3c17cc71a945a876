use crate::events::Timestamp;
use chrono::Duration;
use std::collections::HashMap;

/// Throttle for preventing duplicate ticket creation
///
/// Remembers when each summary last produced a ticket and refuses a new
/// creation for the same summary until the window has elapsed.
///
/// Entries are evicted lazily, when a summary is checked again after its
/// window. A host that logs many distinct summaries over a long lifetime
/// grows this map without bound unless it calls [`sweep_expired`].
///
/// [`sweep_expired`]: SubmissionThrottle::sweep_expired
#[derive(Debug)]
pub struct SubmissionThrottle {
    /// Minimum time between creations for one summary
    window: Duration,
    /// Summary -> time of last successful creation
    submitted: HashMap<String, Timestamp>,
}

impl Default for SubmissionThrottle {
    fn default() -> Self {
        Self::new(5) // Default: 5 seconds
    }
}

impl SubmissionThrottle {
    /// Create a throttle with a window of `window_seconds`
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window: i64::try_from(window_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            submitted: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check whether a ticket may be created for `summary` at `now`
    ///
    /// An entry whose window has elapsed is removed as part of the check.
    pub fn can_create_at(&mut self, summary: &str, now: Timestamp) -> bool {
        let Some(&last) = self.submitted.get(summary) else {
            return true;
        };

        if now - last >= self.window {
            self.submitted.remove(summary);
            return true;
        }

        false
    }

    /// Record a successful creation for `summary` at `now`
    pub fn record_at(&mut self, summary: &str, now: Timestamp) {
        self.submitted.insert(summary.to_string(), now);
    }

    /// When `summary` last produced a ticket, if it is still tracked
    pub fn last_submitted(&self, summary: &str) -> Option<Timestamp> {
        self.submitted.get(summary).copied()
    }

    /// Drop every entry whose window has elapsed; returns how many were removed
    ///
    /// Removing only expired entries leaves throttle decisions unchanged.
    pub fn sweep_expired(&mut self, now: Timestamp) -> usize {
        let before = self.submitted.len();
        let window = self.window;
        self.submitted.retain(|_, &mut last| now - last < window);
        before - self.submitted.len()
    }

    pub fn len(&self) -> usize {
        self.submitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submitted.is_empty()
    }
}
