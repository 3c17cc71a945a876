/// Deduplicating ticket submission and its throttle
pub mod engine;
pub mod throttle;

pub use engine::{Submission, TicketLogger};
pub use throttle::SubmissionThrottle;
