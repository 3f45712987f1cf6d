//! Retry policies for the two fetch classes.

use std::time::Duration;

/// Status-code handling class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Page and API fetches: every failure counts against the budget and
    /// grows the next attempt's timeout.
    PageApi,
    /// Segment fetches: 429 retries immediately without consuming budget,
    /// 410 terminates with an expired error, and only transport failures
    /// grow the timeout.
    Segment,
}

/// Bounded-retry parameters for one fetch call site.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub kind: PolicyKind,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_timeout: Duration,
    /// Added to the timeout when an attempt fails (see [`PolicyKind`]).
    pub timeout_increment: Duration,
    /// Pause between attempts.
    pub pause: Duration,
}

impl FetchPolicy {
    pub fn page_api() -> Self {
        Self {
            kind: PolicyKind::PageApi,
            max_retries: 5,
            initial_timeout: Duration::from_secs(10),
            timeout_increment: Duration::from_secs(30),
            pause: Duration::from_millis(200),
        }
    }

    pub fn segment() -> Self {
        Self {
            kind: PolicyKind::Segment,
            max_retries: 5,
            initial_timeout: Duration::from_secs(10),
            timeout_increment: Duration::from_secs(30),
            pause: Duration::from_secs(1),
        }
    }
}
