//! Error taxonomy for resolution, download, and scheduling.
//!
//! Only `Transport` (and retryable HTTP statuses, which the retry module
//! handles before an error ever surfaces) is retried; every other variant
//! propagates to the caller unmodified. At the scheduler boundary each
//! manifest's terminal error is caught, logged, and recorded in the state
//! log so sibling downloads keep running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DlError {
    /// Network-level failure (connect, DNS, timeout). Retried with a growing
    /// per-request timeout before it becomes terminal.
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),

    /// Terminal HTTP failure after the retry budget: last status plus a
    /// truncated response body.
    #[error("status code: {status}, {body}")]
    Status { status: u32, body: String },

    /// Unexpected page/API/manifest shape. The session or host contract
    /// changed; retrying will not help.
    ///
    /// Invalid-session and quota-exhausted answers from the API are not
    /// errors on this level; the resolver classifies them as `NeedsAuth`
    /// and `RateLimited` outcomes.
    #[error("protocol: {0}")]
    Protocol(String),

    /// HTTP 410: the segment URL expired and the fetch is abandoned.
    #[error("download expired")]
    Expired,

    /// Malformed Resolution Target or degenerate download window. Surfaced
    /// immediately, never retried.
    #[error("validation: {0}")]
    Validation(String),

    /// The abort flag was observed at a checkpoint.
    #[error("aborting")]
    Cancelled,

    /// Local file I/O failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl DlError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        DlError::Protocol(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DlError::Validation(msg.into())
    }
}
