use thiserror::Error;

use crate::types::ThreadId;

/// Rejections surfaced synchronously by the send path.
///
/// Only validation-class problems appear here: a failed durable write is
/// never raised to the caller, it is reported through the message's
/// delivery state instead.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SendError {
    #[error("message body is empty")]
    EmptyBody,

    #[error("message body exceeds {limit} characters (got {len})")]
    BodyTooLong { len: usize, limit: usize },

    #[error("thread is closed")]
    ThreadClosed,

    #[error("only failed messages can be retried")]
    NotRetryable,
}

/// Errors crossing the backend boundary.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport-level failure (network error, timeout, 5xx).
    #[error("backend request failed: {0}")]
    Request(String),

    /// The referenced thread does not exist on the backend.
    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    /// The backend refused the write (policy, closed thread, etc.).
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// A change event that could not be interpreted.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// The `{ "new": row }` envelope was missing.
    #[error("change event carries no row")]
    MissingRow,

    /// The row was present but did not match the expected shape.
    #[error("malformed change row: {0}")]
    Shape(#[from] serde_json::Error),
}
