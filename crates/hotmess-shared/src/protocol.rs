//! Change-event wire contract.
//!
//! The subscription transport delivers loosely-shaped JSON (`{ "new": row }`
//! envelopes).  Nothing downstream of this module touches raw JSON: events
//! are parsed into the typed rows here at the subscription boundary, and
//! malformed events are rejected by the caller instead of trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::types::{MessageId, ThreadId, ThreadStatus, UserId};

/// One event delivered on a change topic.
///
/// The payload is kept loose on purpose; its shape is only asserted when a
/// typed row is extracted with [`MessageRow::from_change`] or
/// [`StatusRow::from_change`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Topic the event was published on.
    pub topic: String,
    /// Raw event payload as shipped by the transport.
    pub payload: serde_json::Value,
}

impl ChangeEvent {
    /// Wrap a serializable row in the `{ "new": row }` envelope.
    pub fn with_row<T: Serialize>(topic: impl Into<String>, row: &T) -> Self {
        Self {
            topic: topic.into(),
            payload: serde_json::json!({ "new": row }),
        }
    }
}

/// A durably stored message row, as it appears on the wire and in initial
/// load responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRow {
    /// Server-assigned canonical id.
    pub id: MessageId,
    pub thread_id: ThreadId,
    #[serde(rename = "sender_user_id")]
    pub sender_id: UserId,
    pub body: String,
    /// Authoritative server timestamp.
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Extract a typed message row from an insert event.
    pub fn from_change(event: &ChangeEvent) -> Result<Self, PayloadError> {
        let row = event
            .payload
            .get("new")
            .ok_or(PayloadError::MissingRow)?;
        Ok(serde_json::from_value(row.clone())?)
    }
}

/// A thread row's observable slice: its id and lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRow {
    pub id: ThreadId,
    pub status: ThreadStatus,
}

impl StatusRow {
    /// Extract a typed status row from an update event.
    pub fn from_change(event: &ChangeEvent) -> Result<Self, PayloadError> {
        let row = event
            .payload
            .get("new")
            .ok_or(PayloadError::MissingRow)?;
        Ok(serde_json::from_value(row.clone())?)
    }
}
