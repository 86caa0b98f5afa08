//! Message rows as held by the client.
//!
//! Derives `Serialize` so snapshots can be handed straight to an embedding
//! UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotmess_shared::{MessageId, MessageRow, UserId};

/// Delivery state of one message row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Written locally, not yet confirmed by the server.
    Pending,
    /// Durably stored; `server_id` is always present in this state.
    Sent,
    /// The durable write did not complete; awaiting retry or dismissal.
    Failed,
}

/// One chat entry in a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalMessage {
    /// Stable row key for the UI.  Starts as a client-generated id for
    /// optimistic rows and is replaced by the server id on confirmation.
    pub local_id: MessageId,
    /// Canonical server id, present once the row is durably stored.
    pub server_id: Option<MessageId>,
    pub sender_id: UserId,
    /// Message text; immutable once created.
    pub body: String,
    /// Client-assigned at creation for optimistic rows, replaced by the
    /// server's authoritative timestamp on confirmation.
    pub created_at: DateTime<Utc>,
    pub delivery: Delivery,
}

impl LocalMessage {
    /// A freshly authored row, before any server confirmation.
    pub fn pending(sender_id: UserId, body: impl Into<String>) -> Self {
        Self {
            local_id: MessageId::new(),
            server_id: None,
            sender_id,
            body: body.into(),
            created_at: Utc::now(),
            delivery: Delivery::Pending,
        }
    }

    /// A row taken from durable storage: always `Sent`, keyed by its
    /// server id.
    pub fn from_row(row: &MessageRow) -> Self {
        Self {
            local_id: row.id,
            server_id: Some(row.id),
            sender_id: row.sender_id,
            body: row.body.clone(),
            created_at: row.created_at,
            delivery: Delivery::Sent,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.delivery == Delivery::Pending
    }

    pub fn is_sent(&self) -> bool {
        self.delivery == Delivery::Sent
    }

    pub fn is_failed(&self) -> bool {
        self.delivery == Delivery::Failed
    }
}
