use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Participant identity, as issued by the hosted auth service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One conversation scope (a connect or ticket thread).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ThreadId(pub Uuid);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier.
///
/// Client-generated (v4) for optimistic rows; once the server confirms a
/// row, the local key is replaced by the server-assigned id, so a `Sent`
/// message is always keyed by its durable id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two thread families in the product.
///
/// Each family has its own message and thread tables on the backend, and
/// change-event topics are keyed by (table, thread id).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ThreadKind {
    Connect,
    Ticket,
}

impl ThreadKind {
    /// Backend table holding this family's messages.
    pub fn messages_table(&self) -> &'static str {
        match self {
            Self::Connect => "connect_messages",
            Self::Ticket => "ticket_messages",
        }
    }

    /// Backend table holding this family's thread rows (status lives here).
    pub fn threads_table(&self) -> &'static str {
        match self {
            Self::Connect => "connect_threads",
            Self::Ticket => "ticket_threads",
        }
    }

    /// Topic carrying insert events for one thread's messages.
    pub fn message_topic(&self, thread: ThreadId) -> String {
        format!("{}:thread:{}", self.messages_table(), thread)
    }

    /// Topic carrying status updates for one thread.
    pub fn status_topic(&self, thread: ThreadId) -> String {
        format!("{}:status:{}", self.threads_table(), thread)
    }
}

/// Open/closed lifecycle flag of a thread, owned by the server.
///
/// `Unknown` is the client-side value before the first load completes.
/// Unexpected wire values also map to `Unknown` rather than failing the
/// whole payload.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Open,
    Closed,
    Unknown,
}

impl<'de> Deserialize<'de> for ThreadStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(match value.as_str() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            _ => Self::Unknown,
        })
    }
}

impl ThreadStatus {
    /// Whether the composer should accept new messages.
    ///
    /// Only a definite `Closed` gates the composer; an unknown status is
    /// treated as open, matching the production UI.
    pub fn allows_posting(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}
