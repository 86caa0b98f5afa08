//! The ordered, client-held message list for one thread, and the
//! reconciliation of incoming change events against it.

use hotmess_shared::constants::RECONCILE_WINDOW_SECS;
use hotmess_shared::{MessageId, MessageRow, UserId};

use crate::models::{Delivery, LocalMessage};

/// What a [`ThreadStore::reconcile`] call did.
///
/// Reconciliation never fails; unexpected events degrade to one of these
/// outcomes instead of raising an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event duplicated a row already present; nothing changed.
    Duplicate,
    /// A pending optimistic row was confirmed in place and rekeyed to its
    /// server id.
    Confirmed { previous_local_id: MessageId },
    /// No candidate matched; the event was appended as a new sent row.
    Appended,
}

/// The canonical, ordered view of one thread's messages for the current
/// session.
///
/// Invariants, enforced after every mutation:
///
/// * at most one row per `local_id`,
/// * a `Sent` row always carries a `server_id`,
/// * rows are sorted by `created_at` ascending.
///
/// The store is single-writer by construction: it is owned by one session
/// and never shared between threads of control except behind that session's
/// lock.  No I/O happens here.
#[derive(Debug, Default)]
pub struct ThreadStore {
    entries: Vec<LocalMessage>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all `Sent` rows with a durable-storage snapshot, preserving
    /// any `Pending` or `Failed` rows untouched.
    ///
    /// A background refresh must never clobber in-flight optimistic writes.
    pub fn load(&mut self, initial: &[MessageRow]) {
        let in_flight: Vec<LocalMessage> = self
            .entries
            .drain(..)
            .filter(|m| !m.is_sent())
            .collect();

        self.entries = initial.iter().map(LocalMessage::from_row).collect();
        self.entries.extend(in_flight);
        self.resort();
    }

    /// Append a locally authored row in the `Pending` state and return its
    /// client-generated key.
    pub fn insert_optimistic(&mut self, sender_id: UserId, body: impl Into<String>) -> MessageId {
        let message = LocalMessage::pending(sender_id, body);
        let local_id = message.local_id;
        self.entries.push(message);
        self.resort();
        local_id
    }

    /// Confirm an optimistic row from the write path's own success result.
    ///
    /// This is the primary confirmation route: the durable write returns the
    /// stored row synchronously, so no heuristic is needed.  It may race the
    /// change feed in either order:
    ///
    /// * if the feed already confirmed the row (rekeyed to `row.id`), this
    ///   is a no-op;
    /// * if the feed appended `row.id` as a foreign message before the
    ///   optimistic insert was recorded, the still-pending duplicate is
    ///   removed so exactly one sent row remains.
    ///
    /// Returns `true` if the store changed.
    pub fn confirm(&mut self, local_id: MessageId, row: &MessageRow) -> bool {
        let already_present = self
            .entries
            .iter()
            .any(|m| m.local_id == row.id || m.server_id == Some(row.id));

        if already_present {
            if let Some(pos) = self
                .entries
                .iter()
                .position(|m| m.local_id == local_id && m.is_pending())
            {
                self.entries.remove(pos);
                return true;
            }
            return false;
        }

        match self
            .entries
            .iter_mut()
            .find(|m| m.local_id == local_id && m.is_pending())
        {
            Some(entry) => {
                entry.local_id = row.id;
                entry.server_id = Some(row.id);
                entry.created_at = row.created_at;
                entry.delivery = Delivery::Sent;
                self.resort();
                true
            }
            None => false,
        }
    }

    /// Apply an incoming change event.
    ///
    /// 1. If a row already carries this server id (as `server_id` or as its
    ///    `local_id`), the event is a duplicate and is dropped.
    /// 2. Otherwise the first `Pending` row with the same sender, identical
    ///    body, and a timestamp within the reconcile window is confirmed in
    ///    place: it takes the server id as its key and the server's
    ///    authoritative timestamp.
    /// 3. Otherwise the event is a message from elsewhere and is appended as
    ///    a new `Sent` row.
    ///
    /// Idempotent: applying the same event twice never duplicates a row or
    /// changes state a second time.
    pub fn reconcile(&mut self, row: &MessageRow) -> ReconcileOutcome {
        if self
            .entries
            .iter()
            .any(|m| m.server_id == Some(row.id) || m.local_id == row.id)
        {
            return ReconcileOutcome::Duplicate;
        }

        let window_ms = RECONCILE_WINDOW_SECS * 1000;
        let candidate = self.entries.iter_mut().find(|m| {
            m.is_pending()
                && m.sender_id == row.sender_id
                && m.body == row.body
                && (m.created_at - row.created_at).num_milliseconds().abs() < window_ms
        });

        if let Some(entry) = candidate {
            let previous_local_id = entry.local_id;
            entry.local_id = row.id;
            entry.server_id = Some(row.id);
            entry.created_at = row.created_at;
            entry.delivery = Delivery::Sent;
            self.resort();
            return ReconcileOutcome::Confirmed { previous_local_id };
        }

        self.entries.push(LocalMessage::from_row(row));
        self.resort();
        ReconcileOutcome::Appended
    }

    /// Transition a `Pending` row to `Failed`.
    ///
    /// No-op (returns `false`) if the row is missing or already confirmed.
    pub fn mark_failed(&mut self, local_id: MessageId) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|m| m.local_id == local_id && m.is_pending())
        {
            Some(entry) => {
                entry.delivery = Delivery::Failed;
                true
            }
            None => false,
        }
    }

    /// Delete a row by key; used to dismiss a failed send.
    pub fn remove(&mut self, local_id: MessageId) -> Option<LocalMessage> {
        let pos = self.entries.iter().position(|m| m.local_id == local_id)?;
        Some(self.entries.remove(pos))
    }

    /// All rows, sorted by `created_at` ascending.
    pub fn messages(&self) -> &[LocalMessage] {
        &self.entries
    }

    pub fn get(&self, local_id: MessageId) -> Option<&LocalMessage> {
        self.entries.iter().find(|m| m.local_id == local_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resort(&mut self) {
        // Stable: rows with equal timestamps keep their insertion order.
        self.entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }
}
