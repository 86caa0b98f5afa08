//! # hotmess-store
//!
//! The client-held view of one thread's messages.
//!
//! [`ThreadStore`] is a pure in-memory structure: it performs no I/O and is
//! owned by exactly one session.  It holds the ordered message list, applies
//! optimistic inserts, and reconciles incoming change events against pending
//! rows so the sending user's own echo never duplicates.

pub mod models;
pub mod store;

pub use models::{Delivery, LocalMessage};
pub use store::{ReconcileOutcome, ThreadStore};
