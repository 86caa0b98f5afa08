//! # hotmess-client
//!
//! The session layer of the thread-chat client core.
//!
//! A [`ThreadSession`] owns one thread's local message store, sends
//! optimistically (the composer never blocks on the network), keeps a live
//! change-event subscription reconciling server confirmations and foreign
//! messages into the store, and tracks the thread's open/closed status for
//! composer gating.  The backend is an injected trait object, never a
//! global.

pub mod config;
pub mod events;
pub mod session;

mod backoff;
mod listener;
mod status;

pub use config::SessionConfig;
pub use events::{SubscriptionState, ThreadEvent};
pub use session::ThreadSession;
