//! # hotmess-shared
//!
//! Types shared across the HOTMESS thread-chat client core: identifier
//! newtypes, the change-event wire contract, the error taxonomy, and
//! protocol constants.
//!
//! Everything here is plain data.  No I/O happens in this crate.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{BackendError, PayloadError, SendError};
pub use protocol::{ChangeEvent, MessageRow, StatusRow};
pub use types::{MessageId, ThreadId, ThreadKind, ThreadStatus, UserId};
