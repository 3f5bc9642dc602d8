//! Protocol types for boardkeeper
//!
//! This crate defines the stable API between the rental service and the
//! chat gateways that front it:
//! - Chat inputs (typed commands, button presses, free text)
//! - Replies (one per handled input)
//! - Notifications (scheduler -> administrator)
//! - IPC request/response/event envelopes and versioning

mod commands;
mod events;
mod replies;
mod types;

pub use commands::*;
pub use events::*;
pub use replies::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
