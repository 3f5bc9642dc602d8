//! Shared utilities for boardkeeper
//!
//! This crate provides:
//! - ID types (BoardId, UserId, SessionId, ClientId)
//! - Wall-clock helpers (mockable `now()`, display formats)
//! - Default paths for config, socket and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
