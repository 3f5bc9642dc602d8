//! Spreadsheet mirror for boardkeeper
//!
//! The mirror is a secondary, human-browsable copy of the rental ledger.
//! Writes are best effort: the ledger stays authoritative, and rows that
//! cannot be delivered are retried in the background and eventually dropped.

mod disabled;
mod mock;
mod queue;
mod row;
mod traits;
mod webhook;

pub use disabled::*;
pub use mock::*;
pub use queue::*;
pub use row::*;
pub use traits::*;
pub use webhook::*;
