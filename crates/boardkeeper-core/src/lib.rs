//! Rental lifecycle controller for boardkeeper
//!
//! This crate is the heart of boardkeeper, containing:
//! - Booking dialogue (ChoosingBoard -> EnteringHours -> Confirming -> commit)
//! - Active rental registry, one session per board
//! - Reminder scheduler with cancellable per-session timers
//! - History query engine over the ledger
//! - The `RentalService` facade that wires them together

mod dialogue;
mod error;
mod history;
mod notify;
mod registry;
mod scheduler;
mod service;

pub use dialogue::*;
pub use error::*;
pub use history::*;
pub use notify::*;
pub use registry::*;
pub use scheduler::*;
pub use service::*;
