//! Rental error taxonomy

use boardkeeper_api::{DurationError, Reply};
use boardkeeper_store::StoreError;
use boardkeeper_util::BoardId;
use chrono::{DateTime, Local};
use thiserror::Error;

/// Failures of rental operations; each one maps to a chat reply
#[derive(Debug, Error)]
pub enum RentalError {
    #[error("Caller is not an administrator")]
    Unauthorized,

    #[error("Invalid duration: {0}")]
    InvalidDuration(#[from] DurationError),

    #[error("Unknown board: {0}")]
    UnknownBoard(BoardId),

    #[error("No active rental for board {0}")]
    NoActiveRental(BoardId),

    #[error("Board {board_id} is rented until {ends_at}")]
    BoardBusy {
        board_id: BoardId,
        ends_at: DateTime<Local>,
    },

    #[error("Ledger write failed: {0}")]
    Persistence(#[from] StoreError),
}

impl RentalError {
    pub fn into_reply(self) -> Reply {
        match self {
            RentalError::Unauthorized => Reply::NotAuthorized,
            RentalError::InvalidDuration(error) => Reply::InvalidDuration { error },
            RentalError::UnknownBoard(board_id) => Reply::UnknownBoard { board_id },
            RentalError::NoActiveRental(board_id) => Reply::NoActiveRental { board_id },
            RentalError::BoardBusy { board_id, ends_at } => Reply::BoardBusy { board_id, ends_at },
            RentalError::Persistence(_) => Reply::PersistenceFailed,
        }
    }
}

pub type RentalResult<T> = Result<T, RentalError>;
