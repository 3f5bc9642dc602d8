//! Shared domain types for the boardkeeper API

use boardkeeper_util::{BoardId, SessionId, UserId};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Catalog entry for a rentable board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
}

impl Board {
    pub fn new(id: impl Into<BoardId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Who sent a chat input, as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub display_name: String,
}

impl Caller {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

/// Point-in-time view of an active rental session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub board_id: BoardId,
    pub board_name: String,
    pub renter_id: UserId,
    pub admin_id: UserId,
    pub admin_name: String,
    pub started_at: DateTime<Local>,
    pub ends_at: DateTime<Local>,
    pub duration_hours: f64,
    pub cost: f64,
}

/// Ledger row identifier, assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

/// Immutable ledger entry describing a booked rental
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub board_id: BoardId,
    pub board_name: String,
    pub admin_id: UserId,
    pub admin_name: String,
    pub start_time: DateTime<Local>,
    /// `None` when the stored row carries the "-" sentinel
    pub end_time: Option<DateTime<Local>>,
    pub duration_hours: f64,
    pub cost: f64,
}

/// Message the scheduler sends to the administrator responsible for a rental
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The rental is about to run out
    Warning {
        board_id: BoardId,
        board_name: String,
        admin_name: String,
        remaining: Duration,
    },
    /// The rental ran its full duration and the board is free again
    Completed { board_id: BoardId, board_name: String },
}

impl Notification {
    pub fn board_id(&self) -> &BoardId {
        match self {
            Notification::Warning { board_id, .. } | Notification::Completed { board_id, .. } => {
                board_id
            }
        }
    }
}

/// Why a rental duration was rejected
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationError {
    #[error("Enter a number, for example: 0.5, 1.5, 2")]
    NotANumber,

    #[error("The minimum rental time is {min_hours} h. Try again:")]
    TooShort { min_hours: f64 },

    #[error("The maximum rental time is {max_hours} h. Try again:")]
    TooLong { max_hours: f64 },
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ledger_ok: bool,
    pub mirror_enabled: bool,
    pub active_rentals: usize,
}
