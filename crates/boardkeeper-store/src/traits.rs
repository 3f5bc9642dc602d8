//! Store trait definitions

use boardkeeper_api::{RecordId, RentalRecord};
use boardkeeper_util::{BoardId, UserId};
use chrono::{DateTime, Local};

use crate::StoreResult;

/// A rental about to be written to the ledger; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewRentalRecord {
    pub user_id: UserId,
    pub board_id: BoardId,
    pub board_name: String,
    pub admin_id: UserId,
    pub admin_name: String,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub duration_hours: f64,
    pub cost: f64,
}

impl NewRentalRecord {
    /// Attach the store-assigned id
    pub fn into_record(self, id: RecordId) -> RentalRecord {
        RentalRecord {
            id,
            user_id: self.user_id,
            board_id: self.board_id,
            board_name: self.board_name,
            admin_id: self.admin_id,
            admin_name: self.admin_name,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_hours: self.duration_hours,
            cost: self.cost,
        }
    }
}

/// Append-only rental ledger
pub trait Ledger: Send + Sync {
    /// Durably append a record and return its id
    fn append(&self, record: NewRentalRecord) -> StoreResult<RecordId>;

    /// All records, newest `start_time` first (ties broken by id, newest first)
    fn query_all(&self) -> StoreResult<Vec<RentalRecord>>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
