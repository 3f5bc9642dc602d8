//! Mirror row formatting

use boardkeeper_api::RentalRecord;
use boardkeeper_util::format_mirror;
use serde::{Deserialize, Serialize};

/// Column headers, in row order
pub const HEADER: [&str; 9] = [
    "User ID",
    "Board ID",
    "Board Name",
    "Admin ID",
    "Admin Name",
    "Start Time",
    "End Time",
    "Duration (h)",
    "Cost",
];

/// A ledger record rendered as spreadsheet cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRow {
    pub user_id: String,
    pub board_id: String,
    pub board_name: String,
    pub admin_id: String,
    pub admin_name: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: String,
    pub cost: String,
}

impl MirrorRow {
    /// Cells in header order
    pub fn cells(&self) -> [&str; 9] {
        [
            self.user_id.as_str(),
            self.board_id.as_str(),
            self.board_name.as_str(),
            self.admin_id.as_str(),
            self.admin_name.as_str(),
            self.start_time.as_str(),
            self.end_time.as_str(),
            self.duration.as_str(),
            self.cost.as_str(),
        ]
    }
}

impl From<&RentalRecord> for MirrorRow {
    fn from(record: &RentalRecord) -> Self {
        Self {
            user_id: record.user_id.to_string(),
            board_id: record.board_id.to_string(),
            board_name: record.board_name.clone(),
            admin_id: record.admin_id.to_string(),
            admin_name: record.admin_name.clone(),
            start_time: format_mirror(&record.start_time),
            end_time: record
                .end_time
                .as_ref()
                .map(format_mirror)
                .unwrap_or_else(|| "-".to_string()),
            duration: format!("{:.2}", record.duration_hours),
            cost: format!("{:.2}", record.cost),
        }
    }
}
