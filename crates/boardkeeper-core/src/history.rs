//! History query engine over the ledger

use boardkeeper_api::{HistoryFilter, HistoryPage, RentalRecord};

/// Whether `record` passes every filter that is set
pub fn matches_filter(record: &RentalRecord, filter: &HistoryFilter) -> bool {
    filter.board.as_ref().is_none_or(|b| &record.board_id == b)
        && filter.admin.is_none_or(|a| record.admin_id == a)
}

/// Filter, order newest first and cap to `page_size`.
///
/// Each call starts from the top; there is no cursor.
pub fn query_history(
    mut records: Vec<RentalRecord>,
    filter: &HistoryFilter,
    page_size: usize,
) -> HistoryPage {
    records.retain(|r| matches_filter(r, filter));
    // Stable, so the ledger's tie order survives
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time));

    let suppressed = records.len().saturating_sub(page_size);
    records.truncate(page_size);

    HistoryPage {
        entries: records,
        suppressed,
    }
}
