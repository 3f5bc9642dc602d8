//! SQLite-based ledger implementation

use boardkeeper_api::{RecordId, RentalRecord};
use boardkeeper_util::{BoardId, UserId};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{Ledger, NewRentalRecord, StoreError, StoreResult};

/// Stored in place of an absent end time
const NO_END_TIME: &str = "-";

/// SQLite-based ledger
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open or create a ledger at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory ledger (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS rentals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                board_id TEXT NOT NULL,
                board_name TEXT NOT NULL,
                admin_id INTEGER NOT NULL,
                admin_name TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration REAL NOT NULL,
                cost REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rentals_start ON rentals(start_time);
            "#,
        )?;

        debug!("Ledger schema initialized");
        Ok(())
    }
}

fn parse_timestamp(id: i64, raw: &str) -> StoreResult<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| StoreError::Corrupt {
            id,
            message: format!("bad timestamp {:?}: {}", raw, e),
        })
}

impl Ledger for SqliteLedger {
    fn append(&self, record: NewRentalRecord) -> StoreResult<RecordId> {
        let conn = self.lock()?;
        let end_time = record
            .end_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| NO_END_TIME.to_string());

        conn.execute(
            r#"
            INSERT INTO rentals (
                user_id, board_id, board_name, admin_id, admin_name,
                start_time, end_time, duration, cost
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.user_id.get(),
                record.board_id.as_str(),
                record.board_name,
                record.admin_id.get(),
                record.admin_name,
                record.start_time.to_rfc3339(),
                end_time,
                record.duration_hours,
                record.cost,
            ],
        )?;

        let id = RecordId(conn.last_insert_rowid());
        debug!(record_id = id.0, board_id = %record.board_id, "Rental record appended");
        Ok(id)
    }

    fn query_all(&self) -> StoreResult<Vec<RentalRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, board_id, board_name, admin_id, admin_name,
                   start_time, end_time, duration, cost
            FROM rentals
            ORDER BY id DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, f64>(8)?,
                row.get::<_, f64>(9)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, user_id, board_id, board_name, admin_id, admin_name, start, end, duration, cost) =
                row?;

            let start_time = parse_timestamp(id, &start)?;
            let end_time = if end == NO_END_TIME {
                None
            } else {
                Some(parse_timestamp(id, &end)?)
            };

            records.push(RentalRecord {
                id: RecordId(id),
                user_id: UserId::new(user_id),
                board_id: BoardId::new(board_id),
                board_name,
                admin_id: UserId::new(admin_id),
                admin_name,
                start_time,
                end_time,
                duration_hours: duration,
                cost,
            });
        }

        // RFC 3339 text does not sort chronologically across offsets; order on
        // the parsed instant. The sort is stable, so id DESC breaks ties.
        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        Ok(records)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Ledger lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn record(board: &str, admin: i64, start: DateTime<Local>) -> NewRentalRecord {
        NewRentalRecord {
            user_id: UserId::new(admin),
            board_id: BoardId::new(board),
            board_name: format!("Board {}", board),
            admin_id: UserId::new(admin),
            admin_name: "Anna".into(),
            start_time: start,
            end_time: Some(start + Duration::hours(2)),
            duration_hours: 2.0,
            cost: 1000.0,
        }
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteLedger::in_memory().unwrap();
        assert!(store.is_healthy());
        assert!(store.query_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_read_back() {
        let store = SqliteLedger::in_memory().unwrap();

        let id = store.append(record("1", 42, at(10))).unwrap();

        let records = store.query_all().unwrap();
        assert_eq!(records.len(), 1);
        let stored = &records[0];
        assert_eq!(stored.id, id);
        assert_eq!(stored.board_id, BoardId::new("1"));
        assert_eq!(stored.admin_id, UserId::new(42));
        assert_eq!(stored.start_time, at(10));
        assert_eq!(stored.end_time, Some(at(12)));
        assert_eq!(stored.cost, 1000.0);
    }

    #[test]
    fn test_newest_first_with_id_tiebreak() {
        let store = SqliteLedger::in_memory().unwrap();

        let early = store.append(record("1", 1, at(8))).unwrap();
        let late = store.append(record("2", 1, at(14))).unwrap();
        let tie_a = store.append(record("3", 1, at(11))).unwrap();
        let tie_b = store.append(record("4", 1, at(11))).unwrap();

        let ids: Vec<_> = store.query_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![late, tie_b, tie_a, early]);
    }

    #[test]
    fn test_missing_end_time_uses_sentinel() {
        let store = SqliteLedger::in_memory().unwrap();

        let mut open_ended = record("1", 1, at(9));
        open_ended.end_time = None;
        store.append(open_ended).unwrap();

        let raw: String = store
            .lock()
            .unwrap()
            .query_row("SELECT end_time FROM rentals", [], |row| row.get(0))
            .unwrap();
        assert_eq!(raw, "-");
        assert!(store.query_all().unwrap()[0].end_time.is_none());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rentals.db");

        {
            let store = SqliteLedger::open(&path).unwrap();
            store.append(record("1", 7, at(10))).unwrap();
        }

        let store = SqliteLedger::open(&path).unwrap();
        let records = store.query_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].admin_id, UserId::new(7));
    }
}
