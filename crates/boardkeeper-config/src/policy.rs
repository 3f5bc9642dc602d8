//! Validated policy structures

use crate::schema::{RawConfig, RawMirror, RawRental, RawServiceConfig};
use boardkeeper_api::Board;
use boardkeeper_util::{default_data_dir, default_socket_path, BoardId, UserId};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MIN_HOURS: f64 = 0.5;
pub const DEFAULT_MAX_HOURS: f64 = 12.0;
pub const DEFAULT_WARNING_LEAD_SECS: u64 = 300;
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 10;
pub const DEFAULT_MIRROR_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MIRROR_BACKOFF_MS: u64 = 500;

/// Validated policy, immutable for the lifetime of the service
#[derive(Debug, Clone)]
pub struct Policy {
    pub service: ServiceConfig,
    pub rental: RentalPolicy,
    pub admins: AdminList,
    pub catalog: BoardCatalog,
    /// `None` when no mirror is configured
    pub mirror: Option<MirrorPolicy>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            rental: RentalPolicy::from_raw(raw.rental),
            admins: AdminList::new(raw.admins.into_iter().map(UserId::new)),
            catalog: BoardCatalog::new(
                raw.boards
                    .into_iter()
                    .map(|b| Board::new(b.id, b.name))
                    .collect(),
            ),
            mirror: raw.mirror.map(MirrorPolicy::from_raw),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Pricing and duration limits
#[derive(Debug, Clone, PartialEq)]
pub struct RentalPolicy {
    pub hourly_rate: f64,
    pub min_hours: f64,
    pub max_hours: f64,
    /// Lead time of the "about to end" warning
    pub warning_lead: Duration,
    pub history_page_size: usize,
}

impl RentalPolicy {
    fn from_raw(raw: RawRental) -> Self {
        Self {
            hourly_rate: raw.hourly_rate,
            min_hours: raw.min_hours.unwrap_or(DEFAULT_MIN_HOURS),
            max_hours: raw.max_hours.unwrap_or(DEFAULT_MAX_HOURS),
            warning_lead: Duration::from_secs(
                raw.warning_lead_seconds.unwrap_or(DEFAULT_WARNING_LEAD_SECS),
            ),
            history_page_size: raw.history_page_size.unwrap_or(DEFAULT_HISTORY_PAGE_SIZE),
        }
    }

    /// Policy with the given rate and default limits
    pub fn with_rate(hourly_rate: f64) -> Self {
        Self {
            hourly_rate,
            min_hours: DEFAULT_MIN_HOURS,
            max_hours: DEFAULT_MAX_HOURS,
            warning_lead: Duration::from_secs(DEFAULT_WARNING_LEAD_SECS),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }

    /// Price of a rental, rounded to two decimals
    pub fn cost_for(&self, hours: f64) -> f64 {
        (self.hourly_rate * hours * 100.0).round() / 100.0
    }
}

/// Static administrator allow-list
#[derive(Debug, Clone, Default)]
pub struct AdminList(HashSet<UserId>);

impl AdminList {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.0.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Board catalog in menu order
#[derive(Debug, Clone, Default)]
pub struct BoardCatalog {
    boards: Vec<Board>,
}

impl BoardCatalog {
    pub fn new(boards: Vec<Board>) -> Self {
        Self { boards }
    }

    pub fn get(&self, id: &BoardId) -> Option<&Board> {
        self.boards.iter().find(|b| &b.id == id)
    }

    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    pub fn ids(&self) -> Vec<BoardId> {
        self.boards.iter().map(|b| b.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}

/// Spreadsheet mirror settings
#[derive(Debug, Clone)]
pub struct MirrorPolicy {
    pub endpoint: String,
    pub spreadsheet_id: String,
    pub view_url_template: String,
    pub auth_token: Option<String>,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl MirrorPolicy {
    fn from_raw(raw: RawMirror) -> Self {
        Self {
            endpoint: raw.endpoint,
            spreadsheet_id: raw.spreadsheet_id,
            view_url_template: raw.view_url_template,
            auth_token: raw.auth_token,
            max_attempts: raw.max_attempts.unwrap_or(DEFAULT_MIRROR_MAX_ATTEMPTS),
            initial_backoff: Duration::from_millis(
                raw.initial_backoff_ms.unwrap_or(DEFAULT_MIRROR_BACKOFF_MS),
            ),
        }
    }

    /// Viewing URL handed out by `/export`
    pub fn view_url(&self) -> String {
        self.view_url_template
            .replace("{sheet_id}", &self.spreadsheet_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_is_rounded_to_cents() {
        let policy = RentalPolicy::with_rate(500.0);
        assert_eq!(policy.cost_for(2.0), 1000.0);
        assert_eq!(policy.cost_for(0.5), 250.0);

        let odd = RentalPolicy::with_rate(333.333);
        assert_eq!(odd.cost_for(1.0), 333.33);
    }

    #[test]
    fn catalog_lookup() {
        let catalog = BoardCatalog::new(vec![Board::new("1", "Alpha"), Board::new("2", "Bravo")]);

        assert_eq!(catalog.get(&BoardId::new("2")).unwrap().name, "Bravo");
        assert!(catalog.get(&BoardId::new("3")).is_none());
        assert_eq!(catalog.ids(), vec![BoardId::new("1"), BoardId::new("2")]);
    }

    #[test]
    fn admin_list_membership() {
        let admins = AdminList::new([UserId::new(10), UserId::new(20)]);
        assert!(admins.contains(UserId::new(10)));
        assert!(!admins.contains(UserId::new(30)));
    }

    #[test]
    fn mirror_view_url_substitutes_sheet_id() {
        let mirror = MirrorPolicy {
            endpoint: "https://sheets.example/append".into(),
            spreadsheet_id: "abc123".into(),
            view_url_template: "https://sheets.example/d/{sheet_id}/view".into(),
            auth_token: None,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
        };
        assert_eq!(mirror.view_url(), "https://sheets.example/d/abc123/view");
    }
}
