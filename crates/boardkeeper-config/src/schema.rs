//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Administrator allow-list (chat user ids)
    #[serde(default)]
    pub admins: Vec<i64>,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Pricing and duration limits
    pub rental: RawRental,

    /// Board catalog, in menu order
    #[serde(default)]
    pub boards: Vec<RawBoard>,

    /// Spreadsheet mirror; absent disables it
    #[serde(default)]
    pub mirror: Option<RawMirror>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket for chat gateways
    pub socket_path: Option<PathBuf>,

    /// Directory holding the ledger database
    pub data_dir: Option<PathBuf>,
}

/// Pricing and duration limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRental {
    /// Price per hour, in currency units
    pub hourly_rate: f64,

    /// Shortest bookable duration in hours (default 0.5)
    pub min_hours: Option<f64>,

    /// Longest bookable duration in hours (default 12)
    pub max_hours: Option<f64>,

    /// How long before the end the warning goes out (default 300)
    pub warning_lead_seconds: Option<u64>,

    /// History records shown per query (default 10)
    pub history_page_size: Option<usize>,
}

/// Board catalog entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawBoard {
    pub id: String,
    pub name: String,
}

/// Spreadsheet mirror settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawMirror {
    /// Webhook that appends one row per POST
    pub endpoint: String,

    /// Spreadsheet identifier substituted into `view_url_template`
    pub spreadsheet_id: String,

    /// Viewing URL; `{sheet_id}` is replaced with `spreadsheet_id`
    #[serde(default = "default_view_url_template")]
    pub view_url_template: String,

    /// Bearer token sent with each request
    pub auth_token: Option<String>,

    /// Delivery attempts per row before it is dropped (default 5)
    pub max_attempts: Option<u32>,

    /// First retry delay, doubled after each failure (default 500)
    pub initial_backoff_ms: Option<u64>,
}

fn default_view_url_template() -> String {
    "https://docs.google.com/spreadsheets/d/{sheet_id}/view?usp=sharing".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1
            admins = [111, 222]

            [service]
            data_dir = "/var/lib/boardkeeper"

            [rental]
            hourly_rate = 500.0
            max_hours = 8

            [[boards]]
            id = "1"
            name = "Alpha"

            [[boards]]
            id = "2"
            name = "Bravo"

            [mirror]
            endpoint = "https://sheets.example/append"
            spreadsheet_id = "abc123"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.admins, vec![111, 222]);
        assert_eq!(config.boards.len(), 2);
        assert_eq!(config.rental.max_hours, Some(8.0));
        assert!(config.rental.min_hours.is_none());

        let mirror = config.mirror.unwrap();
        assert!(mirror.view_url_template.contains("{sheet_id}"));
        assert!(mirror.auth_token.is_none());
    }

    #[test]
    fn mirror_is_optional() {
        let toml_str = r#"
            config_version = 1
            admins = [1]

            [rental]
            hourly_rate = 300.0
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert!(config.mirror.is_none());
        assert!(config.boards.is_empty());
    }
}
