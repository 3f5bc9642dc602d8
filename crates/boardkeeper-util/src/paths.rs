//! Default paths for boardkeeper components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/boardkeeper/config.toml` or `~/.config/boardkeeper/config.toml`
//! - Socket: `$XDG_RUNTIME_DIR/boardkeeper/boardkeeper.sock` or `/tmp/boardkeeper-$USER/boardkeeper.sock`
//! - Data: `$XDG_DATA_HOME/boardkeeper` or `~/.local/share/boardkeeper`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const BOARDKEEPER_SOCKET_ENV: &str = "BOARDKEEPER_SOCKET";

/// Environment variable for overriding the data directory
pub const BOARDKEEPER_DATA_DIR_ENV: &str = "BOARDKEEPER_DATA_DIR";

const SOCKET_FILENAME: &str = "boardkeeper.sock";
const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "boardkeeper";

fn home_subdir(parts: &[&str]) -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let mut path = PathBuf::from(home);
    path.extend(parts);
    Some(path.join(APP_DIR))
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    home_subdir(&[".config"])
        .unwrap_or_else(|| PathBuf::from("/etc").join(APP_DIR))
        .join(CONFIG_FILENAME)
}

/// Socket path used when neither the CLI nor the config names one.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Data directory (ledger database) used when neither the CLI nor the config names one.
pub fn default_data_dir() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    home_subdir(&[".local", "share"])
        .unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR).join("data"))
}
