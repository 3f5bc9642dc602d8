//! IPC layer for boardkeeper
//!
//! Chat gateways (the processes that talk to the messenger) connect here.
//! Provides:
//! - Unix domain socket server
//! - NDJSON (newline-delimited JSON) protocol
//! - Event subscription for administrator notifications
//! - Peer UID admission control

mod client;
mod frame;
mod server;

pub use client::*;
pub use server::*;

use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("No gateway is subscribed to notifications")]
    NoSubscribers,
}

pub type IpcResult<T> = Result<T, IpcError>;
