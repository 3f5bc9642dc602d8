//! Mirror trait

use async_trait::async_trait;
use thiserror::Error;

use crate::MirrorRow;

/// Errors from mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mirror rejected request with status {0}")]
    Rejected(u16),

    #[error("Mirror is disabled")]
    Disabled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type MirrorResult<T> = Result<T, MirrorError>;

/// Append-only external replica of ledger rows
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Make sure the sheet starts with the header row
    async fn ensure_header(&self) -> MirrorResult<()>;

    /// Append one row
    async fn append_row(&self, row: &MirrorRow) -> MirrorResult<()>;

    /// Public viewing URL, if the mirror has one
    fn view_url(&self) -> Option<String>;

    /// Whether rows actually go anywhere
    fn is_enabled(&self) -> bool {
        true
    }
}
