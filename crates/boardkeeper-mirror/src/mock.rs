//! Mock mirror for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Mirror, MirrorError, MirrorResult, MirrorRow};

/// Mock mirror that records delivered rows
#[derive(Debug, Clone, Default)]
pub struct MockMirror {
    rows: Arc<Mutex<Vec<MirrorRow>>>,
    attempts: Arc<AtomicU32>,
    header_ensured: Arc<Mutex<bool>>,

    /// Number of upcoming `append_row` calls that fail before one succeeds
    pub fail_next: Arc<AtomicU32>,

    /// Make every call fail
    pub always_fail: Arc<Mutex<bool>>,

    pub view_url: Option<String>,
}

impl MockMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view_url(mut self, url: impl Into<String>) -> Self {
        self.view_url = Some(url.into());
        self
    }

    /// Fail the next `n` appends
    pub fn failing(self, n: u32) -> Self {
        self.fail_next.store(n, Ordering::SeqCst);
        self
    }

    pub fn set_always_fail(&self, fail: bool) {
        *self.always_fail.lock().unwrap() = fail;
    }

    /// Rows delivered so far
    pub fn rows(&self) -> Vec<MirrorRow> {
        self.rows.lock().unwrap().clone()
    }

    /// Total `append_row` calls, including failed ones
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn header_ensured(&self) -> bool {
        *self.header_ensured.lock().unwrap()
    }
}

#[async_trait]
impl Mirror for MockMirror {
    async fn ensure_header(&self) -> MirrorResult<()> {
        if *self.always_fail.lock().unwrap() {
            return Err(MirrorError::Internal("Mock failure".into()));
        }
        *self.header_ensured.lock().unwrap() = true;
        Ok(())
    }

    async fn append_row(&self, row: &MirrorRow) -> MirrorResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if *self.always_fail.lock().unwrap() {
            return Err(MirrorError::Internal("Mock failure".into()));
        }

        let pending = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(MirrorError::Rejected(503));
        }

        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    fn view_url(&self) -> Option<String> {
        self.view_url.clone()
    }
}
