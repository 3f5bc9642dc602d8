//! Active rental registry
//!
//! The single source of truth for which boards are currently rented.
//! Keyed by board id; at most one session per board at any instant.

use boardkeeper_api::SessionInfo;
use boardkeeper_util::{BoardId, SessionId, UserId};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{RentalError, RentalResult};

/// An active, time-bounded rental of one board
#[derive(Debug, Clone)]
pub struct RentalSession {
    pub session_id: SessionId,
    pub board_id: BoardId,
    pub board_name: String,
    pub renter_id: UserId,
    pub admin_id: UserId,
    pub admin_name: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_hours: f64,
    pub cost: f64,

    /// Shared with the session's reminder timer
    pub cancel: CancellationToken,
}

impl RentalSession {
    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        now >= self.end_time
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            board_id: self.board_id.clone(),
            board_name: self.board_name.clone(),
            renter_id: self.renter_id,
            admin_id: self.admin_id,
            admin_name: self.admin_name.clone(),
            started_at: self.start_time,
            ends_at: self.end_time,
            duration_hours: self.duration_hours,
            cost: self.cost,
        }
    }
}

/// Result of [`RentalRegistry::snapshot`]
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    /// Sessions still running, ordered by board id
    pub active: Vec<RentalSession>,
    /// Sessions removed because their end time had passed
    pub evicted: Vec<RentalSession>,
}

/// Shared handle on the active sessions
#[derive(Debug, Clone, Default)]
pub struct RentalRegistry {
    sessions: Arc<Mutex<BTreeMap<BoardId, RentalSession>>>,
}

impl RentalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<BoardId, RentalSession>> {
        // Every mutation is a single map operation, so a poisoned map is still consistent
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert unless the board already has a session
    pub fn try_insert(&self, session: RentalSession) -> RentalResult<()> {
        let mut sessions = self.lock();
        if let Some(existing) = sessions.get(&session.board_id) {
            return Err(RentalError::BoardBusy {
                board_id: existing.board_id.clone(),
                ends_at: existing.end_time,
            });
        }

        debug!(board_id = %session.board_id, session_id = %session.session_id, "Session registered");
        sessions.insert(session.board_id.clone(), session);
        Ok(())
    }

    /// Remove and return the board's session
    pub fn remove(&self, board_id: &BoardId) -> Option<RentalSession> {
        self.lock().remove(board_id)
    }

    /// Remove the board's session only if it is still `session_id`
    pub fn remove_if_current(&self, board_id: &BoardId, session_id: &SessionId) -> Option<RentalSession> {
        let mut sessions = self.lock();
        match sessions.get(board_id) {
            Some(s) if &s.session_id == session_id => sessions.remove(board_id),
            _ => None,
        }
    }

    /// Whether the board's session is still `session_id`
    pub fn is_current(&self, board_id: &BoardId, session_id: &SessionId) -> bool {
        self.lock()
            .get(board_id)
            .is_some_and(|s| &s.session_id == session_id)
    }

    pub fn lookup(&self, board_id: &BoardId) -> Option<RentalSession> {
        self.lock().get(board_id).cloned()
    }

    pub fn contains(&self, board_id: &BoardId) -> bool {
        self.lock().contains_key(board_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Point-in-time view of active sessions.
    ///
    /// Sessions whose end time has passed are evicted and their timers
    /// cancelled, independently of the scheduler.
    pub fn snapshot(&self, now: DateTime<Local>) -> RegistrySnapshot {
        let mut sessions = self.lock();

        let expired: Vec<BoardId> = sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.board_id.clone())
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for board_id in expired {
            if let Some(session) = sessions.remove(&board_id) {
                session.cancel.cancel();
                info!(
                    board_id = %session.board_id,
                    session_id = %session.session_id,
                    end_time = %session.end_time,
                    "Expired session evicted"
                );
                evicted.push(session);
            }
        }

        RegistrySnapshot {
            active: sessions.values().cloned().collect(),
            evicted,
        }
    }

    /// Remove every session and cancel its timer
    pub fn drain(&self) -> Vec<RentalSession> {
        let sessions = std::mem::take(&mut *self.lock());
        sessions
            .into_values()
            .inspect(|s| s.cancel.cancel())
            .collect()
    }
}
