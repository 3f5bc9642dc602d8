//! Rental service facade
//!
//! Routes chat inputs from administrators to the dialogue, the registry and
//! the history engine, and owns the commit sequence:
//! registry check, ledger append, mirror enqueue, registry insert, timer.

use boardkeeper_api::{Caller, ChatInput, HealthStatus, HistoryFilter, Notification, Reply};
use boardkeeper_config::Policy;
use boardkeeper_mirror::{MirrorQueue, MirrorRow};
use boardkeeper_store::{Ledger, NewRentalRecord};
use boardkeeper_util::{hours_to_duration, BoardId, SessionId};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    query_history, BookingDraft, DialogueTable, Notifier, RentalError, RentalRegistry,
    RentalResult, RentalSession, ReminderScheduler, Transition,
};

pub struct RentalService {
    policy: Policy,
    ledger: Arc<dyn Ledger>,
    mirror: MirrorQueue,
    notifier: Arc<dyn Notifier>,
    registry: RentalRegistry,
    dialogues: DialogueTable,
    scheduler: ReminderScheduler,
}

impl RentalService {
    pub fn new(
        policy: Policy,
        ledger: Arc<dyn Ledger>,
        mirror: MirrorQueue,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = RentalRegistry::new();
        let scheduler =
            ReminderScheduler::new(registry.clone(), notifier.clone(), policy.rental.warning_lead);

        info!(
            boards = policy.catalog.len(),
            admins = policy.admins.len(),
            hourly_rate = policy.rental.hourly_rate,
            mirror_enabled = mirror.is_enabled(),
            "Rental service initialized"
        );

        Self {
            policy,
            ledger,
            mirror,
            notifier,
            registry,
            dialogues: DialogueTable::new(),
            scheduler,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn registry(&self) -> &RentalRegistry {
        &self.registry
    }

    pub fn dialogues(&self) -> &DialogueTable {
        &self.dialogues
    }

    /// Parse raw chat text and handle it
    pub async fn handle_text(&mut self, caller: &Caller, text: &str, now: DateTime<Local>) -> Reply {
        match ChatInput::parse(text) {
            Ok(input) => self.handle(caller, input, now).await,
            Err(_) if !self.is_admin(caller) => Reply::NotAuthorized,
            Err(e) => Reply::InvalidHistoryFilter {
                reason: e.to_string(),
            },
        }
    }

    /// Handle one chat input and produce the reply for the caller
    pub async fn handle(&mut self, caller: &Caller, input: ChatInput, now: DateTime<Local>) -> Reply {
        if !self.is_admin(caller) {
            warn!(user_id = %caller.user_id, "Rejected input from non-administrator");
            return RentalError::Unauthorized.into_reply();
        }

        let user = caller.user_id;
        match input {
            ChatInput::Start => Reply::Welcome {
                name: caller.display_name.clone(),
            },
            ChatInput::Help => Reply::Help {
                board_ids: self.policy.catalog.ids(),
            },
            ChatInput::Rent => self.dialogues.begin_rental(user, &self.policy.catalog),
            ChatInput::End { board_id: None } => {
                self.dialogues.begin_force_end(user, &self.policy.catalog)
            }
            ChatInput::End {
                board_id: Some(board_id),
            } => {
                self.dialogues.reset(user);
                self.force_end(caller, &board_id)
            }
            ChatInput::Status => self.status(now).await,
            ChatInput::Export => match self.mirror.view_url() {
                Some(url) => Reply::ExportLink { url },
                None => Reply::MirrorUnavailable,
            },
            ChatInput::History(filter) => self.history(&filter),
            ChatInput::SelectBoard { .. }
            | ChatInput::Confirm
            | ChatInput::Cancel
            | ChatInput::Text { .. } => {
                let transition =
                    self.dialogues
                        .advance(user, &input, &self.policy.catalog, &self.policy.rental);
                match transition {
                    Transition::Reply(reply) => reply,
                    Transition::Commit(draft) => self
                        .commit(caller, draft, now)
                        .await
                        .unwrap_or_else(RentalError::into_reply),
                    Transition::ForceEnd(board_id) => self.force_end(caller, &board_id),
                }
            }
        }
    }

    fn is_admin(&self, caller: &Caller) -> bool {
        self.policy.admins.contains(caller.user_id)
    }

    async fn commit(&mut self, caller: &Caller, draft: BookingDraft, now: DateTime<Local>) -> RentalResult<Reply> {
        // Expired sessions must not block a new booking
        self.sweep(now).await;

        if let Some(existing) = self.registry.lookup(&draft.board.id) {
            info!(
                board_id = %existing.board_id,
                admin_id = %caller.user_id,
                "Booking rejected, board already rented"
            );
            return Err(RentalError::BoardBusy {
                board_id: existing.board_id,
                ends_at: existing.end_time,
            });
        }

        let end_time = now + hours_to_duration(draft.hours);
        let record = NewRentalRecord {
            user_id: caller.user_id,
            board_id: draft.board.id.clone(),
            board_name: draft.board.name.clone(),
            admin_id: caller.user_id,
            admin_name: caller.display_name.clone(),
            start_time: now,
            end_time: Some(end_time),
            duration_hours: draft.hours,
            cost: draft.cost,
        };

        let record_id = self.ledger.append(record.clone()).map_err(|e| {
            error!(board_id = %draft.board.id, error = %e, "Ledger append failed");
            RentalError::from(e)
        })?;
        let stored = record.into_record(record_id);
        self.mirror.enqueue(MirrorRow::from(&stored));

        let session = RentalSession {
            session_id: SessionId::new(),
            board_id: stored.board_id,
            board_name: stored.board_name,
            renter_id: stored.user_id,
            admin_id: stored.admin_id,
            admin_name: stored.admin_name,
            start_time: now,
            end_time,
            duration_hours: stored.duration_hours,
            cost: stored.cost,
            cancel: CancellationToken::new(),
        };
        self.registry.try_insert(session.clone())?;
        self.scheduler.spawn(&session, now);

        info!(
            board_id = %session.board_id,
            session_id = %session.session_id,
            record_id = record_id.0,
            admin_id = %session.admin_id,
            hours = session.duration_hours,
            cost = session.cost,
            end_time = %session.end_time,
            "Rental started"
        );

        Ok(Reply::RentalStarted {
            board_name: session.board_name,
            admin_name: session.admin_name,
            admin_id: session.admin_id,
            ends_at: session.end_time,
            cost: session.cost,
        })
    }

    fn force_end(&mut self, caller: &Caller, board_id: &BoardId) -> Reply {
        let Some(session) = self.registry.lookup(board_id) else {
            info!(board_id = %board_id, admin_id = %caller.user_id, "Force end: no active rental");
            return RentalError::NoActiveRental(board_id.clone()).into_reply();
        };

        session.cancel.cancel();
        self.registry.remove_if_current(board_id, &session.session_id);
        info!(
            board_id = %session.board_id,
            session_id = %session.session_id,
            admin_id = %caller.user_id,
            "Rental force-ended"
        );

        Reply::RentalForceEnded {
            board_name: session.board_name,
        }
    }

    async fn status(&mut self, now: DateTime<Local>) -> Reply {
        let active = self.sweep(now).await;
        if active.is_empty() {
            Reply::NoActiveRentals
        } else {
            Reply::Status {
                sessions: active.iter().map(RentalSession::info).collect(),
            }
        }
    }

    /// Evict expired sessions and report their completion
    async fn sweep(&self, now: DateTime<Local>) -> Vec<RentalSession> {
        let snapshot = self.registry.snapshot(now);

        for session in snapshot.evicted {
            let notification = Notification::Completed {
                board_id: session.board_id,
                board_name: session.board_name,
            };
            if let Err(e) = self.notifier.notify(session.admin_id, notification).await {
                warn!(recipient = %session.admin_id, error = %e, "Failed to deliver notification");
            }
        }

        snapshot.active
    }

    fn history(&self, filter: &HistoryFilter) -> Reply {
        let records = match self.ledger.query_all() {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Ledger query failed");
                return Reply::HistoryUnavailable;
            }
        };

        let page = query_history(records, filter, self.policy.rental.history_page_size);
        if page.entries.is_empty() {
            Reply::HistoryEmpty
        } else {
            Reply::History(page)
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            live: true,
            ledger_ok: self.ledger.is_healthy(),
            mirror_enabled: self.mirror.is_enabled(),
            active_rentals: self.registry.len(),
        }
    }

    /// Cancel every timer; returns the number of sessions still active
    pub fn shutdown(&mut self) -> usize {
        let drained = self.registry.drain();
        for session in &drained {
            info!(
                board_id = %session.board_id,
                end_time = %session.end_time,
                "Active rental dropped at shutdown"
            );
        }
        drained.len()
    }
}
