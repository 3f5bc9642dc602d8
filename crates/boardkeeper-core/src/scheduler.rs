//! Reminder scheduler
//!
//! One cancellable timer per committed session. The timer warns the
//! responsible administrator `warning_lead` before the end, then removes the
//! session and reports completion. Both steps act only if the registry still
//! holds this exact session for the board.

use boardkeeper_api::Notification;
use boardkeeper_util::{saturating_until, BoardId, SessionId, UserId};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Notifier, RentalRegistry, RentalSession};

/// What a timer needs to know about its session
#[derive(Debug, Clone)]
struct TimerPlan {
    session_id: SessionId,
    board_id: BoardId,
    board_name: String,
    admin_id: UserId,
    admin_name: String,
    end_time: DateTime<Local>,
}

impl From<&RentalSession> for TimerPlan {
    fn from(session: &RentalSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            board_id: session.board_id.clone(),
            board_name: session.board_name.clone(),
            admin_id: session.admin_id,
            admin_name: session.admin_name.clone(),
            end_time: session.end_time,
        }
    }
}

#[derive(Clone)]
pub struct ReminderScheduler {
    registry: RentalRegistry,
    notifier: Arc<dyn Notifier>,
    warning_lead: Duration,
}

impl ReminderScheduler {
    pub fn new(registry: RentalRegistry, notifier: Arc<dyn Notifier>, warning_lead: Duration) -> Self {
        Self {
            registry,
            notifier,
            warning_lead,
        }
    }

    /// Start the timer for `session`; it stops early when the session's token is cancelled
    pub fn spawn(&self, session: &RentalSession, now: DateTime<Local>) -> JoinHandle<()> {
        let this = self.clone();
        let plan = TimerPlan::from(session);
        let token = session.cancel.clone();
        tokio::spawn(async move { this.run(plan, token, now).await })
    }

    async fn run(self, plan: TimerPlan, token: CancellationToken, now: DateTime<Local>) {
        let remaining = saturating_until(plan.end_time, now);

        let final_wait = if remaining > self.warning_lead {
            if !sleep_unless_cancelled(&token, remaining - self.warning_lead).await {
                debug!(board_id = %plan.board_id, session_id = %plan.session_id, "Timer cancelled before warning");
                return;
            }

            if self.still_active(&plan, &token) {
                info!(board_id = %plan.board_id, admin_id = %plan.admin_id, "Rental ending soon");
                self.send(
                    plan.admin_id,
                    Notification::Warning {
                        board_id: plan.board_id.clone(),
                        board_name: plan.board_name.clone(),
                        admin_name: plan.admin_name.clone(),
                        remaining: self.warning_lead,
                    },
                )
                .await;
            }

            self.warning_lead
        } else {
            remaining
        };

        if !sleep_unless_cancelled(&token, final_wait).await {
            debug!(board_id = %plan.board_id, session_id = %plan.session_id, "Timer cancelled before completion");
            return;
        }

        if let Some(session) = self.registry.remove_if_current(&plan.board_id, &plan.session_id) {
            info!(board_id = %session.board_id, session_id = %session.session_id, "Rental completed");
            self.send(
                plan.admin_id,
                Notification::Completed {
                    board_id: session.board_id,
                    board_name: session.board_name,
                },
            )
            .await;
        }
    }

    /// A force end cancels the token before the registry entry goes away
    fn still_active(&self, plan: &TimerPlan, token: &CancellationToken) -> bool {
        !token.is_cancelled() && self.registry.is_current(&plan.board_id, &plan.session_id)
    }

    async fn send(&self, recipient: UserId, notification: Notification) {
        if let Err(e) = self.notifier.notify(recipient, notification).await {
            warn!(recipient = %recipient, error = %e, "Failed to deliver notification");
        }
    }
}

/// Returns false if cancelled first
async fn sleep_unless_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
