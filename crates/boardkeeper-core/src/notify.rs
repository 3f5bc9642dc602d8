//! Delivery of scheduler notifications to administrators

use async_trait::async_trait;
use boardkeeper_api::Notification;
use boardkeeper_util::{BoardId, UserId};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Sends notifications to a chat user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: UserId, notification: Notification) -> Result<(), NotifyError>;
}

/// Notifier that keeps everything it is asked to send
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(UserId, Notification)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(UserId, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn warnings_for(&self, board: &BoardId) -> usize {
        self.count(board, |n| matches!(n, Notification::Warning { .. }))
    }

    pub fn completions_for(&self, board: &BoardId) -> usize {
        self.count(board, |n| matches!(n, Notification::Completed { .. }))
    }

    fn count(&self, board: &BoardId, pred: impl Fn(&Notification) -> bool) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, n)| n.board_id() == board && pred(n))
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: UserId, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((recipient, notification));
        Ok(())
    }
}
