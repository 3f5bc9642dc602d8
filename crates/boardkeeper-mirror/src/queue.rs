//! Background delivery of mirror rows
//!
//! The commit path hands rows to [`MirrorQueue::enqueue`] and moves on. A
//! single worker task delivers them in order, retrying failures with
//! exponential backoff, and drops a row once its attempts are exhausted.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::{Mirror, MirrorRow};

/// Upper bound on the delay between two attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry settings for row delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per row, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500))
    }
}

/// Sending half of the mirror pipeline
#[derive(Clone)]
pub struct MirrorQueue {
    tx: mpsc::UnboundedSender<MirrorRow>,
    view_url: Option<String>,
    enabled: bool,
}

/// Handle on the delivery task
pub struct MirrorWorker {
    handle: JoinHandle<()>,
}

impl MirrorWorker {
    /// Wait until every queued row has been delivered or dropped.
    ///
    /// Only returns once all [`MirrorQueue`] clones are gone.
    pub async fn finish(self) {
        if let Err(e) = self.handle.await {
            error!(error = %e, "Mirror worker panicked");
        }
    }
}

impl MirrorQueue {
    /// Start the delivery task for `mirror`
    pub fn spawn(mirror: Arc<dyn Mirror>, policy: RetryPolicy) -> (Self, MirrorWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            view_url: mirror.view_url(),
            enabled: mirror.is_enabled(),
        };

        let handle = tokio::spawn(run_worker(mirror, policy, rx));
        (queue, MirrorWorker { handle })
    }

    /// Queue a row for delivery; never waits on the mirror
    pub fn enqueue(&self, row: MirrorRow) {
        if !self.enabled {
            debug!(board_id = %row.board_id, "Mirror disabled, row not queued");
            return;
        }
        if self.tx.send(row).is_err() {
            warn!("Mirror worker is gone, row dropped");
        }
    }

    /// Viewing URL of the underlying mirror
    pub fn view_url(&self) -> Option<String> {
        self.view_url.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

async fn run_worker(
    mirror: Arc<dyn Mirror>,
    policy: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<MirrorRow>,
) {
    while let Some(row) = rx.recv().await {
        deliver(mirror.as_ref(), &policy, &row).await;
    }
    debug!("Mirror queue closed");
}

async fn deliver(mirror: &dyn Mirror, policy: &RetryPolicy, row: &MirrorRow) {
    for attempt in 1..=policy.max_attempts {
        match mirror.append_row(row).await {
            Ok(()) => {
                debug!(board_id = %row.board_id, attempt, "Mirror row appended");
                return;
            }
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    board_id = %row.board_id,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Mirror append failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    board_id = %row.board_id,
                    start_time = %row.start_time,
                    attempts = attempt,
                    error = %e,
                    "Mirror append failed, row dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DisabledMirror, MockMirror};

    fn row(board: &str) -> MirrorRow {
        MirrorRow {
            user_id: "1".into(),
            board_id: board.into(),
            board_name: "Alpha".into(),
            admin_id: "1".into(),
            admin_name: "Anna".into(),
            start_time: "2024-06-01 10:00:00".into(),
            end_time: "2024-06-01 12:00:00".into(),
            duration: "2.00".into(),
            cost: "1000.00".into(),
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(10));

        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(2), Duration::from_secs(20));
        assert_eq!(policy.delay_after(3), Duration::from_secs(40));
        assert_eq!(policy.delay_after(4), MAX_BACKOFF);
        assert_eq!(policy.delay_after(30), MAX_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_after_transient_failures() {
        let mirror = MockMirror::new().failing(2);
        let (queue, worker) =
            MirrorQueue::spawn(Arc::new(mirror.clone()), RetryPolicy::new(5, Duration::from_millis(100)));

        queue.enqueue(row("1"));
        queue.enqueue(row("2"));
        drop(queue);
        worker.finish().await;

        let boards: Vec<_> = mirror.rows().into_iter().map(|r| r.board_id).collect();
        assert_eq!(boards, vec!["1", "2"]);
        assert_eq!(mirror.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn drops_row_after_last_attempt() {
        let mirror = MockMirror::new();
        mirror.set_always_fail(true);
        let (queue, worker) =
            MirrorQueue::spawn(Arc::new(mirror.clone()), RetryPolicy::new(3, Duration::from_millis(100)));

        queue.enqueue(row("1"));
        drop(queue);
        worker.finish().await;

        assert!(mirror.rows().is_empty());
        assert_eq!(mirror.attempts(), 3);
    }

    #[tokio::test]
    async fn disabled_mirror_skips_queue() {
        let (queue, worker) = MirrorQueue::spawn(Arc::new(DisabledMirror), RetryPolicy::default());

        assert!(!queue.is_enabled());
        assert!(queue.view_url().is_none());

        queue.enqueue(row("1"));
        drop(queue);
        worker.finish().await;
    }
}
