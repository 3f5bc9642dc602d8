//! Integration tests for boardkeeperd
//!
//! These tests drive the rental service end to end: configuration, ledger,
//! mirror queue, dialogue, registry and reminder timers.

use boardkeeper_api::{Caller, ChatInput, Notification, Reply};
use boardkeeper_config::{parse_config, Policy};
use boardkeeper_core::{RecordingNotifier, RentalService};
use boardkeeper_mirror::{MirrorQueue, MirrorWorker, MockMirror, RetryPolicy};
use boardkeeper_store::{Ledger, SqliteLedger};
use boardkeeper_util::{BoardId, UserId};
use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"
    config_version = 1
    admins = [111, 222]

    [rental]
    hourly_rate = 500.0
    min_hours = 0.05

    [[boards]]
    id = "1"
    name = "Alpha"

    [[boards]]
    id = "2"
    name = "Bravo"

    [[boards]]
    id = "3"
    name = "Charlie"
"#;

struct Harness {
    service: RentalService,
    ledger: Arc<SqliteLedger>,
    mirror: MockMirror,
    notifier: RecordingNotifier,
    _worker: MirrorWorker,
}

fn test_policy() -> Policy {
    parse_config(CONFIG).unwrap()
}

fn start_time() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 7, 12, 10, 0, 0).unwrap()
}

fn anna() -> Caller {
    Caller::new(UserId::new(111), "anna")
}

fn boris() -> Caller {
    Caller::new(UserId::new(222), "boris")
}

fn harness_with(ledger: Arc<SqliteLedger>, mirror: MockMirror) -> Harness {
    let (queue, worker) = MirrorQueue::spawn(
        Arc::new(mirror.clone()),
        RetryPolicy::new(5, Duration::from_millis(200)),
    );
    let notifier = RecordingNotifier::new();
    let service = RentalService::new(
        test_policy(),
        ledger.clone(),
        queue,
        Arc::new(notifier.clone()),
    );

    Harness {
        service,
        ledger,
        mirror,
        notifier,
        _worker: worker,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(SqliteLedger::in_memory().unwrap()), MockMirror::new())
}

/// Walk the whole dialogue through chat text
async fn book(
    service: &mut RentalService,
    caller: &Caller,
    board: &str,
    hours: &str,
    now: DateTime<Local>,
) -> Reply {
    let reply = service.handle_text(caller, "/rent", now).await;
    assert!(matches!(reply, Reply::ChooseBoard { .. }), "got {reply:?}");

    let reply = service.handle_text(caller, board, now).await;
    assert!(matches!(reply, Reply::EnterDuration { .. }), "got {reply:?}");

    let reply = service.handle_text(caller, hours, now).await;
    assert!(matches!(reply, Reply::ConfirmRental { .. }), "got {reply:?}");

    service.handle(caller, ChatInput::Confirm, now).await
}

#[tokio::test(start_paused = true)]
async fn test_two_hour_rental_lifecycle() {
    let mut h = harness();
    let board = BoardId::new("1");
    let start = start_time();

    let reply = book(&mut h.service, &anna(), "1", "2", start).await;
    match &reply {
        Reply::RentalStarted { board_name, cost, ends_at, .. } => {
            assert_eq!(board_name, "Alpha");
            assert_eq!(*cost, 1000.0);
            assert_eq!(*ends_at, start + chrono::Duration::hours(2));
        }
        other => panic!("Expected RentalStarted, got {other:?}"),
    }
    assert!(reply.to_string().contains("Cost: 1000.00"));

    let records = h.ledger.query_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].duration_hours, 2.0);
    assert_eq!(records[0].cost, 1000.0);
    assert_eq!(records[0].end_time, Some(records[0].start_time + chrono::Duration::hours(2)));
    assert!(h.service.registry().contains(&board));

    // Past end_time
    tokio::time::sleep(Duration::from_secs(2 * 3600 + 1)).await;

    assert!(!h.service.registry().contains(&board));
    assert_eq!(h.notifier.warnings_for(&board), 1);
    assert_eq!(h.notifier.completions_for(&board), 1);

    // Status afterwards must not report the completion a second time
    let later = start + chrono::Duration::hours(3);
    assert_eq!(h.service.handle_text(&anna(), "/status", later).await, Reply::NoActiveRentals);
    assert_eq!(h.notifier.completions_for(&board), 1);

    let mirrored = h.mirror.rows();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].duration, "2.00");
    assert_eq!(mirrored[0].cost, "1000.00");
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_booking_rejects_second() {
    let mut h = harness();
    let now = start_time();

    // Both administrators reach the confirmation step before either commits
    for caller in [anna(), boris()] {
        h.service.handle_text(&caller, "/rent", now).await;
        h.service.handle_text(&caller, "2", now).await;
        h.service.handle_text(&caller, "1.5", now).await;
    }

    let first = h.service.handle(&anna(), ChatInput::Confirm, now).await;
    let second = h.service.handle(&boris(), ChatInput::Confirm, now).await;

    assert!(matches!(first, Reply::RentalStarted { .. }));
    assert!(matches!(second, Reply::BoardBusy { ref board_id, .. } if board_id.as_str() == "2"));

    assert_eq!(h.ledger.query_all().unwrap().len(), 1);
    assert_eq!(h.service.registry().len(), 1);
    let session = h.service.registry().lookup(&BoardId::new("2")).unwrap();
    assert_eq!(session.admin_id, UserId::new(111));
    assert!(h.service.dialogues().step(UserId::new(222)).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_force_end_silences_reminders() {
    let mut h = harness();
    let board = BoardId::new("3");

    book(&mut h.service, &anna(), "3", "1", start_time()).await;
    tokio::time::sleep(Duration::from_secs(20 * 60)).await;

    let reply = h.service.handle_text(&boris(), "/end 3", start_time()).await;
    assert_eq!(reply, Reply::RentalForceEnded { board_name: "Charlie".into() });
    assert!(!h.service.registry().contains(&board));

    tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
    assert!(h.notifier.sent().is_empty());

    // The ledger keeps the record regardless of how the session ended
    assert_eq!(h.ledger.query_all().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_short_rental_gets_completion_only() {
    let mut h = harness();
    let board = BoardId::new("1");

    // 0.08 h = 4 min 48 s
    book(&mut h.service, &anna(), "1", "0.08", start_time()).await;
    tokio::time::sleep(Duration::from_secs(5 * 60)).await;

    assert_eq!(h.notifier.warnings_for(&board), 0);
    assert_eq!(h.notifier.completions_for(&board), 1);

    let (recipient, notification) = &h.notifier.sent()[0];
    assert_eq!(*recipient, UserId::new(111));
    assert!(matches!(notification, Notification::Completed { board_name, .. } if board_name == "Alpha"));
}

#[tokio::test(start_paused = true)]
async fn test_history_filter_and_cap() {
    let mut h = harness();
    let mut now = start_time();

    // 12 rentals of board 2, 3 of board 1, alternating admins
    for i in 0..15 {
        let board = if i % 5 == 0 { "1" } else { "2" };
        let caller = if i % 2 == 0 { anna() } else { boris() };
        let reply = book(&mut h.service, &caller, board, "0.5", now).await;
        assert!(matches!(reply, Reply::RentalStarted { .. }), "rental {i}: {reply:?}");
        h.service.handle_text(&caller, &format!("/end {board}"), now).await;
        now += chrono::Duration::hours(1);
    }

    let Reply::History(page) = h.service.handle_text(&anna(), "/history board=2", now).await else {
        panic!("Expected a history page");
    };
    assert_eq!(page.entries.len(), 10);
    assert_eq!(page.suppressed, 2);
    assert!(page.entries.iter().all(|r| r.board_id.as_str() == "2"));
    assert!(page.entries.windows(2).all(|w| w[0].start_time > w[1].start_time));
    assert!(Reply::History(page).to_string().contains("and 2 more records"));

    let Reply::History(page) = h
        .service
        .handle_text(&anna(), "/history board=1 admin=111", now)
        .await
    else {
        panic!("Expected a history page");
    };
    // i = 0 and 10
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.suppressed, 0);

    // An empty value leaves that filter unset
    let Reply::History(page) = h.service.handle_text(&anna(), "/history board= admin=", now).await else {
        panic!("Expected a history page");
    };
    assert_eq!(page.entries.len(), 10);
    assert_eq!(page.suppressed, 5);

    assert_eq!(
        h.service.handle_text(&anna(), "/history board=9", now).await,
        Reply::HistoryEmpty
    );
}

#[tokio::test(start_paused = true)]
async fn test_mirror_outage_does_not_block_commit() {
    let mut h = harness_with(
        Arc::new(SqliteLedger::in_memory().unwrap()),
        MockMirror::new().failing(3),
    );

    let reply = book(&mut h.service, &anna(), "1", "1", start_time()).await;
    assert!(matches!(reply, Reply::RentalStarted { .. }));
    assert!(h.mirror.rows().is_empty());

    // 200 + 400 + 800 ms of backoff
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.mirror.rows().len(), 1);
    assert_eq!(h.mirror.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("rentals.db");

    {
        let mut h = harness_with(Arc::new(SqliteLedger::open(&db_path).unwrap()), MockMirror::new());
        book(&mut h.service, &anna(), "1", "2", start_time()).await;
        assert_eq!(h.service.shutdown(), 1);
    }

    let mut h = harness_with(Arc::new(SqliteLedger::open(&db_path).unwrap()), MockMirror::new());

    // Timers are not persisted; only the ledger remembers the rental
    assert!(h.service.registry().is_empty());
    let Reply::History(page) = h.service.handle_text(&anna(), "/history", start_time()).await else {
        panic!("Expected a history page");
    };
    assert_eq!(page.entries.len(), 1);
    assert!(h.service.health().ledger_ok);
}

#[tokio::test(start_paused = true)]
async fn test_non_admin_gets_nothing() {
    let mut h = harness();
    let stranger = Caller::new(UserId::new(999), "mallory");

    for text in ["/start", "/rent", "/status", "/export", "/history", "/end 1", "1"] {
        assert_eq!(
            h.service.handle_text(&stranger, text, start_time()).await,
            Reply::NotAuthorized,
            "input {text}"
        );
    }
    assert_eq!(h.service.dialogues().open_count(), 0);
    assert_eq!(
        h.service.handle_text(&stranger, "/export", start_time()).await.to_string(),
        "You do not have administrator rights."
    );
}
