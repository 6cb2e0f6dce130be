//! End-to-end tests: event feed in, statistics and persistence out.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use agent_telemetry::{
    AgentTracker, AmiMessage, CallDisposition, MemoryStore, PeriodKind,
};

/// Install the tracing subscriber once for the whole test binary;
/// `RUST_LOG` controls verbosity.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

fn ami(event: &str, mut data: serde_json::Value) -> AmiMessage {
    data["Event"] = json!(event);
    serde_json::from_value(json!({ "type": "event", "data": data })).unwrap()
}

fn completed(uniqueid: &str, queue: &str, talk: &str) -> AmiMessage {
    ami(
        "AgentComplete",
        json!({
            "Queue": queue,
            "Uniqueid": uniqueid,
            "Channel": "PJSIP/+15550001-0001",
            "Interface": "PJSIP/1001",
            "HoldTime": "8",
            "TalkTime": talk,
        }),
    )
}

/// Wait until the tracker has absorbed the expected number of calls.
async fn wait_for_calls(tracker: &AgentTracker, expected: u64) {
    for _ in 0..200 {
        if tracker.stats().await.total_calls >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "tracker never reached {} calls (at {})",
        expected,
        tracker.stats().await.total_calls
    );
}

#[tokio::test]
async fn test_channel_ingestion_updates_totals() {
    init_tracing();
    let tracker = AgentTracker::builder("1001")
        .interface("PJSIP/1001")
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel(16);
    tracker.start(rx).await.unwrap();

    tx.send(completed("u1", "support", "120")).await.unwrap();
    tx.send(completed("u2", "support", "60")).await.unwrap();
    tx.send(ami(
        "AgentRingNoAnswer",
        json!({ "Queue": "support", "Uniqueid": "u3", "Interface": "PJSIP/1001", "RingTime": "30" }),
    ))
    .await
    .unwrap();

    wait_for_calls(&tracker, 3).await;
    let stats = tracker.stats().await;
    assert_eq!(stats.total_calls, 3);
    assert_eq!(stats.total_talk_time, 180);
    assert_eq!(stats.missed_calls, 1);
    assert_eq!(stats.queue_stats["support"].calls_handled, 3);

    let history = tracker.call_history(None, None).await;
    assert_eq!(history[0].id, "u3");
    assert_eq!(history[0].disposition, CallDisposition::Missed);

    tracker.stop().await;
}

#[tokio::test]
async fn test_untracked_events_never_change_totals() {
    init_tracing();
    let tracker = AgentTracker::builder("1001")
        .interface("PJSIP/1001")
        .queues(vec!["support".to_string()])
        .build()
        .unwrap();

    let (tx, rx) = mpsc::channel(16);
    tracker.start(rx).await.unwrap();

    // Wrong queue, wrong agent, unknown event kind
    tx.send(completed("u1", "sales", "120")).await.unwrap();
    tx.send(ami(
        "AgentComplete",
        json!({ "Queue": "support", "Uniqueid": "u2", "Interface": "PJSIP/2002", "TalkTime": "60" }),
    ))
    .await
    .unwrap();
    tx.send(ami("QueueMemberPause", json!({ "Interface": "PJSIP/1001" })))
        .await
        .unwrap();
    // One that does count, so we can tell processing finished
    tx.send(completed("u4", "support", "45")).await.unwrap();

    wait_for_calls(&tracker, 1).await;
    let stats = tracker.stats().await;
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.total_talk_time, 45);

    tracker.stop().await;
}

#[tokio::test]
async fn test_duplicate_event_delivery_counts_once() {
    init_tracing();
    let tracker = AgentTracker::builder("1001").build().unwrap();
    let (tx, rx) = mpsc::channel(16);
    tracker.start(rx).await.unwrap();

    tx.send(completed("dup", "support", "90")).await.unwrap();
    tx.send(completed("dup", "support", "90")).await.unwrap();
    tx.send(completed("other", "support", "10")).await.unwrap();

    wait_for_calls(&tracker, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tracker.stats().await.total_calls, 2);

    tracker.stop().await;
}

#[tokio::test]
async fn test_persist_then_reload_roundtrip() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());

    let tracker = AgentTracker::builder("1001")
        .persistence(store.clone(), "telemetry/1001")
        .build()
        .unwrap();
    let (tx, rx) = mpsc::channel(16);
    tracker.start(rx).await.unwrap();

    tx.send(completed("u1", "support", "120")).await.unwrap();
    tx.send(completed("u2", "support", "60")).await.unwrap();
    wait_for_calls(&tracker, 2).await;
    let before = tracker.stats().await;
    // stop() flushes the final state synchronously
    tracker.stop().await;
    drop(tx);

    let reloaded = AgentTracker::builder("1001")
        .persistence(store, "telemetry/1001")
        .build()
        .unwrap();
    let (_tx2, rx2) = mpsc::channel(16);
    reloaded.start(rx2).await.unwrap();

    let after = reloaded.stats().await;
    assert_eq!(after.total_calls, before.total_calls);
    assert_eq!(after.total_talk_time, before.total_talk_time);
    assert_eq!(after.queue_stats, before.queue_stats);

    reloaded.stop().await;
}

#[tokio::test]
async fn test_fresh_start_with_empty_store() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let tracker = AgentTracker::builder("1001")
        .persistence(store, "telemetry/empty")
        .build()
        .unwrap();
    let (_tx, rx) = mpsc::channel(4);
    tracker.start(rx).await.unwrap();
    assert_eq!(tracker.stats().await.total_calls, 0);
    tracker.stop().await;
}

#[tokio::test]
async fn test_wrap_time_after_feed_event() {
    init_tracing();
    let tracker = AgentTracker::builder("1001").build().unwrap();
    let (tx, rx) = mpsc::channel(4);
    tracker.start(rx).await.unwrap();

    tx.send(completed("u1", "support", "120")).await.unwrap();
    wait_for_calls(&tracker, 1).await;

    assert!(tracker.record_wrap_time("u1", 25).await);
    let stats = tracker.stats().await;
    assert_eq!(stats.total_wrap_time, 25);
    assert_eq!(stats.total_handle_time, 120 + 25);

    tracker.stop().await;
}

#[tokio::test]
async fn test_channel_close_flushes_persisted_state() {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let tracker = AgentTracker::builder("1001")
        .persistence(store.clone(), "telemetry/close")
        .build()
        .unwrap();
    let (tx, rx) = mpsc::channel(4);
    tracker.start(rx).await.unwrap();

    tx.send(completed("u1", "support", "120")).await.unwrap();
    wait_for_calls(&tracker, 1).await;

    // Closing the sender ends the ingest loop, which flushes on its
    // way out; active flips false only after the flush completes
    drop(tx);
    for _ in 0..200 {
        if !tracker.is_active() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!tracker.is_active());

    let state = agent_telemetry::persist::load(store.as_ref(), "telemetry/close")
        .await
        .expect("flushed state present");
    assert_eq!(state.stats[0].total_calls, 1);
    assert_eq!(state.stats[0].total_talk_time, 120);
}

#[tokio::test]
async fn test_period_change_resets_and_keeps_tracking() {
    init_tracing();
    let tracker = AgentTracker::builder("1001").build().unwrap();
    let (tx, rx) = mpsc::channel(4);
    tracker.start(rx).await.unwrap();

    tx.send(completed("u1", "support", "120")).await.unwrap();
    wait_for_calls(&tracker, 1).await;

    tracker.set_period(PeriodKind::Month, None, None).await;
    assert_eq!(tracker.stats().await.total_calls, 0);

    tx.send(completed("u2", "support", "30")).await.unwrap();
    wait_for_calls(&tracker, 1).await;
    assert_eq!(tracker.stats().await.total_talk_time, 30);

    tracker.stop().await;
}
