use alert_poller::services::polling::{PollingError, QueryOrigin, MAX_REFRESH_INTERVAL_SECS};
use alert_poller::services::search::SearchError;
use serde_json::json;
use std::sync::Arc;

use crate::common::{
    advance_secs, controller_with, settle, CountingStateStore, GatedStateStore, MockSearchSource,
    STATE_KEY,
};

// =============================================================================
// INTEGRATION TESTS - POLLING CONTROLLER STATE MACHINE
// Timer behaviour runs on a paused clock, ticks are driven by advance_secs
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_issues_one_eager_query() {
    let source = MockSearchSource::immediate(4);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    assert!(!controller.get_is_polling_active());
    assert_eq!(controller.get_interval(), 10);

    controller.start().await;
    settle().await;

    assert_eq!(source.issued(), 1);
    assert!(controller.get_is_polling_active());
    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": true, "refreshInterval": 10 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_issues_once_but_persists_twice() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    controller.start().await;
    let first = store.record(STATE_KEY);
    controller.start().await;
    settle().await;

    assert_eq!(source.issued(), 1);
    assert_eq!(store.saves(), 2);
    assert_eq!(store.record(STATE_KEY), first);

    // Second start did not arm another timer: one tick, one query
    advance_secs(10).await;
    assert_eq!(source.issued(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_each_tick_issues_a_query_when_backend_keeps_up() {
    let source = MockSearchSource::immediate(1);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;
    let mut events = controller.subscribe();

    controller.start().await;
    settle().await;

    advance_secs(9).await;
    assert_eq!(source.issued(), 1, "no tick before the interval elapses");

    advance_secs(1).await;
    assert_eq!(source.issued(), 2);
    advance_secs(10).await;
    assert_eq!(source.issued(), 3);
    assert!(!controller.get_is_congestion());

    let origins: Vec<QueryOrigin> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| event.origin)
        .collect();
    assert_eq!(
        origins,
        vec![QueryOrigin::Eager, QueryOrigin::Tick, QueryOrigin::Tick]
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_interval_while_active_rearms_timer() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    controller.start().await;
    settle().await;

    controller.set_interval(5).await.unwrap();
    assert!(controller.get_is_polling_active());
    assert_eq!(controller.get_interval(), 5);

    advance_secs(5).await;
    assert_eq!(source.issued(), 2);
    assert!(controller.get_is_polling_active());

    // The old 10s timer would have fired here as well
    advance_secs(5).await;
    assert_eq!(source.issued(), 3);

    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": true, "refreshInterval": 5 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_interval_while_stopped_only_persists() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    controller.set_interval(3).await.unwrap();
    advance_secs(30).await;

    assert_eq!(source.issued(), 0);
    assert!(!controller.get_is_polling_active());
    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": false, "refreshInterval": 3 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_is_rejected() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source, store.clone()).await;

    let result = controller.set_interval(0).await;

    assert!(matches!(result, Err(PollingError::InvalidInterval(0))));
    assert_eq!(controller.get_interval(), 10);
    assert_eq!(store.saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_interval_leaves_polling_running() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    controller.start().await;
    settle().await;

    let result = controller.set_interval(u64::MAX).await;
    assert!(matches!(result, Err(PollingError::InvalidInterval(u64::MAX))));
    let result = controller.set_interval(MAX_REFRESH_INTERVAL_SECS + 1).await;
    assert!(matches!(result, Err(PollingError::InvalidInterval(_))));

    assert!(controller.get_is_polling_active());
    assert_eq!(controller.get_interval(), 10);
    assert_eq!(store.saves(), 1);

    // The 10s timer is still armed
    advance_secs(10).await;
    assert_eq!(source.issued(), 2);
    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": true, "refreshInterval": 10 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_longest_interval_is_accepted() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;

    controller.start().await;
    settle().await;
    controller.set_interval(MAX_REFRESH_INTERVAL_SECS).await.unwrap();

    advance_secs(MAX_REFRESH_INTERVAL_SECS - 1).await;
    assert_eq!(source.issued(), 1);
    advance_secs(1).await;
    assert_eq!(source.issued(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_suppression_drops_ticks_without_stopping() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    controller.start().await;
    settle().await;
    let saves_before = store.saves();

    controller.set_suppression(true);
    advance_secs(10).await;
    advance_secs(10).await;
    advance_secs(10).await;

    assert_eq!(source.issued(), 1);
    assert!(controller.is_suppressed());
    assert!(controller.get_is_polling_active());
    assert_eq!(store.saves(), saves_before, "suppression is never persisted");

    controller.set_suppression(false);
    advance_secs(10).await;
    assert_eq!(source.issued(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_further_ticks() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    controller.start().await;
    settle().await;
    controller.stop(true).await;

    advance_secs(10).await;
    advance_secs(10).await;

    assert_eq!(source.issued(), 1);
    assert!(!controller.get_is_polling_active());
    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": false, "refreshInterval": 10 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_query_issued_before_stop_still_publishes() {
    let source = MockSearchSource::manual();
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;
    let mut events = controller.subscribe();

    controller.start().await;
    settle().await;
    controller.stop(true).await;
    assert!(controller.is_pending());

    assert!(source.succeed_next(12));
    settle().await;

    let event = events.try_recv().expect("result published after stop");
    assert_eq!(event.response().map(|r| r.total), Some(12));
    assert!(!controller.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_persist_keeps_last_record() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source, store.clone()).await;

    controller.start().await;
    controller.stop(false).await;

    assert!(!controller.get_is_polling_active());
    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": true, "refreshInterval": 10 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_drop_next_and_continue_pushes_next_tick_out() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;

    controller.start().await;
    settle().await;

    advance_secs(6).await;
    controller.drop_next_and_continue();
    assert!(controller.get_is_polling_active());

    // Original schedule would tick at 10s
    advance_secs(4).await;
    assert_eq!(source.issued(), 1);

    advance_secs(6).await;
    assert_eq!(source.issued(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_drop_next_and_continue_discards_in_flight_cycle() {
    let source = MockSearchSource::manual();
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;
    let mut events = controller.subscribe();

    controller.start().await;
    settle().await;
    advance_secs(10).await;
    assert!(controller.get_is_congestion());

    controller.drop_next_and_continue();
    assert!(!controller.is_pending());

    advance_secs(10).await;
    assert_eq!(source.issued(), 2, "tick after the reset issues again");
    assert!(!controller.get_is_congestion());
    assert!(controller.is_pending());

    // Late answer of the discarded cycle is dropped
    assert!(source.succeed_next(99));
    settle().await;
    assert!(events.try_recv().is_err());
    assert!(controller.is_pending());

    assert!(source.succeed_next(7));
    settle().await;
    let event = events.try_recv().expect("current cycle result published");
    assert_eq!(event.origin, QueryOrigin::Tick);
    assert_eq!(event.response().map(|r| r.total), Some(7));
    assert!(!controller.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_set_interval_while_active_discards_in_flight_cycle() {
    let source = MockSearchSource::manual();
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;

    controller.start().await;
    settle().await;
    assert!(controller.is_pending());

    controller.set_interval(5).await.unwrap();
    assert!(!controller.is_pending());

    advance_secs(5).await;
    assert_eq!(source.issued(), 2);
    assert!(!controller.get_is_congestion());
}

#[tokio::test(start_paused = true)]
async fn test_drop_next_and_continue_while_stopped_stays_stopped() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;

    controller.drop_next_and_continue();
    advance_secs(30).await;

    assert!(!controller.get_is_polling_active());
    assert_eq!(source.issued(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_published_and_clears_pending() {
    let source = MockSearchSource::manual();
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;
    let mut events = controller.subscribe();

    controller.start().await;
    settle().await;
    assert!(controller.is_pending());

    assert!(source.complete_next(Err(SearchError::Timeout)));
    settle().await;

    let event = events.try_recv().expect("failure published");
    assert!(event.is_failure());
    assert_eq!(event.origin, QueryOrigin::Eager);
    assert!(!controller.is_pending());

    // Congestion recovery is not blocked by the failure
    advance_secs(10).await;
    assert!(!controller.get_is_congestion());
    assert_eq!(source.issued(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pending_tracks_every_outstanding_query() {
    let source = MockSearchSource::manual();
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;

    assert!(!controller.is_pending());

    controller.start().await;
    settle().await;
    controller.stop(true).await;
    controller.start().await;
    settle().await;

    // Restart issued a second eager query while the first is outstanding
    assert_eq!(source.waiting(), 2);
    assert!(controller.is_pending());

    source.succeed_next(1);
    settle().await;
    assert!(controller.is_pending());

    source.succeed_next(2);
    settle().await;
    assert!(!controller.is_pending());
}

#[tokio::test(start_paused = true)]
async fn test_on_destroy_stops_without_persisting() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store.clone()).await;

    controller.start().await;
    settle().await;
    let saves = store.saves();

    controller.on_destroy().await;
    advance_secs(20).await;

    assert!(!controller.get_is_polling_active());
    assert_eq!(source.issued(), 1);
    assert_eq!(store.saves(), saves);
    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": true, "refreshInterval": 10 }))
    );

    // Already stopped: nothing to do
    controller.on_destroy().await;
    assert_eq!(store.saves(), saves);
}

#[tokio::test(start_paused = true)]
async fn test_queries_use_current_descriptor() {
    let source = MockSearchSource::immediate(0);
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source.clone(), store).await;

    controller.start().await;
    settle().await;
    assert_eq!(source.last_request().unwrap().query, "*");

    controller.query_builder().set_query("is_alert:true");
    advance_secs(10).await;

    assert_eq!(source.last_request().unwrap().query, "is_alert:true");
}

#[tokio::test(start_paused = true)]
async fn test_status_snapshot() {
    let source = MockSearchSource::manual();
    let store = Arc::new(CountingStateStore::default());
    let controller = controller_with(source, store).await;

    controller.start().await;
    settle().await;
    controller.set_suppression(true);

    let status = controller.status();
    assert!(status.active);
    assert!(status.pending);
    assert!(status.suppressed);
    assert!(!status.congested);
    assert_eq!(status.refresh_interval, 10);
}

#[tokio::test]
async fn test_queued_write_keeps_state_of_its_own_transition() {
    let store = GatedStateStore::closed();
    let controller = controller_with(MockSearchSource::immediate(0), store.clone()).await;

    let interval_change = tokio::spawn({
        let controller = controller.clone();
        async move { controller.set_interval(5).await }
    });
    settle().await;

    // Queued behind the blocked interval write
    let start = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start().await }
    });
    settle().await;

    controller.stop(false).await;
    store.open(2);

    interval_change.await.unwrap().unwrap();
    start.await.unwrap();

    assert!(!controller.get_is_polling_active());
    assert_eq!(
        store.record(STATE_KEY),
        Some(json!({ "active": true, "refreshInterval": 5 }))
    );
}
