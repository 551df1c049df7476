// End-to-End Flow Tests for Tape Sentinel
//
// These tests exercise the full data pipeline without a live feed:
//   Raw trade/book → Layer 2 (Ingestor → StateStore) → Layer 3 (Bars → Detector → Indicators → Report)
//   → EventBus → subscribers / snapshot timer
//
// Run with: cargo test --test e2e_flow_test

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use tape_sentinel::core::events::{
    EVENT_BAR_CLOSED, EVENT_BOOK, EVENT_INDICATORS, EVENT_SIGNAL, EVENT_SNAPSHOT_1S, EVENT_TICK,
};
use tape_sentinel::core::{AppConfig, Event, EventBus, EventPayload, EventPriority};
use tape_sentinel::core::types::{BigTradeTrigger, SignalKind, SignalLevel, SignalReason, SignalSide};
use tape_sentinel::layer1::{MockSource, MockSourceConfig};
use tape_sentinel::layer2::{publish_snapshots, spawn_snapshot_ticker, MarketHub, RawBook, RawTrade, SymbolPipeline};
use tape_sentinel::layer3::indicators::StructureEvent;
use tape_sentinel::layer3::report::{ReportStatus, StructureChange};

// ============================================================================
// Helpers
// ============================================================================

const SYMBOL: &str = "2317";
const BAR_MS: i64 = 5 * 60 * 1000;

fn setup() -> (Arc<MarketHub>, Arc<SymbolPipeline>) {
    let config = AppConfig::default();
    let hub = Arc::new(MarketHub::from_config(&config));
    let pipeline = hub.register(&config).expect("default config registers");
    (hub, pipeline)
}

/// Timestamp inside bucket `i`
fn bucket_ts(i: i64) -> i64 {
    i * BAR_MS + 1_000
}

/// One trade per bucket at the given closes, then one more print to close the last bar.
fn feed_bars(pipeline: &SymbolPipeline, closes: &[f64]) {
    for (i, close) in closes.iter().enumerate() {
        pipeline.on_trade(&RawTrade::new(bucket_ts(i as i64), *close, 10)).unwrap();
    }
    let next = closes.len() as i64;
    let last = closes.last().copied().unwrap_or(100.0);
    pipeline.on_trade(&RawTrade::new(bucket_ts(next), last, 10)).unwrap();
}

fn signals(bus: &EventBus) -> Vec<Event> {
    bus.get_recent_events(Some(EVENT_SIGNAL), Some(1_000))
}

// ============================================================================
// TEST 1 – Flat tape: one bar, no signals
// ============================================================================

#[test]
fn test_flat_ticks_build_one_bar() {
    let (hub, pipeline) = setup();

    // One print per second, all inside the first five-minute bucket
    for i in 0..25 {
        pipeline.on_trade(&RawTrade::new(1_000 + i * 1_000, 100.0, 10)).unwrap();
    }

    let state = pipeline.get_state_at(25_100);
    let bar = state.current_bar.expect("current bar");
    assert_eq!(bar.open, 100.0);
    assert_eq!(bar.high, 100.0);
    assert_eq!(bar.low, 100.0);
    assert_eq!(bar.close, 100.0);
    assert_eq!(bar.volume, 250);
    assert_eq!(bar.tick_count, 25);
    assert!(state.closed_bars.is_empty());
    assert!(state.signals.is_empty());
    assert_eq!(state.stale_ms, Some(100));

    let bus = hub.event_bus();
    assert_eq!(bus.get_recent_events(Some(EVENT_TICK), Some(1_000)).len(), 25);
    assert!(signals(bus).is_empty());
}

// ============================================================================
// TEST 2 – Big trade against the rolling median
// ============================================================================

#[test]
fn test_big_trade_fires_once_against_median() {
    let (hub, pipeline) = setup();

    for i in 0..200 {
        pipeline.on_trade(&RawTrade::new(1_000 + i, 100.0, 10)).unwrap();
    }
    assert!(signals(hub.event_bus()).is_empty(), "Baseline prints should stay quiet");

    pipeline.on_trade(&RawTrade::new(1_500, 100.0, 100)).unwrap();

    let fired = signals(hub.event_bus());
    assert_eq!(fired.len(), 1);
    match &fired[0].payload {
        EventPayload::Signal(signal) => {
            assert_eq!(signal.kind, SignalKind::BigTrade);
            assert_eq!(signal.level, SignalLevel::Med);
            assert_eq!(signal.size, 100);
            assert_eq!(signal.notional, 10_000.0);
            match &signal.reason {
                SignalReason::BigTrade { median_size, triggers, .. } => {
                    assert_eq!(*median_size, Some(10.0));
                    assert_eq!(triggers, &vec![BigTradeTrigger::RelativeMedian]);
                }
                other => panic!("unexpected reason {:?}", other),
            }
        }
        other => panic!("unexpected payload {:?}", other),
    }
    assert_eq!(fired[0].priority, EventPriority::Medium);

    let stats = pipeline.get_stats();
    assert_eq!(stats.big_trade_signals, 1);
    assert_eq!(stats.median_trade_size, Some(10.0));
}

#[test]
fn test_absolute_floor_fires_high() {
    let (hub, pipeline) = setup();
    pipeline.on_trade(&RawTrade::new(1_000, 1_000.0, 8_000)).unwrap();

    let fired = signals(hub.event_bus());
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].priority, EventPriority::High);
}

// ============================================================================
// TEST 3 – Book wall boundary
// ============================================================================

#[test]
fn test_wall_threshold_boundary() {
    let (hub, pipeline) = setup();

    for ts in 0..50 {
        pipeline.on_book(&RawBook::new(ts, &[(99.95, 50)], &[(100.05, 50)]));
    }
    assert!(signals(hub.event_bus()).is_empty());

    pipeline.on_book(&RawBook::new(100, &[(99.95, 2_999)], &[(100.05, 50)]));
    assert!(signals(hub.event_bus()).is_empty(), "2999 sits below the 3000 floor");

    pipeline.on_book(&RawBook::new(101, &[(99.95, 3_000)], &[(100.05, 50)]));
    let fired = signals(hub.event_bus());
    assert_eq!(fired.len(), 1);
    match &fired[0].payload {
        EventPayload::Signal(signal) => {
            assert_eq!(signal.kind, SignalKind::BookWall);
            assert_eq!(signal.side, SignalSide::Bid);
            assert_eq!(signal.size, 3_000);
            assert_eq!(signal.price, 99.95);
        }
        other => panic!("unexpected payload {:?}", other),
    }

    assert_eq!(hub.event_bus().get_recent_events(Some(EVENT_BOOK), Some(1_000)).len(), 52);
}

#[test]
fn test_one_sided_book_is_kept_but_not_scored() {
    let (hub, pipeline) = setup();
    pipeline.on_book(&RawBook::new(0, &[(99.95, 50_000)], &[]));

    assert!(signals(hub.event_bus()).is_empty());
    assert!(pipeline.get_state().book.is_some());
    assert_eq!(pipeline.get_stats().books_skipped, 1);
}

// ============================================================================
// TEST 4 – Late ticks
// ============================================================================

#[test]
fn test_late_tick_is_dropped_from_bars() {
    let (hub, pipeline) = setup();

    pipeline.on_trade(&RawTrade::new(bucket_ts(0), 100.0, 10)).unwrap();
    pipeline.on_trade(&RawTrade::new(bucket_ts(1), 101.0, 10)).unwrap();
    pipeline.on_trade(&RawTrade::new(bucket_ts(0) + 5, 90.0, 10)).unwrap();

    let state = pipeline.get_state();
    assert_eq!(state.closed_bars.len(), 1);
    assert_eq!(state.closed_bars[0].low, 100.0, "Closed bar must not absorb the late print");
    let current = state.current_bar.expect("current bar");
    assert_eq!(current.low, 101.0);
    assert_eq!(current.volume, 10);
    assert_eq!(state.last.map(|t| t.price), Some(101.0));

    assert_eq!(pipeline.get_stats().late_ticks_dropped, 1);
    // Still a real print on the tape
    assert_eq!(hub.event_bus().get_recent_events(Some(EVENT_TICK), None).len(), 3);
}

// ============================================================================
// TEST 5 – Structure and daily report warm-up
// ============================================================================

#[test]
fn test_structure_needs_fifty_bars() {
    let (_, pipeline) = setup();

    let mut closes = vec![100.0; 48];
    closes.push(150.0);
    feed_bars(&pipeline, &closes);

    let state = pipeline.get_state();
    assert_eq!(state.closed_bars.len(), 49);
    assert!(state.indicators.structure_events.is_empty());

    // feed_bars left bucket 49 open at 150; the next bucket closes it
    pipeline.on_trade(&RawTrade::new(bucket_ts(50), 150.0, 10)).unwrap();

    let state = pipeline.get_state();
    assert_eq!(state.closed_bars.len(), 50);
    assert_eq!(state.indicators.structure_events, vec![StructureEvent::BreakPrevHigh]);
    assert_eq!(state.report.status, ReportStatus::Ready);
    assert_eq!(state.report.structure_change, Some(StructureChange::Strengthen));
}

#[test]
fn test_report_ready_at_thirty_bars() {
    let (hub, pipeline) = setup();

    feed_bars(&pipeline, &vec![100.0; 29]);
    let state = pipeline.get_state();
    assert_eq!(state.closed_bars.len(), 29);
    assert_eq!(state.report.status, ReportStatus::InsufficientData);
    assert!(state.report.risk_level.is_none());
    assert!(state.report.trend_state.is_none());

    pipeline.on_trade(&RawTrade::new(bucket_ts(30), 100.0, 10)).unwrap();
    let state = pipeline.get_state();
    assert_eq!(state.closed_bars.len(), 30);
    assert!(state.report.is_ready());
    assert!(state.report.risk_level.is_some());
    assert!(!state.report.conclusion.is_empty());

    let bus = hub.event_bus();
    assert_eq!(bus.get_recent_events(Some(EVENT_BAR_CLOSED), None).len(), 30);
    assert_eq!(bus.get_recent_events(Some(EVENT_INDICATORS), None).len(), 30);
}

// ============================================================================
// TEST 6 – Snapshots: direct publish and timer task
// ============================================================================

#[test]
fn test_publish_snapshots_carries_state() {
    let (hub, pipeline) = setup();
    pipeline.on_book(&RawBook::new(900, &[(99.95, 100)], &[(100.05, 100)]));
    pipeline.on_trade(&RawTrade::new(1_000, 100.0, 10)).unwrap();

    assert_eq!(publish_snapshots(&hub, 4_000), 1);

    let snaps = hub.event_bus().get_recent_events(Some(EVENT_SNAPSHOT_1S), None);
    assert_eq!(snaps.len(), 1);
    match &snaps[0].payload {
        EventPayload::Snapshot1s(snap) => {
            assert_eq!(snap.symbol, SYMBOL);
            assert_eq!(snap.server_ts, 4_000);
            assert_eq!(snap.stale_ms, Some(3_000));
            assert_eq!(snap.last.as_ref().map(|t| t.price), Some(100.0));
            assert!(snap.current_bar.is_some());
            assert!(snap.book.is_some());
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_snapshot_without_trades_has_no_staleness() {
    let (hub, _) = setup();
    publish_snapshots(&hub, 4_000);

    let snaps = hub.event_bus().get_recent_events(Some(EVENT_SNAPSHOT_1S), None);
    match &snaps[0].payload {
        EventPayload::Snapshot1s(snap) => {
            assert!(snap.last.is_none());
            assert!(snap.stale_ms.is_none());
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn test_snapshot_ticker_runs_until_shutdown() {
    let (hub, _) = setup();
    let (tx, rx) = watch::channel(false);

    let handle = spawn_snapshot_ticker(Arc::clone(&hub), 10, rx);
    tokio::time::sleep(Duration::from_millis(80)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let published = hub.event_bus().get_recent_events(Some(EVENT_SNAPSHOT_1S), None).len();
    assert!(published >= 2, "expected several snapshots, got {}", published);

    tokio::time::sleep(Duration::from_millis(40)).await;
    let after = hub.event_bus().get_recent_events(Some(EVENT_SNAPSHOT_1S), None).len();
    assert_eq!(published, after, "No snapshots after shutdown");
}

// ============================================================================
// TEST 7 – Mock source driving the pipeline
// ============================================================================

#[test]
fn test_mock_source_feeds_pipeline() {
    let (hub, pipeline) = setup();
    let mut source = MockSource::with_seed(MockSourceConfig::default(), 11);

    let mut last_price = None;
    let mut trades = 0;
    for i in 0..60 {
        for emission in source.step(1_000 + i * 300) {
            pipeline.on_book(&emission.book);
            tape_sentinel::layer1::TickSink::on_trade(&*pipeline, emission.trade);
            last_price = Some(emission.price);
            trades += 1;
        }
    }

    let state = pipeline.get_state();
    assert_eq!(state.last.as_ref().map(|t| t.price), last_price);
    assert!(state.book.is_some());

    let stats = pipeline.get_stats();
    assert_eq!(stats.trades_accepted, trades);
    assert_eq!(stats.trades_skipped, 0);
    assert_eq!(hub.event_bus().get_recent_events(Some(EVENT_TICK), Some(10_000)).len() as u64, trades);
}

#[tokio::test]
async fn test_mock_source_task_with_subscriber() {
    let (hub, pipeline) = setup();
    let seen: Arc<Mutex<u64>> = Arc::new(Mutex::new(0));

    let seen_clone = seen.clone();
    let reader = Arc::clone(&pipeline);
    hub.event_bus().subscribe(EVENT_TICK, move |_| {
        // Reading state from inside a callback must not deadlock
        let _ = reader.get_state();
        *seen_clone.lock().unwrap() += 1;
    });

    let config = MockSourceConfig { interval_ms: 5, ..MockSourceConfig::default() };
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(MockSource::with_seed(config, 3).run(Arc::clone(&pipeline), rx));

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(*seen.lock().unwrap(), stats.trades_emitted);
    assert_eq!(pipeline.get_stats().trades_accepted, stats.trades_emitted);
}

// ============================================================================
// TEST 8 – Hub routing
// ============================================================================

#[test]
fn test_hub_routes_by_symbol() {
    let (hub, _) = setup();
    let mut other = AppConfig::default();
    other.monitor.symbol = "0050".to_string();
    hub.register(&other).unwrap();

    assert_eq!(hub.symbols(), vec!["0050".to_string(), "2317".to_string()]);

    hub.on_trade("0050", &RawTrade::new(1_000, 150.0, 1)).unwrap();
    assert_eq!(hub.get_state("0050").unwrap().last.map(|t| t.price), Some(150.0));
    assert!(hub.get_state(SYMBOL).unwrap().last.is_none());
    assert!(hub.on_trade("9999", &RawTrade::new(1_000, 1.0, 1)).is_err());

    // Unusable payloads are skipped, not errors at the hub level
    let raw = RawTrade::from_json(r#"{"price": "abc", "size": 1}"#).unwrap();
    assert!(hub.on_trade(SYMBOL, &raw).unwrap().is_none());
}
