// Symbol Pipeline - Ingest -> Bars -> Detection -> Indicators -> Report, per symbol
// MarketHub owns one pipeline per registered symbol and the shared EventBus

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::{AppConfig, ConfigError};
use crate::core::events::{EventBus, EventPayload};
use crate::core::logger::symbol_span;
use crate::core::types::{BookSnapshot, Tick};
use crate::layer2::ingest::{now_ms, IngestError, Ingestor, RawBook, RawTrade};
use crate::layer2::metrics::PipelineStats;
use crate::layer2::snapshot::Snapshot1s;
use crate::layer2::state_store::{StateSnapshot, StateStore};
use crate::layer3::anomaly::AnomalyDetector;
use crate::layer3::bars::{BarAggregator, BarTransition};
use crate::layer3::indicators::IndicatorEngine;
use crate::layer3::report::DailyClassifier;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Symbol already registered: {0}")]
    DuplicateSymbol(String),

    #[error("Invalid pipeline config: {0}")]
    Config(#[from] ConfigError),
}

// ============================================================================
// Symbol Engine
// ============================================================================

/// Mutable processing components; one lock serialises every ingest call
struct SymbolEngine {
    ingestor: Ingestor,
    aggregator: BarAggregator,
    detector: AnomalyDetector,
    indicators: IndicatorEngine,
    classifier: DailyClassifier,
}

impl SymbolEngine {
    /// Refresh indicators and the daily report from the closed-bar history
    fn refresh_analytics(&mut self, store: &mut StateStore) -> EventPayload {
        let closed = store.bars().closed_vec();
        let indicators = self.indicators.compute(&closed);
        let report = self.classifier.classify(&indicators, &closed);

        debug!(
            symbol = %store.symbol(),
            bars = closed.len(),
            report = %report,
            "Analytics refreshed"
        );

        store.set_analytics(indicators.clone(), report.clone());
        EventPayload::Indicators {
            symbol: store.symbol().to_string(),
            indicators,
            report,
        }
    }
}

// ============================================================================
// Symbol Pipeline
// ============================================================================

pub struct SymbolPipeline {
    symbol: String,
    engine: Mutex<SymbolEngine>,
    store: Arc<RwLock<StateStore>>,
    event_bus: Arc<EventBus>,
    recent_signal_limit: usize,
}

impl SymbolPipeline {
    pub fn new(config: &AppConfig, event_bus: Arc<EventBus>) -> Result<Self, ConfigError> {
        config.validate()?;

        let monitor = &config.monitor;
        let symbol = monitor.symbol.clone();
        info!(symbol = %symbol, name = %monitor.name, "Creating symbol pipeline");

        let engine = SymbolEngine {
            ingestor: Ingestor::new(&symbol),
            aggregator: BarAggregator::new(symbol.clone(), monitor.bar_width_ms)?,
            detector: AnomalyDetector::new(symbol.clone(), config.thresholds.clone()),
            indicators: IndicatorEngine::new(config.indicators.clone()),
            classifier: DailyClassifier::new(&config.indicators, monitor.session_utc_offset_minutes),
        };

        Ok(Self {
            store: Arc::new(RwLock::new(StateStore::new(monitor, &config.indicators))),
            engine: Mutex::new(engine),
            recent_signal_limit: monitor.recent_signal_limit,
            event_bus,
            symbol,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Apply one trade print. Events are published after all locks are released,
    /// so subscribers may call back into `get_state`.
    pub fn on_trade(&self, raw: &RawTrade) -> Result<Tick, IngestError> {
        let _span = symbol_span(&self.symbol).entered();
        let received_ms = now_ms();
        let mut events = Vec::with_capacity(4);

        let tick = {
            let mut engine = self.engine.lock();
            let mut store = self.store.write();

            let tick = match engine.ingestor.coerce_trade(raw, store.book(), received_ms) {
                Ok(tick) => tick,
                Err(e) => {
                    debug!(error = %e, "Trade skipped");
                    return Err(e);
                }
            };

            let transition = engine.aggregator.handle_tick(store.bars_mut(), &tick);
            let late = matches!(transition, BarTransition::Late { .. });

            // A late print still happened; it just cannot move `last` backwards
            if !late {
                store.set_last(tick.clone());
            }
            events.push(EventPayload::Tick(tick.clone()));

            if let Some(closed) = transition.closed() {
                events.push(EventPayload::BarClosed {
                    symbol: self.symbol.clone(),
                    bar: closed.clone(),
                });
                events.push(engine.refresh_analytics(&mut store));
            }
            if let Some(current) = transition.current() {
                events.push(EventPayload::BarUpdate {
                    symbol: self.symbol.clone(),
                    bar: current.clone(),
                });
            }

            let book = store.book().cloned();
            if let Some(signal) = engine.detector.on_trade(&tick, book.as_ref()) {
                store.push_signal(signal.clone());
                events.push(EventPayload::Signal(signal));
            }

            tick
        };

        for payload in events {
            self.event_bus.publish_payload(payload);
        }
        Ok(tick)
    }

    /// Replace the book and run wall detection
    pub fn on_book(&self, raw: &RawBook) -> BookSnapshot {
        let _span = symbol_span(&self.symbol).entered();
        let received_ms = now_ms();
        let mut events = Vec::with_capacity(3);

        let book = {
            let mut engine = self.engine.lock();
            let book = engine.ingestor.coerce_book(raw, received_ms);
            let signals = engine.detector.on_book(&book);

            let mut store = self.store.write();
            store.set_book(book.clone());
            events.push(EventPayload::Book(book.clone()));
            for signal in signals {
                store.push_signal(signal.clone());
                events.push(EventPayload::Signal(signal));
            }
            book
        };

        for payload in events {
            self.event_bus.publish_payload(payload);
        }
        book
    }

    /// Owned copy of the current state
    pub fn get_state(&self) -> StateSnapshot {
        self.store.read().snapshot(now_ms(), self.recent_signal_limit)
    }

    /// Same as `get_state` with an explicit server time
    pub fn get_state_at(&self, server_ts: i64) -> StateSnapshot {
        self.store.read().snapshot(server_ts, self.recent_signal_limit)
    }

    pub fn snapshot_1s(&self, server_ts: i64) -> Snapshot1s {
        let store = self.store.read();
        Snapshot1s {
            symbol: self.symbol.clone(),
            server_ts,
            last: store.last().cloned(),
            stale_ms: store.stale_ms(server_ts),
            current_bar: store.current_bar().cloned(),
            book: store.book().cloned(),
        }
    }

    /// Record the source label after selection/fallback
    pub fn set_source(&self, source: &str) {
        self.store.write().set_source(source);
    }

    pub fn get_stats(&self) -> PipelineStats {
        let engine = self.engine.lock();
        let store = self.store.read();
        let ingest = engine.ingestor.stats();
        let detector = engine.detector.get_stats();
        let server_ts = now_ms();

        PipelineStats {
            symbol: self.symbol.clone(),
            source: store.source().to_string(),
            trades_accepted: ingest.trades_accepted,
            trades_skipped: ingest.trades_skipped,
            books_accepted: ingest.books_accepted,
            levels_dropped: ingest.levels_dropped,
            late_ticks_dropped: engine.aggregator.late_ticks_dropped(),
            bars_closed: engine.aggregator.bars_closed(),
            closed_bars_held: store.bars().closed_len(),
            big_trade_signals: detector.trade_events,
            book_wall_signals: detector.book_events,
            books_skipped: detector.books_skipped,
            median_trade_size: detector.median_trade_size,
            store: store.stats().clone(),
            last_price: store.last().map(|t| t.price),
            stale_ms: store.stale_ms(server_ts),
        }
    }
}

// ============================================================================
// Market Hub
// ============================================================================

/// Registry of symbol pipelines sharing one EventBus
pub struct MarketHub {
    pipelines: RwLock<HashMap<String, Arc<SymbolPipeline>>>,
    event_bus: Arc<EventBus>,
}

impl MarketHub {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
            event_bus,
        }
    }

    /// Hub whose EventBus is sized from the monitor config
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Arc::new(EventBus::with_capacity(
            config.monitor.event_history_capacity,
            config.monitor.broadcast_buffer,
        )))
    }

    pub fn register(&self, config: &AppConfig) -> Result<Arc<SymbolPipeline>, HubError> {
        let symbol = config.monitor.symbol.clone();
        let mut pipelines = self.pipelines.write();
        if pipelines.contains_key(&symbol) {
            return Err(HubError::DuplicateSymbol(symbol));
        }

        let pipeline = Arc::new(SymbolPipeline::new(config, Arc::clone(&self.event_bus))?);
        pipelines.insert(symbol.clone(), Arc::clone(&pipeline));
        info!(symbol = %symbol, total = pipelines.len(), "Symbol registered");
        Ok(pipeline)
    }

    pub fn pipeline(&self, symbol: &str) -> Result<Arc<SymbolPipeline>, HubError> {
        self.pipelines
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| HubError::UnknownSymbol(symbol.to_string()))
    }

    /// All pipelines, sorted by symbol
    pub fn pipelines(&self) -> Vec<Arc<SymbolPipeline>> {
        let mut all: Vec<Arc<SymbolPipeline>> = self.pipelines.read().values().cloned().collect();
        all.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        all
    }

    pub fn symbols(&self) -> Vec<String> {
        self.pipelines().iter().map(|p| p.symbol().to_string()).collect()
    }

    pub fn get_state(&self, symbol: &str) -> Result<StateSnapshot, HubError> {
        Ok(self.pipeline(symbol)?.get_state())
    }

    pub fn on_trade(&self, symbol: &str, raw: &RawTrade) -> Result<Option<Tick>, HubError> {
        Ok(self.pipeline(symbol)?.on_trade(raw).ok())
    }

    pub fn on_book(&self, symbol: &str, raw: &RawBook) -> Result<BookSnapshot, HubError> {
        Ok(self.pipeline(symbol)?.on_book(raw))
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{EVENT_BAR_CLOSED, EVENT_INDICATORS, EVENT_SIGNAL, EVENT_TICK};
    use crate::core::types::{Side, SignalKind};

    fn hub() -> (MarketHub, Arc<SymbolPipeline>) {
        let hub = MarketHub::new(Arc::new(EventBus::new()));
        let pipeline = hub.register(&AppConfig::default()).unwrap();
        (hub, pipeline)
    }

    #[test]
    fn test_register_and_lookup() {
        let (hub, _) = hub();
        assert_eq!(hub.symbols(), vec!["2317".to_string()]);
        assert!(matches!(hub.register(&AppConfig::default()), Err(HubError::DuplicateSymbol(_))));
        assert!(matches!(hub.get_state("0050"), Err(HubError::UnknownSymbol(_))));
        assert!(hub.get_state("2317").is_ok());
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let hub = MarketHub::new(Arc::new(EventBus::new()));
        let mut config = AppConfig::default();
        config.monitor.bar_width_ms = 0;
        assert!(matches!(hub.register(&config), Err(HubError::Config(_))));
    }

    #[test]
    fn test_trade_updates_state_and_publishes() {
        let (hub, pipeline) = hub();
        pipeline.on_trade(&RawTrade::new(1_000, 100.0, 10)).unwrap();

        let state = pipeline.get_state_at(1_500);
        assert_eq!(state.last.as_ref().map(|t| t.price), Some(100.0));
        assert_eq!(state.stale_ms, Some(500));
        assert_eq!(state.current_bar.as_ref().map(|b| b.volume), Some(10));

        let ticks = hub.event_bus().get_recent_events(Some(EVENT_TICK), None);
        assert_eq!(ticks.len(), 1);

        pipeline.on_book(&RawBook::new(1_200, &[(99.95, 50)], &[(100.05, 50)]));
        let stats = pipeline.get_stats();
        assert_eq!(stats.store.trades_applied, 1);
        assert_eq!(stats.store.books_applied, 1);
    }

    #[test]
    fn test_extreme_timestamps_are_coerced_not_fatal() {
        let (_, pipeline) = hub();
        let raw = RawTrade::from_json(r#"{"ts": -1e19, "price": 100, "size": 1}"#).unwrap();
        let before = now_ms();
        let tick = pipeline.on_trade(&raw).unwrap();
        assert!(tick.timestamp >= before);

        // Bars near the latest accepted time still close and classify
        let start = (crate::layer2::ingest::MAX_TIMESTAMP_MS / 300_000 - 40) * 300_000 + 150_000;
        for i in 0..35 {
            pipeline.on_trade(&RawTrade::new(start + i * 300_000, 100.0, 1)).unwrap();
        }
        let state = pipeline.get_state();
        assert_eq!(state.closed_bars.len(), 35);
        assert!(state.report.is_ready());
        assert!(state.stale_ms.is_some());
    }

    #[test]
    fn test_skipped_trade_leaves_state_untouched() {
        let (_, pipeline) = hub();
        let raw = RawTrade::from_json(r#"{"size": 10}"#).unwrap();
        assert!(pipeline.on_trade(&raw).is_err());
        assert!(pipeline.get_state().last.is_none());
        assert_eq!(pipeline.get_stats().trades_skipped, 1);
    }

    #[test]
    fn test_bar_close_refreshes_analytics() {
        let (hub, pipeline) = hub();
        pipeline.on_trade(&RawTrade::new(1_000, 100.0, 10)).unwrap();
        pipeline.on_trade(&RawTrade::new(301_000, 101.0, 10)).unwrap();

        let bus = hub.event_bus();
        assert_eq!(bus.get_recent_events(Some(EVENT_BAR_CLOSED), None).len(), 1);
        assert_eq!(bus.get_recent_events(Some(EVENT_INDICATORS), None).len(), 1);

        let state = pipeline.get_state();
        assert_eq!(state.closed_bars.len(), 1);
        assert_eq!(state.indicators.bar_count, 1);
        assert!(!state.report.is_ready());
    }

    #[test]
    fn test_late_trade_keeps_last() {
        let (_, pipeline) = hub();
        pipeline.on_trade(&RawTrade::new(301_000, 101.0, 10)).unwrap();
        pipeline.on_trade(&RawTrade::new(1_000, 50.0, 10)).unwrap();

        let state = pipeline.get_state();
        assert_eq!(state.last.as_ref().map(|t| t.price), Some(101.0));
        assert_eq!(state.current_bar.as_ref().map(|b| b.low), Some(101.0));
        assert!(state.closed_bars.is_empty());
        assert_eq!(pipeline.get_stats().late_ticks_dropped, 1);
    }

    #[test]
    fn test_book_sets_side_and_walls() {
        let (hub, pipeline) = hub();
        for ts in 0..20 {
            pipeline.on_book(&RawBook::new(ts, &[(99.95, 50)], &[(100.05, 50)]));
        }
        pipeline.on_book(&RawBook::new(1_000, &[(99.95, 5_000)], &[(100.05, 100)]));
        let tick = pipeline.on_trade(&RawTrade::new(1_001, 100.05, 5)).unwrap();
        assert_eq!(tick.side, Side::Buy);

        let signals = hub.event_bus().get_recent_events(Some(EVENT_SIGNAL), None);
        assert_eq!(signals.len(), 1);
        let state = pipeline.get_state();
        assert_eq!(state.signals.len(), 1);
        assert_eq!(state.signals[0].kind, SignalKind::BookWall);
        assert!(state.book.is_some());
    }

    #[test]
    fn test_subscriber_can_read_state_during_publish() {
        let (hub, pipeline) = hub();
        let reader = Arc::clone(&pipeline);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        hub.event_bus().subscribe(EVENT_TICK, move |_| {
            let price = reader.get_state().last.map(|t| t.price);
            seen_clone.lock().push(price);
        });

        pipeline.on_trade(&RawTrade::new(1_000, 100.0, 1)).unwrap();
        assert_eq!(*seen.lock(), vec![Some(100.0)]);
    }
}
