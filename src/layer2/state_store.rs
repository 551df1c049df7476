// State Store - Per-symbol aggregate record written only by the symbol engine
// Readers get owned snapshots, never references into live buffers

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

use crate::core::config::{IndicatorParams, MonitorConfig};
use crate::core::types::{Bar, BookSnapshot, Signal, Tick};
use crate::layer3::bars::BarSeries;
use crate::layer3::indicators::IndicatorState;
use crate::layer3::report::DailyReport;

/// Statistics snapshot from the state store
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateStoreStats {
    pub trades_applied: u64,
    pub books_applied: u64,
    pub signals_recorded: u64,
    pub analytics_refreshes: u64,
}

impl fmt::Display for StateStoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StateStore(trades={}, books={}, signals={}, refreshes={})",
            self.trades_applied, self.books_applied, self.signals_recorded, self.analytics_refreshes
        )
    }
}

pub struct StateStore {
    symbol: String,
    name: String,
    source: String,

    last: Option<Tick>,
    book: Option<BookSnapshot>,
    bars: BarSeries,

    signals: VecDeque<Signal>,
    max_signals: usize,

    indicators: IndicatorState,
    report: DailyReport,

    stats: StateStoreStats,
}

impl StateStore {
    pub fn new(config: &MonitorConfig, params: &IndicatorParams) -> Self {
        Self {
            symbol: config.symbol.clone(),
            name: config.name.clone(),
            source: config.source.to_string(),
            last: None,
            book: None,
            bars: BarSeries::new(config.closed_bar_capacity),
            signals: VecDeque::with_capacity(config.signal_capacity.min(10_000)),
            max_signals: config.signal_capacity.max(1),
            indicators: IndicatorState::default(),
            report: DailyReport::insufficient_data(0, params.classifier_min_bars),
            stats: StateStoreStats::default(),
        }
    }

    // ------------------------------------------------------------------------
    // Writers (symbol engine only)
    // ------------------------------------------------------------------------

    pub fn set_last(&mut self, tick: Tick) {
        self.stats.trades_applied += 1;
        self.last = Some(tick);
    }

    /// Full replacement, no merge with the previous snapshot
    pub fn set_book(&mut self, book: BookSnapshot) {
        self.stats.books_applied += 1;
        self.book = Some(book);
    }

    pub fn bars_mut(&mut self) -> &mut BarSeries {
        &mut self.bars
    }

    pub fn push_signal(&mut self, signal: Signal) {
        self.stats.signals_recorded += 1;
        self.signals.push_back(signal);
        while self.signals.len() > self.max_signals {
            self.signals.pop_front();
        }
    }

    pub fn set_analytics(&mut self, indicators: IndicatorState, report: DailyReport) {
        self.stats.analytics_refreshes += 1;
        self.indicators = indicators;
        self.report = report;
    }

    /// Label of the source actually feeding this store (after any fallback)
    pub fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
    }

    // ------------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------------

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn last(&self) -> Option<&Tick> {
        self.last.as_ref()
    }

    pub fn book(&self) -> Option<&BookSnapshot> {
        self.book.as_ref()
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.bars.current()
    }

    pub fn bars(&self) -> &BarSeries {
        &self.bars
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn stats(&self) -> &StateStoreStats {
        &self.stats
    }

    /// Milliseconds since the last accepted trade, None before the first one
    pub fn stale_ms(&self, server_ts: i64) -> Option<i64> {
        self.last.as_ref().map(|t| server_ts.saturating_sub(t.timestamp))
    }

    /// Owned copy of the full state; `recent_signals` caps the signal tail
    pub fn snapshot(&self, server_ts: i64, recent_signals: usize) -> StateSnapshot {
        let skip = self.signals.len().saturating_sub(recent_signals);

        StateSnapshot {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            source: self.source.clone(),
            server_ts,
            last: self.last.clone(),
            stale_ms: self.stale_ms(server_ts),
            book: self.book.clone(),
            current_bar: self.bars.current().cloned(),
            closed_bars: self.bars.closed_vec(),
            signals: self.signals.iter().skip(skip).cloned().collect(),
            indicators: self.indicators.clone(),
            report: self.report.clone(),
        }
    }
}

/// Pull response: a frozen copy of one symbol's state
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub symbol: String,
    pub name: String,
    pub source: String,
    pub server_ts: i64,
    pub last: Option<Tick>,
    pub stale_ms: Option<i64>,
    pub book: Option<BookSnapshot>,
    pub current_bar: Option<Bar>,
    pub closed_bars: Vec<Bar>,
    /// Oldest first
    pub signals: Vec<Signal>,
    pub indicators: IndicatorState,
    pub report: DailyReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SignalKind, SignalLevel, SignalReason, SignalSide};

    fn store_with_caps(signal_capacity: usize) -> StateStore {
        let config = MonitorConfig { signal_capacity, ..MonitorConfig::default() };
        StateStore::new(&config, &IndicatorParams::default())
    }

    fn signal(ts: i64) -> Signal {
        Signal {
            timestamp: ts,
            kind: SignalKind::BookWall,
            level: SignalLevel::Med,
            symbol: "2317".to_string(),
            side: SignalSide::Ask,
            price: 100.0,
            size: 4000,
            notional: 400_000.0,
            reason: SignalReason::BookWall { min_size: 3000, median_multiplier: 8.0, median_size: None, threshold: 3000.0 },
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let store = store_with_caps(200);
        let snap = store.snapshot(1_000, 50);
        assert_eq!(snap.symbol, "2317");
        assert!(snap.last.is_none());
        assert!(snap.stale_ms.is_none());
        assert!(snap.current_bar.is_none());
        assert!(snap.signals.is_empty());
        assert!(!snap.report.is_ready());
    }

    #[test]
    fn test_signal_history_capped_and_tail_limited() {
        let mut store = store_with_caps(5);
        for ts in 0..8 {
            store.push_signal(signal(ts));
        }
        assert_eq!(store.signal_count(), 5);

        let snap = store.snapshot(0, 3);
        let ts: Vec<i64> = snap.signals.iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![5, 6, 7]);
        assert_eq!(store.stats().signals_recorded, 8);
    }

    #[test]
    fn test_stale_ms() {
        let mut store = store_with_caps(200);
        store.set_last(Tick::new("2317", 10_000, 100.0, 1, 1));
        assert_eq!(store.stale_ms(10_250), Some(250));
        assert_eq!(store.snapshot(10_500, 50).stale_ms, Some(500));

        store.set_last(Tick::new("2317", i64::MIN, 100.0, 1, 2));
        assert_eq!(store.stale_ms(i64::MAX), Some(i64::MAX));
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let mut store = store_with_caps(200);
        store.set_last(Tick::new("2317", 1, 100.0, 1, 1));
        let snap = store.snapshot(2, 50);
        store.set_last(Tick::new("2317", 5, 101.0, 1, 2));
        assert_eq!(snap.last.as_ref().map(|t| t.price), Some(100.0));
    }
}
