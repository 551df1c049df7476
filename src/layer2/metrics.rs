// Pipeline Metrics - Collects per-component counters for one symbol
// Aggregates ingest, bar, detector and store stats into a single view

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::layer2::state_store::StateStoreStats;

/// Unified counters snapshot for one symbol pipeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub symbol: String,
    pub source: String,

    // Ingest
    pub trades_accepted: u64,
    pub trades_skipped: u64,
    pub books_accepted: u64,
    pub levels_dropped: u64,

    // Bars
    pub late_ticks_dropped: u64,
    pub bars_closed: u64,
    pub closed_bars_held: usize,

    // Detection
    pub big_trade_signals: u64,
    pub book_wall_signals: u64,
    pub books_skipped: u64,
    pub median_trade_size: Option<f64>,

    // Store
    pub store: StateStoreStats,

    // Latest values
    pub last_price: Option<f64>,
    pub stale_ms: Option<i64>,
}

impl PipelineStats {
    pub fn total_signals(&self) -> u64 {
        self.big_trade_signals + self.book_wall_signals
    }

    /// Inputs that did not reach the bar aggregator
    pub fn total_rejected(&self) -> u64 {
        self.trades_skipped + self.late_ticks_dropped
    }

    /// Print detailed multi-line report
    pub fn print_report(&self) {
        info!("=== PIPELINE METRICS [{}] ===", self.symbol);
        info!("  Ingest:   trades={} skipped={} books={} levels_dropped={}",
            self.trades_accepted, self.trades_skipped, self.books_accepted, self.levels_dropped);
        info!("  Bars:     closed={} held={} late={}",
            self.bars_closed, self.closed_bars_held, self.late_ticks_dropped);
        info!("  Signals:  big_trade={} book_wall={} one_sided_books={}",
            self.big_trade_signals, self.book_wall_signals, self.books_skipped);
        info!("  Store:    {}", self.store);
    }

    /// Print compact single-line stats for periodic logging
    pub fn print_compact(&self, elapsed_secs: u64) {
        let last = self.last_price.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".to_string());
        let stale = self.stale_ms.map(|s| format!("{}ms", s)).unwrap_or_else(|| "-".to_string());
        let median = self.median_trade_size.map(|m| format!("{:.0}", m)).unwrap_or_else(|| "-".to_string());

        info!("[{:>4}s] {} last={} stale={} | trades={} books={} skip={} late={} | bars={} | sig={} (big={} wall={}) med={}",
            elapsed_secs, self.symbol, last, stale,
            self.trades_accepted, self.books_accepted, self.trades_skipped, self.late_ticks_dropped,
            self.bars_closed,
            self.total_signals(), self.big_trade_signals, self.book_wall_signals, median);
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline(symbol={}, source={}, trades={}, books={}, bars={}, signals={})",
            self.symbol,
            self.source,
            self.trades_accepted,
            self.books_accepted,
            self.bars_closed,
            self.total_signals()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = PipelineStats::default();
        assert_eq!(stats.total_signals(), 0);
        assert_eq!(stats.total_rejected(), 0);
    }

    #[test]
    fn test_totals() {
        let stats = PipelineStats {
            trades_skipped: 2,
            late_ticks_dropped: 3,
            big_trade_signals: 4,
            book_wall_signals: 1,
            ..Default::default()
        };
        assert_eq!(stats.total_signals(), 5);
        assert_eq!(stats.total_rejected(), 5);
    }

    #[test]
    fn test_display() {
        let stats = PipelineStats { symbol: "2317".to_string(), source: "mock".to_string(), ..Default::default() };
        let s = format!("{}", stats);
        assert!(s.contains("symbol=2317"));
        assert!(s.contains("signals=0"));
        assert_eq!(format!("{}", stats.store), "StateStore(trades=0, books=0, signals=0, refreshes=0)");
    }
}
