// Anomaly Detector - Orchestrates the big-trade and book-wall trackers for one symbol
// Owned by the symbol engine; callers publish the returned signals

use crate::core::config::DetectorThresholds;
use crate::core::types::{BookSnapshot, Signal, Tick};
use tracing::debug;

use super::big_trade::BigTradeTracker;
use super::book_wall::BookWallTracker;

pub struct AnomalyDetector {
    symbol: String,
    big_trade_tracker: BigTradeTracker,
    book_wall_tracker: BookWallTracker,
    thresholds: DetectorThresholds,
}

impl AnomalyDetector {
    pub fn new(symbol: String, thresholds: DetectorThresholds) -> Self {
        debug!(symbol = %symbol, "Initializing AnomalyDetector");

        Self {
            big_trade_tracker: BigTradeTracker::new(symbol.clone(), &thresholds),
            book_wall_tracker: BookWallTracker::new(symbol.clone(), &thresholds),
            symbol,
            thresholds,
        }
    }

    /// Every trade feeds the size baseline; `book` is the latest snapshot, used
    /// for side inference when the print is untagged
    pub fn on_trade(&mut self, tick: &Tick, book: Option<&BookSnapshot>) -> Option<Signal> {
        self.big_trade_tracker.update(tick, book)
    }

    pub fn on_book(&mut self, book: &BookSnapshot) -> Vec<Signal> {
        self.book_wall_tracker.update(book)
    }

    pub fn get_stats(&self) -> AnomalyDetectorStats {
        let trade_updates = self.big_trade_tracker.updates_processed();
        let trade_events = self.big_trade_tracker.events_fired();
        let book_updates = self.book_wall_tracker.updates_processed();
        let book_events = self.book_wall_tracker.events_fired();

        AnomalyDetectorStats {
            symbol: self.symbol.clone(),
            total_events_fired: trade_events + book_events,
            trade_updates,
            trade_events,
            book_updates,
            book_events,
            books_skipped: self.book_wall_tracker.books_skipped(),
            median_trade_size: self.big_trade_tracker.median_size(),
        }
    }

    pub fn thresholds(&self) -> &DetectorThresholds {
        &self.thresholds
    }
}

#[derive(Debug, Clone)]
pub struct AnomalyDetectorStats {
    pub symbol: String,
    pub total_events_fired: u64,
    pub trade_updates: u64,
    pub trade_events: u64,
    pub book_updates: u64,
    pub book_events: u64,
    pub books_skipped: u64,
    pub median_trade_size: Option<f64>,
}
