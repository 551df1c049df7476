// Book Wall Tracker - Detects outsized resting size at the top of book
// Bid and ask sides keep independent baselines

use crate::core::config::DetectorThresholds;
use crate::core::types::{BookLevel, BookSnapshot, Signal, SignalKind, SignalLevel, SignalReason, SignalSide};
use crate::layer3::common::RollingWindow;
use tracing::{debug, trace};

/// Book side classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    Bid,
    Ask,
}

impl From<WallSide> for SignalSide {
    fn from(side: WallSide) -> Self {
        match side {
            WallSide::Bid => SignalSide::Bid,
            WallSide::Ask => SignalSide::Ask,
        }
    }
}

pub struct BookWallTracker {
    symbol: String,
    bid_sizes: RollingWindow,
    ask_sizes: RollingWindow,

    min_size: u64,
    median_multiplier: f64,
    high_size: u64,

    // Statistics
    updates_processed: u64,
    books_skipped: u64,
    events_fired: u64,
}

impl BookWallTracker {
    pub fn new(symbol: String, thresholds: &DetectorThresholds) -> Self {
        Self {
            symbol,
            bid_sizes: RollingWindow::new(thresholds.book_size_window),
            ask_sizes: RollingWindow::new(thresholds.book_size_window),
            min_size: thresholds.wall_min_size,
            median_multiplier: thresholds.wall_median_multiplier,
            high_size: thresholds.wall_high_size,
            updates_processed: 0,
            books_skipped: 0,
            events_fired: 0,
        }
    }

    /// Check both top levels. One-sided or empty books are skipped without
    /// touching either baseline.
    pub fn update(&mut self, book: &BookSnapshot) -> Vec<Signal> {
        let (bid, ask) = match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) => (*bid, *ask),
            _ => {
                self.books_skipped += 1;
                trace!(symbol = %self.symbol, "Skipping one-sided book");
                return Vec::new();
            }
        };

        self.updates_processed += 1;
        self.bid_sizes.push(bid.size as f64);
        self.ask_sizes.push(ask.size as f64);

        let mut signals = Vec::with_capacity(2);
        if let Some(sig) = self.check_level(WallSide::Bid, bid, book.timestamp) {
            signals.push(sig);
        }
        if let Some(sig) = self.check_level(WallSide::Ask, ask, book.timestamp) {
            signals.push(sig);
        }
        signals
    }

    fn check_level(&mut self, side: WallSide, level: BookLevel, timestamp: i64) -> Option<Signal> {
        let median = match side {
            WallSide::Bid => self.bid_sizes.median(),
            WallSide::Ask => self.ask_sizes.median(),
        };

        let threshold = (self.min_size as f64).max(median.unwrap_or(0.0) * self.median_multiplier);
        if (level.size as f64) < threshold {
            return None;
        }

        let level_class = if level.size >= self.high_size {
            SignalLevel::High
        } else {
            SignalLevel::Med
        };

        self.events_fired += 1;
        debug!(
            symbol = %self.symbol,
            side = ?side,
            price = level.price,
            size = level.size,
            threshold,
            "Book wall detected"
        );

        Some(Signal {
            timestamp,
            kind: SignalKind::BookWall,
            level: level_class,
            symbol: self.symbol.clone(),
            side: side.into(),
            price: level.price,
            size: level.size,
            notional: level.price * level.size as f64,
            reason: SignalReason::BookWall {
                min_size: self.min_size,
                median_multiplier: self.median_multiplier,
                median_size: median,
                threshold,
            },
        })
    }

    pub fn bid_median(&self) -> Option<f64> {
        self.bid_sizes.median()
    }

    pub fn ask_median(&self) -> Option<f64> {
        self.ask_sizes.median()
    }

    pub fn updates_processed(&self) -> u64 {
        self.updates_processed
    }

    pub fn books_skipped(&self) -> u64 {
        self.books_skipped
    }

    pub fn events_fired(&self) -> u64 {
        self.events_fired
    }
}
