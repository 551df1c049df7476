// Big Trade Tracker - Flags oversized prints against absolute floors and the rolling median
// Emits BIG_TRADE signals, MED or HIGH

use crate::core::config::DetectorThresholds;
use crate::core::types::{
    infer_side, BigTradeTrigger, BookSnapshot, Signal, SignalKind, SignalLevel, SignalReason, Tick,
};
use crate::layer3::common::RollingWindow;
use tracing::debug;

pub struct BigTradeTracker {
    symbol: String,
    sizes: RollingWindow,

    min_size: u64,
    min_notional: f64,
    median_multiplier: f64,
    high_notional: f64,
    high_size: u64,

    // Statistics
    updates_processed: u64,
    events_fired: u64,
}

impl BigTradeTracker {
    pub fn new(symbol: String, thresholds: &DetectorThresholds) -> Self {
        Self {
            symbol,
            sizes: RollingWindow::new(thresholds.trade_size_window),
            min_size: thresholds.big_trade_min_size,
            min_notional: thresholds.big_trade_min_notional,
            median_multiplier: thresholds.big_trade_median_multiplier,
            high_notional: thresholds.big_trade_high_notional,
            high_size: thresholds.big_trade_high_size,
            updates_processed: 0,
            events_fired: 0,
        }
    }

    /// Record the print and classify it. The median includes the print itself.
    pub fn update(&mut self, tick: &Tick, book: Option<&BookSnapshot>) -> Option<Signal> {
        self.updates_processed += 1;
        self.sizes.push(tick.size as f64);

        let median = self.sizes.median();
        let notional = tick.notional();
        let size = tick.size as f64;

        let mut triggers = Vec::new();
        if tick.size >= self.min_size {
            triggers.push(BigTradeTrigger::AbsoluteSize);
        }
        if notional >= self.min_notional {
            triggers.push(BigTradeTrigger::AbsoluteNotional);
        }
        if let Some(m) = median.filter(|m| *m > 0.0) {
            if size >= m * self.median_multiplier {
                triggers.push(BigTradeTrigger::RelativeMedian);
            }
        }

        if triggers.is_empty() {
            return None;
        }

        let side = if tick.side.is_tagged() {
            tick.side
        } else {
            infer_side(book, tick.price)
        };

        let level = if notional >= self.high_notional || tick.size >= self.high_size {
            SignalLevel::High
        } else {
            SignalLevel::Med
        };

        self.events_fired += 1;
        debug!(
            symbol = %self.symbol,
            price = tick.price,
            size = tick.size,
            median = ?median,
            level = %level,
            "Big trade detected"
        );

        Some(Signal {
            timestamp: tick.timestamp,
            kind: SignalKind::BigTrade,
            level,
            symbol: self.symbol.clone(),
            side: side.into(),
            price: tick.price,
            size: tick.size,
            notional,
            reason: SignalReason::BigTrade {
                min_size: self.min_size,
                min_notional: self.min_notional,
                median_multiplier: self.median_multiplier,
                median_size: median,
                triggers,
            },
        })
    }

    pub fn median_size(&self) -> Option<f64> {
        self.sizes.median()
    }

    pub fn updates_processed(&self) -> u64 {
        self.updates_processed
    }

    pub fn events_fired(&self) -> u64 {
        self.events_fired
    }
}
