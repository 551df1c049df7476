// Bar Aggregator - Folds ticks into fixed-width OHLCV bars
// One in-progress bar per symbol; closed bars are frozen into a capped history

use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::core::config::ConfigError;
use crate::core::types::{Bar, Tick};

/// Bar state held in the StateStore and mutated only by the aggregator
#[derive(Debug, Clone)]
pub struct BarSeries {
    current: Option<Bar>,
    closed: VecDeque<Bar>,
    max_closed: usize,
}

impl BarSeries {
    pub fn new(max_closed: usize) -> Self {
        let max_closed = max_closed.max(1);
        Self {
            current: None,
            closed: VecDeque::with_capacity(max_closed.min(10_000)),
            max_closed,
        }
    }

    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    pub fn closed(&self) -> &VecDeque<Bar> {
        &self.closed
    }

    /// Owned copy of the closed history, oldest first
    pub fn closed_vec(&self) -> Vec<Bar> {
        self.closed.iter().cloned().collect()
    }

    pub fn closed_len(&self) -> usize {
        self.closed.len()
    }

    fn push_closed(&mut self, bar: Bar) {
        self.closed.push_back(bar);
        while self.closed.len() > self.max_closed {
            self.closed.pop_front();
        }
    }
}

/// What a tick did to the series
#[derive(Debug, Clone, PartialEq)]
pub enum BarTransition {
    /// First bar of the series was seeded
    Opened { current: Bar },
    /// In-progress bar absorbed the tick
    Updated { current: Bar },
    /// Boundary crossed: `closed` was frozen, `current` seeded from the tick
    Rolled { closed: Bar, current: Bar },
    /// Tick belongs to a window earlier than the in-progress bar; dropped
    Late { tick_start: i64, current_start: i64 },
}

impl BarTransition {
    pub fn current(&self) -> Option<&Bar> {
        match self {
            BarTransition::Opened { current }
            | BarTransition::Updated { current }
            | BarTransition::Rolled { current, .. } => Some(current),
            BarTransition::Late { .. } => None,
        }
    }

    pub fn closed(&self) -> Option<&Bar> {
        match self {
            BarTransition::Rolled { closed, .. } => Some(closed),
            _ => None,
        }
    }
}

pub struct BarAggregator {
    symbol: String,
    width_ms: i64,

    // Statistics
    ticks_processed: u64,
    bars_closed: u64,
    late_ticks_dropped: u64,
}

impl BarAggregator {
    pub fn new(symbol: String, width_ms: i64) -> Result<Self, ConfigError> {
        if width_ms <= 0 {
            return Err(ConfigError::Validation(format!(
                "bar width must be positive, got {}",
                width_ms
            )));
        }

        Ok(Self {
            symbol,
            width_ms,
            ticks_processed: 0,
            bars_closed: 0,
            late_ticks_dropped: 0,
        })
    }

    /// Window start for a timestamp (floor, also for pre-epoch values)
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        timestamp.div_euclid(self.width_ms).saturating_mul(self.width_ms)
    }

    pub fn handle_tick(&mut self, series: &mut BarSeries, tick: &Tick) -> BarTransition {
        let start = self.bucket_start(tick.timestamp);

        let transition = match series.current.as_mut() {
            None => {
                let bar = Bar::seed(start, tick.price, tick.size);
                series.current = Some(bar.clone());
                BarTransition::Opened { current: bar }
            }
            Some(bar) if bar.start_timestamp == start => {
                bar.apply(tick.price, tick.size);
                BarTransition::Updated { current: bar.clone() }
            }
            Some(bar) if start < bar.start_timestamp => {
                self.late_ticks_dropped += 1;
                debug!(
                    symbol = %self.symbol,
                    tick_ts = tick.timestamp,
                    tick_start = start,
                    current_start = bar.start_timestamp,
                    "Dropping late tick"
                );
                return BarTransition::Late { tick_start: start, current_start: bar.start_timestamp };
            }
            Some(_) => {
                let fresh = Bar::seed(start, tick.price, tick.size);
                let closed = series.current.replace(fresh.clone());
                match closed {
                    Some(closed) => {
                        series.push_closed(closed.clone());
                        self.bars_closed += 1;
                        debug!(symbol = %self.symbol, bar = %closed, "Bar closed");
                        BarTransition::Rolled { closed, current: fresh }
                    }
                    None => BarTransition::Opened { current: fresh },
                }
            }
        };

        self.ticks_processed += 1;
        trace!(symbol = %self.symbol, start, "Bar updated");
        transition
    }

    pub fn width_ms(&self) -> i64 {
        self.width_ms
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    pub fn bars_closed(&self) -> u64 {
        self.bars_closed
    }

    pub fn late_ticks_dropped(&self) -> u64 {
        self.late_ticks_dropped
    }
}
