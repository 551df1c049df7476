// Mock Source - Random-walk trade/book generator for development
// Every interval emits 0..=3 trades, each preceded by a two-level book around price

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::layer1::source::TickSink;
use crate::layer2::ingest::{now_ms, RawBook, RawTrade};

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSourceConfig {
    pub interval_ms: u64,
    pub start_price: f64,
    pub max_trades_per_interval: u32,
    /// Full width of the per-trade price step; moves are uniform in +/- half of it
    pub price_step: f64,
    pub half_spread: f64,
    pub level_gap: f64,
    pub max_trade_size: u64,
    pub top_level_size: (u64, u64),
    pub second_level_size: (u64, u64),
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300,
            start_price: 110.0,
            max_trades_per_interval: 3,
            price_step: 0.15,
            half_spread: 0.05,
            level_gap: 0.05,
            max_trade_size: 60,
            top_level_size: (50, 5050),
            second_level_size: (50, 3050),
        }
    }
}

/// One generated print with the book that precedes it
#[derive(Debug, Clone)]
pub struct MockEmission {
    pub book: RawBook,
    pub trade: RawTrade,
    pub price: f64,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MockSourceStats {
    pub intervals: u64,
    pub trades_emitted: u64,
    pub books_emitted: u64,
}

impl fmt::Display for MockSourceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MockSource(intervals={}, trades={}, books={})",
            self.intervals, self.trades_emitted, self.books_emitted
        )
    }
}

pub struct MockSource {
    config: MockSourceConfig,
    rng: StdRng,
    price: f64,
    stats: MockSourceStats,
}

impl MockSource {
    pub fn new(config: MockSourceConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic stream for tests
    pub fn with_seed(config: MockSourceConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: MockSourceConfig, rng: StdRng) -> Self {
        Self {
            price: config.start_price,
            config,
            rng,
            stats: MockSourceStats::default(),
        }
    }

    fn level_size(&mut self, (lo, hi): (u64, u64)) -> u64 {
        if hi > lo {
            self.rng.random_range(lo..hi)
        } else {
            lo
        }
    }

    /// Generate one interval's worth of emissions stamped at `ts`
    pub fn step(&mut self, ts: i64) -> Vec<MockEmission> {
        self.stats.intervals += 1;
        let n = self.rng.random_range(0..=self.config.max_trades_per_interval);
        let mut out = Vec::with_capacity(n as usize);

        for _ in 0..n {
            let drift = (self.rng.random::<f64>() - 0.5) * self.config.price_step;
            self.price = round2(self.price + drift);
            let size = self.rng.random_range(1..=self.config.max_trade_size.max(1));

            let bid1 = round2(self.price - self.config.half_spread);
            let ask1 = round2(self.price + self.config.half_spread);
            let bid2 = round2(bid1 - self.config.level_gap);
            let ask2 = round2(ask1 + self.config.level_gap);

            let top = self.config.top_level_size;
            let second = self.config.second_level_size;
            let bids = [(bid1, self.level_size(top)), (bid2, self.level_size(second))];
            let asks = [(ask1, self.level_size(top)), (ask2, self.level_size(second))];

            out.push(MockEmission {
                book: RawBook::new(ts, &bids, &asks),
                trade: RawTrade::new(ts, self.price, size),
                price: self.price,
                size,
            });
        }

        self.stats.trades_emitted += n as u64;
        self.stats.books_emitted += n as u64;
        out
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn stats(&self) -> &MockSourceStats {
        &self.stats
    }

    /// Drive `sink` until `shutdown` flips to true
    pub async fn run<S: TickSink>(mut self, sink: S, mut shutdown: watch::Receiver<bool>) -> MockSourceStats {
        info!(interval_ms = self.config.interval_ms, start_price = self.price, "Mock feed started");
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for emission in self.step(now_ms()) {
                        sink.on_book(emission.book);
                        sink.on_trade(emission.trade);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!(stats = %self.stats, "Mock feed stopped");
        self.stats
    }
}
