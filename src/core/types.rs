// Core Type Definitions for Tape Sentinel
// Ticks, book snapshots, bars and signals shared by every layer

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Enums
// ============================================================================

/// Aggressor side of a trade print
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
    Mid,
    #[default]
    Unknown,
}

impl Side {
    pub fn is_tagged(&self) -> bool {
        !matches!(self, Side::Unknown)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
            Side::Mid => write!(f, "MID"),
            Side::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" | "B" => Ok(Side::Buy),
            "SELL" | "S" => Ok(Side::Sell),
            "MID" => Ok(Side::Mid),
            "UNKNOWN" | "UNK" => Ok(Side::Unknown),
            _ => Err(format!("Invalid Side: '{}'. Expected BUY, SELL, MID or UNKNOWN", s)),
        }
    }
}

/// Side attached to a signal: trade aggressor for big trades, book side for walls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSide {
    Buy,
    Sell,
    Mid,
    Unknown,
    Bid,
    Ask,
}

impl From<Side> for SignalSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => SignalSide::Buy,
            Side::Sell => SignalSide::Sell,
            Side::Mid => SignalSide::Mid,
            Side::Unknown => SignalSide::Unknown,
        }
    }
}

impl fmt::Display for SignalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalSide::Buy => "BUY",
            SignalSide::Sell => "SELL",
            SignalSide::Mid => "MID",
            SignalSide::Unknown => "UNKNOWN",
            SignalSide::Bid => "BID",
            SignalSide::Ask => "ASK",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    BigTrade,
    BookWall,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::BigTrade => write!(f, "BIG_TRADE"),
            SignalKind::BookWall => write!(f, "BOOK_WALL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalLevel {
    Med,
    High,
}

impl fmt::Display for SignalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalLevel::Med => write!(f, "MED"),
            SignalLevel::High => write!(f, "HIGH"),
        }
    }
}

// ============================================================================
// Tick
// ============================================================================

/// A single trade print after ingestion coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub timestamp: i64, // milliseconds
    pub price: f64,
    pub size: u64,
    pub sequence: u64,
    pub side: Side,
    /// Quoted best bid at the time of the print, when the source supplies it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
}

impl Tick {
    pub fn new(symbol: &str, timestamp: i64, price: f64, size: u64, sequence: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp,
            price,
            size,
            sequence,
            side: Side::Unknown,
            bid: None,
            ask: None,
        }
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn notional(&self) -> f64 {
        self.size as f64 * self.price
    }
}

// ============================================================================
// Order Book
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: u64,
}

impl BookLevel {
    pub fn new(price: f64, size: u64) -> Self {
        Self { price, size }
    }
}

/// Full top-of-book replacement; levels are ordered best-first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub timestamp: i64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// True when both sides carry at least one level
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Classify a trade price against the top of book.
    /// At or through the ask is a buy, at or through the bid a sell, inside the spread MID.
    pub fn infer_side(&self, trade_price: f64) -> Side {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => {
                if trade_price >= ask.price {
                    Side::Buy
                } else if trade_price <= bid.price {
                    Side::Sell
                } else {
                    Side::Mid
                }
            }
            _ => Side::Unknown,
        }
    }
}

/// Infer side from an optional book; no usable book means UNKNOWN
pub fn infer_side(book: Option<&BookSnapshot>, trade_price: f64) -> Side {
    book.map(|b| b.infer_side(trade_price)).unwrap_or(Side::Unknown)
}

// ============================================================================
// Bar
// ============================================================================

/// OHLCV aggregate over one fixed-width window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub start_timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub tick_count: u64,
}

impl Bar {
    /// Seed a bar from the first tick of its window
    pub fn seed(start_timestamp: i64, price: f64, size: u64) -> Self {
        Self {
            start_timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: size,
            tick_count: 1,
        }
    }

    pub fn apply(&mut self, price: f64, size: u64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume = self.volume.saturating_add(size);
        self.tick_count += 1;
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// True range against the previous bar's close
    pub fn true_range(&self, prev_close: f64) -> f64 {
        self.range()
            .max((self.high - prev_close).abs())
            .max((self.low - prev_close).abs())
    }
}

impl fmt::Display for Bar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bar(start={}, o={:.2}, h={:.2}, l={:.2}, c={:.2}, v={}, n={})",
            self.start_timestamp, self.open, self.high, self.low, self.close, self.volume, self.tick_count
        )
    }
}

// ============================================================================
// Signal
// ============================================================================

/// Which big-trade rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BigTradeTrigger {
    AbsoluteSize,
    AbsoluteNotional,
    RelativeMedian,
}

/// Thresholds and baseline that produced a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SignalReason {
    BigTrade {
        min_size: u64,
        min_notional: f64,
        median_multiplier: f64,
        median_size: Option<f64>,
        triggers: Vec<BigTradeTrigger>,
    },
    BookWall {
        min_size: u64,
        median_multiplier: f64,
        median_size: Option<f64>,
        threshold: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: i64,
    pub kind: SignalKind,
    pub level: SignalLevel,
    pub symbol: String,
    pub side: SignalSide,
    pub price: f64,
    pub size: u64,
    pub notional: f64,
    pub reason: SignalReason,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signal({} {} {} {} @ {:.2} x {})",
            self.kind, self.level, self.symbol, self.side, self.price, self.size
        )
    }
}
