// Ingest - Coerces loosely-typed source payloads into Ticks and BookSnapshots
// Malformed fields are defaulted; only a trade without a usable price is rejected

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::types::{infer_side, BookLevel, BookSnapshot, Side, Tick};

// ============================================================================
// Raw Payloads
// ============================================================================

/// Trade print as delivered by a source. Every field is optional and may be
/// a number or a numeric string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    /// Milliseconds since epoch
    #[serde(default, alias = "timestamp")]
    pub ts: Option<Value>,
    /// Microseconds since epoch, used when `ts` is absent
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub bid: Option<Value>,
    #[serde(default)]
    pub ask: Option<Value>,
    #[serde(default, alias = "seq")]
    pub serial: Option<Value>,
    #[serde(default)]
    pub side: Option<Value>,
}

impl RawTrade {
    /// Convenience constructor for sources that already hold typed values
    pub fn new(ts: i64, price: f64, size: u64) -> Self {
        Self {
            ts: Some(Value::from(ts)),
            price: Some(Value::from(price)),
            size: Some(Value::from(size)),
            ..Self::default()
        }
    }

    pub fn from_json(raw_json: &str) -> Result<Self, IngestError> {
        serde_json::from_str(raw_json).map_err(|e| IngestError::InvalidJson(e.to_string()))
    }
}

/// Book snapshot as delivered by a source. Levels may be `{price, size}`
/// objects or `[price, size]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBook {
    #[serde(default, alias = "timestamp")]
    pub ts: Option<Value>,
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub bids: Option<Value>,
    #[serde(default)]
    pub asks: Option<Value>,
}

impl RawBook {
    pub fn new(ts: i64, bids: &[(f64, u64)], asks: &[(f64, u64)]) -> Self {
        let levels = |side: &[(f64, u64)]| {
            Value::Array(
                side.iter()
                    .map(|(p, s)| serde_json::json!({ "price": p, "size": s }))
                    .collect(),
            )
        };
        Self {
            ts: Some(Value::from(ts)),
            time: None,
            bids: Some(levels(bids)),
            asks: Some(levels(asks)),
        }
    }

    pub fn from_json(raw_json: &str) -> Result<Self, IngestError> {
        serde_json::from_str(raw_json).map_err(|e| IngestError::InvalidJson(e.to_string()))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons an input was skipped. Counted and logged, never propagated to the source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Trade has no price")]
    MissingPrice,

    #[error("Unusable price: {0}")]
    InvalidPrice(String),
}

// ============================================================================
// Coercion helpers
// ============================================================================

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Number or numeric string to a finite f64
fn coerce_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// Missing, negative or non-numeric sizes become 0
fn coerce_size(value: Option<&Value>) -> u64 {
    match value.and_then(coerce_f64) {
        Some(v) if v > 0.0 => v as u64,
        _ => 0,
    }
}

/// Latest accepted epoch millisecond; leaves headroom for bucket and session arithmetic
pub const MAX_TIMESTAMP_MS: i64 = i64::MAX / 2;

/// Epoch ms inside `0..=MAX_TIMESTAMP_MS`, floored; anything else is unusable
fn valid_ms(ms: f64) -> Option<i64> {
    let ms = ms.floor();
    if ms >= 0.0 && ms <= MAX_TIMESTAMP_MS as f64 {
        Some(ms as i64)
    } else {
        None
    }
}

/// `ts` (ms) wins, then `time` (us); out-of-range values fall through to the caller's default
fn coerce_timestamp(ts: Option<&Value>, time_us: Option<&Value>) -> Option<i64> {
    if let Some(ms) = ts.and_then(coerce_f64).and_then(valid_ms) {
        return Some(ms);
    }
    time_us.and_then(coerce_f64).and_then(|us| valid_ms(us / 1000.0))
}

fn coerce_levels(value: Option<&Value>) -> (Vec<BookLevel>, usize) {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return (Vec::new(), 0),
    };

    let mut dropped = 0;
    let levels = items
        .iter()
        .filter_map(|item| {
            let (price, size) = match item {
                Value::Object(map) => (map.get("price"), map.get("size")),
                Value::Array(pair) => (pair.first(), pair.get(1)),
                _ => (None, None),
            };
            match price.and_then(coerce_f64) {
                Some(p) => Some(BookLevel::new(p, coerce_size(size))),
                None => {
                    dropped += 1;
                    None
                }
            }
        })
        .collect();

    (levels, dropped)
}

// ============================================================================
// Ingestor
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub trades_accepted: u64,
    pub trades_skipped: u64,
    pub books_accepted: u64,
    pub levels_dropped: u64,
    pub sides_inferred: u64,
}

/// Per-symbol coercion state: the local sequence counter and counters
pub struct Ingestor {
    symbol: String,
    sequence: u64,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            sequence: 0,
            stats: IngestStats::default(),
        }
    }

    /// Coerce a trade. `book` is the latest snapshot, used to infer an untagged side.
    pub fn coerce_trade(
        &mut self,
        raw: &RawTrade,
        book: Option<&BookSnapshot>,
        received_ms: i64,
    ) -> Result<Tick, IngestError> {
        let price = match raw.price.as_ref() {
            None | Some(Value::Null) => {
                self.stats.trades_skipped += 1;
                return Err(IngestError::MissingPrice);
            }
            Some(v) => match coerce_f64(v) {
                Some(p) => p,
                None => {
                    self.stats.trades_skipped += 1;
                    warn!(symbol = %self.symbol, price = %v, "Skipping trade with unusable price");
                    return Err(IngestError::InvalidPrice(v.to_string()));
                }
            },
        };

        let timestamp = coerce_timestamp(raw.ts.as_ref(), raw.time.as_ref()).unwrap_or(received_ms);
        let size = coerce_size(raw.size.as_ref());

        let sequence = match raw.serial.as_ref().and_then(coerce_f64).filter(|s| *s >= 0.0) {
            Some(serial) => serial as u64,
            None => {
                self.sequence += 1;
                self.sequence
            }
        };

        let tagged = raw
            .side
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Side>().ok())
            .filter(Side::is_tagged);

        let side = match tagged {
            Some(side) => side,
            None => {
                self.stats.sides_inferred += 1;
                infer_side(book, price)
            }
        };

        let mut tick = Tick::new(&self.symbol, timestamp, price, size, sequence).with_side(side);
        tick.bid = raw.bid.as_ref().and_then(coerce_f64);
        tick.ask = raw.ask.as_ref().and_then(coerce_f64);

        self.stats.trades_accepted += 1;
        Ok(tick)
    }

    /// Books are always accepted; levels without a usable price are dropped
    pub fn coerce_book(&mut self, raw: &RawBook, received_ms: i64) -> BookSnapshot {
        let timestamp = coerce_timestamp(raw.ts.as_ref(), raw.time.as_ref()).unwrap_or(received_ms);
        let (bids, dropped_bids) = coerce_levels(raw.bids.as_ref());
        let (asks, dropped_asks) = coerce_levels(raw.asks.as_ref());

        let dropped = (dropped_bids + dropped_asks) as u64;
        if dropped > 0 {
            self.stats.levels_dropped += dropped;
            debug!(symbol = %self.symbol, dropped, "Dropped book levels without price");
        }

        self.stats.books_accepted += 1;
        BookSnapshot {
            symbol: self.symbol.clone(),
            timestamp,
            bids,
            asks,
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}
