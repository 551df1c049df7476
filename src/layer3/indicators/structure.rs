// Structure - Breakout/breakdown against an older reference block, plus volume spikes

use crate::core::types::Bar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureEvent {
    /// Latest close above the reference block's high
    BreakPrevHigh,
    /// Latest close below the reference block's low
    SupportBreak,
}

/// Compare the latest close with the block `bars[n - lookback .. n - lookback + block]`.
/// Both checks are independent; nothing fires below `min_bars`.
pub fn structure_events(bars: &[Bar], min_bars: usize, lookback: usize, block: usize) -> Vec<StructureEvent> {
    let n = bars.len();
    if n < min_bars || n < lookback || block == 0 || block > lookback {
        return Vec::new();
    }

    let reference = &bars[n - lookback..n - lookback + block];
    let block_high = reference.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let block_low = reference.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    let mut events = Vec::new();
    if let Some(latest) = bars.last() {
        if latest.close > block_high {
            events.push(StructureEvent::BreakPrevHigh);
        }
        if latest.close < block_low {
            events.push(StructureEvent::SupportBreak);
        }
    }
    events
}

/// Latest volume at least `multiplier` times the mean of the `lookback` bars before it
pub fn volume_spike(bars: &[Bar], min_bars: usize, lookback: usize, multiplier: f64) -> bool {
    let n = bars.len();
    if n < min_bars || lookback == 0 || n < lookback + 1 {
        return false;
    }

    let prior = &bars[n - 1 - lookback..n - 1];
    let mean = prior.iter().map(|b| b.volume as f64).sum::<f64>() / lookback as f64;
    bars[n - 1].volume as f64 >= multiplier * mean
}
