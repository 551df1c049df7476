// Indicator Math - Pure functions over closed bars (oldest first)
// Every function returns None when the history is too short

use crate::core::types::Bar;
use serde::{Deserialize, Serialize};

/// Direction of the parabolic stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StopTrend {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParabolicStop {
    pub value: f64,
    pub trend: StopTrend,
}

fn last_closes(bars: &[Bar], period: usize) -> Option<Vec<f64>> {
    if period == 0 || bars.len() < period {
        return None;
    }
    Some(bars[bars.len() - period..].iter().map(|b| b.close).collect())
}

/// Simple moving average of the last `period` closes
pub fn sma(bars: &[Bar], period: usize) -> Option<f64> {
    let closes = last_closes(bars, period)?;
    Some(closes.iter().sum::<f64>() / period as f64)
}

/// SMA +/- k population standard deviations of the same closes
pub fn bands(bars: &[Bar], period: usize, k: f64) -> Option<Bands> {
    let closes = last_closes(bars, period)?;
    let n = period as f64;
    let middle = closes.iter().sum::<f64>() / n;
    let variance = closes.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / n;
    let sd = variance.sqrt();

    Some(Bands {
        middle,
        upper: middle + k * sd,
        lower: middle - k * sd,
    })
}

/// RSI from simple averages of the last `period` close-to-close deltas.
/// A window with no losses reads 100.
pub fn rsi(bars: &[Bar], period: usize) -> Option<f64> {
    let closes = last_closes(bars, period + 1)?;

    let (gains, losses) = closes.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            (g + delta, l)
        } else {
            (g, l - delta)
        }
    });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Mean true range over the last `period` bars; each needs its predecessor's close
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let tail = &bars[bars.len() - period - 1..];
    let total: f64 = tail.windows(2).map(|w| w[1].true_range(w[0].close)).sum();
    Some(total / period as f64)
}

/// Parabolic stop-and-reverse, single pass.
///
/// Seeded from the first `seed` bars: uptrend when the last seed close is at or
/// above the one before it, stop at the seed extreme low (high for a downtrend),
/// extreme point at the opposite extreme. Each later bar advances the stop by
/// `af * (ep - stop)`, clamps it behind the prior two bars, and flips the trend
/// when price crosses it.
pub fn parabolic_stop(bars: &[Bar], step: f64, max_af: f64, seed: usize) -> Option<ParabolicStop> {
    let seed = seed.max(2);
    if bars.len() < seed {
        return None;
    }

    let seed_bars = &bars[..seed];
    let seed_high = seed_bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let seed_low = seed_bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    let mut trend = if seed_bars[seed - 1].close >= seed_bars[seed - 2].close {
        StopTrend::Up
    } else {
        StopTrend::Down
    };
    let (mut sar, mut ep) = match trend {
        StopTrend::Up => (seed_low, seed_high),
        StopTrend::Down => (seed_high, seed_low),
    };
    let mut af = step;

    for i in seed..bars.len() {
        let bar = &bars[i];
        let prev1 = &bars[i - 1];
        let prev2 = &bars[i - 2];
        let mut next = sar + af * (ep - sar);

        match trend {
            StopTrend::Up => {
                next = next.min(prev1.low).min(prev2.low);
                if bar.low < next {
                    trend = StopTrend::Down;
                    next = ep;
                    ep = bar.low;
                    af = step;
                } else if bar.high > ep {
                    ep = bar.high;
                    af = (af + step).min(max_af);
                }
            }
            StopTrend::Down => {
                next = next.max(prev1.high).max(prev2.high);
                if bar.high > next {
                    trend = StopTrend::Up;
                    next = ep;
                    ep = bar.high;
                    af = step;
                } else if bar.low < ep {
                    ep = bar.low;
                    af = (af + step).min(max_af);
                }
            }
        }

        sar = next;
    }

    Some(ParabolicStop { value: sar, trend })
}
