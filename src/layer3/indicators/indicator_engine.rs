// Indicator Engine - Recomputes the full indicator set from closed-bar history
// Called once per closed bar; holds no state between calls besides counters

use crate::core::config::IndicatorParams;
use crate::core::types::Bar;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use super::math::{self, StopTrend};
use super::structure::{self, StructureEvent};

// ============================================================================
// Zones
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BandPosition {
    Above,
    Mid,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RsiZone {
    High,
    Mid,
    Low,
}

/// Latest close relative to a trend line (MA or parabolic stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendRelation {
    Above,
    Below,
}

impl TrendRelation {
    fn of(close: f64, line: f64) -> Self {
        if close >= line {
            TrendRelation::Above
        } else {
            TrendRelation::Below
        }
    }
}

// ============================================================================
// Indicator State
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorState {
    pub bar_count: usize,
    pub last_close: Option<f64>,

    pub ma: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub stop: Option<f64>,
    pub stop_trend: Option<StopTrend>,

    pub band_position: Option<BandPosition>,
    pub rsi_zone: Option<RsiZone>,
    pub stop_relation: Option<TrendRelation>,
    pub ma_relation: Option<TrendRelation>,

    pub structure_events: Vec<StructureEvent>,
    pub volume_spike: bool,
}

impl IndicatorState {
    pub fn has_event(&self, event: StructureEvent) -> bool {
        self.structure_events.contains(&event)
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{:.2}", x));
        write!(
            f,
            "Indicators(bars={}, ma={}, rsi={}, atr={}, stop={}, events={:?}, spike={})",
            self.bar_count,
            show(self.ma),
            show(self.rsi),
            show(self.atr),
            show(self.stop),
            self.structure_events,
            self.volume_spike
        )
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct IndicatorEngine {
    params: IndicatorParams,

    // Statistics
    computations: u64,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params, computations: 0 }
    }

    pub fn compute(&mut self, bars: &[Bar]) -> IndicatorState {
        self.computations += 1;
        let p = &self.params;
        let last_close = bars.last().map(|b| b.close);

        let ma = math::sma(bars, p.ma_period);
        let bands = math::bands(bars, p.ma_period, p.band_std_dev);
        let rsi = math::rsi(bars, p.rsi_period);
        let atr = math::atr(bars, p.atr_period);
        let stop = math::parabolic_stop(bars, p.psar_step, p.psar_max, p.psar_seed_bars);

        let band_position = match (bands, last_close) {
            (Some(b), Some(close)) if close > b.upper => Some(BandPosition::Above),
            (Some(b), Some(close)) if close < b.lower => Some(BandPosition::Below),
            (Some(_), Some(_)) => Some(BandPosition::Mid),
            _ => None,
        };

        let rsi_zone = rsi.map(|r| {
            if r >= p.rsi_high {
                RsiZone::High
            } else if r <= p.rsi_low {
                RsiZone::Low
            } else {
                RsiZone::Mid
            }
        });

        let stop_relation = stop.zip(last_close).map(|(s, c)| TrendRelation::of(c, s.value));
        let ma_relation = ma.zip(last_close).map(|(m, c)| TrendRelation::of(c, m));

        let state = IndicatorState {
            bar_count: bars.len(),
            last_close,
            ma,
            upper_band: bands.map(|b| b.upper),
            lower_band: bands.map(|b| b.lower),
            rsi,
            atr,
            stop: stop.map(|s| s.value),
            stop_trend: stop.map(|s| s.trend),
            band_position,
            rsi_zone,
            stop_relation,
            ma_relation,
            structure_events: structure::structure_events(
                bars,
                p.structure_min_bars,
                p.structure_lookback,
                p.structure_block,
            ),
            volume_spike: structure::volume_spike(
                bars,
                p.volume_spike_min_bars,
                p.volume_spike_lookback,
                p.volume_spike_multiplier,
            ),
        };

        trace!(state = %state, "Indicators recomputed");
        state
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn computations(&self) -> u64 {
        self.computations
    }
}
