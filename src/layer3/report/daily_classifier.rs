// Daily Classifier - Rule-based risk/trend/structure read-out over indicator output
// Below the minimum bar count every field degrades to a fixed placeholder

use crate::core::config::IndicatorParams;
use crate::core::types::Bar;
use crate::layer3::indicators::{BandPosition, IndicatorState, RsiZone, StructureEvent, TrendRelation};
use serde::{Deserialize, Serialize};
use std::fmt;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

pub const INSUFFICIENT_DATA_REASON: &str = "insufficient data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Ready,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendState {
    Bullish,
    Weakening,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StructureChange {
    Strengthen,
    Weaken,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub status: ReportStatus,
    pub bar_count: usize,
    pub risk_level: Option<RiskLevel>,
    pub trend_state: Option<TrendState>,
    pub structure_change: Option<StructureChange>,
    pub structure_reason: String,
    pub conclusion: String,
}

impl DailyReport {
    pub fn insufficient_data(bar_count: usize, min_bars: usize) -> Self {
        Self {
            status: ReportStatus::InsufficientData,
            bar_count,
            risk_level: None,
            trend_state: None,
            structure_change: None,
            structure_reason: INSUFFICIENT_DATA_REASON.to_string(),
            conclusion: format!(
                "Insufficient data: {} of {} closed bars collected, no assessment yet.",
                bar_count, min_bars
            ),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == ReportStatus::Ready
    }
}

impl Default for DailyReport {
    fn default() -> Self {
        Self::insufficient_data(0, IndicatorParams::default().classifier_min_bars)
    }
}

impl fmt::Display for DailyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Report({:?}, risk={:?}, trend={:?}, structure={:?})",
            self.status, self.risk_level, self.trend_state, self.structure_change
        )
    }
}

pub struct DailyClassifier {
    min_bars: usize,
    range_atr_ratio: f64,
    session_offset_ms: i64,
}

impl DailyClassifier {
    pub fn new(params: &IndicatorParams, session_utc_offset_minutes: i64) -> Self {
        Self {
            min_bars: params.classifier_min_bars,
            range_atr_ratio: params.risk_range_atr_ratio,
            session_offset_ms: session_utc_offset_minutes.saturating_mul(60 * 1000),
        }
    }

    pub fn classify(&self, indicators: &IndicatorState, closed_bars: &[Bar]) -> DailyReport {
        if closed_bars.len() < self.min_bars {
            return DailyReport::insufficient_data(closed_bars.len(), self.min_bars);
        }

        let risk = self.risk_level(indicators, closed_bars);
        let trend = Self::trend_state(indicators);
        let (structure, reason) = Self::structure_change(indicators);

        DailyReport {
            status: ReportStatus::Ready,
            bar_count: closed_bars.len(),
            risk_level: Some(risk),
            trend_state: Some(trend),
            structure_change: Some(structure),
            structure_reason: reason,
            conclusion: Self::conclusion(trend, risk).to_string(),
        }
    }

    /// High-low range of closed bars sharing the latest bar's session day
    pub fn today_range(&self, closed_bars: &[Bar]) -> Option<f64> {
        let latest = closed_bars.last()?;
        let day = self.day_key(latest.start_timestamp);

        let (high, low) = closed_bars
            .iter()
            .rev()
            .take_while(|b| self.day_key(b.start_timestamp) == day)
            .fold((f64::NEG_INFINITY, f64::INFINITY), |(h, l), b| (h.max(b.high), l.min(b.low)));

        Some(high - low)
    }

    fn day_key(&self, timestamp: i64) -> i64 {
        timestamp.saturating_add(self.session_offset_ms).div_euclid(MS_PER_DAY)
    }

    fn risk_level(&self, ind: &IndicatorState, closed_bars: &[Bar]) -> RiskLevel {
        let above_band = ind.band_position == Some(BandPosition::Above);
        let wide_range = match (ind.atr, self.today_range(closed_bars)) {
            (Some(atr), Some(range)) => range > self.range_atr_ratio * atr,
            _ => false,
        };
        let rsi_high = ind.rsi_zone == Some(RsiZone::High);

        if above_band || wide_range || rsi_high {
            RiskLevel::High
        } else if ind.band_position == Some(BandPosition::Mid) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn trend_state(ind: &IndicatorState) -> TrendState {
        if ind.has_event(StructureEvent::SupportBreak) {
            TrendState::Weakening
        } else if ind.ma_relation == Some(TrendRelation::Above) && ind.stop_relation == Some(TrendRelation::Above) {
            TrendState::Bullish
        } else {
            TrendState::Range
        }
    }

    fn structure_change(ind: &IndicatorState) -> (StructureChange, String) {
        let volume_note = if ind.volume_spike {
            "with volume spike"
        } else {
            "without volume confirmation"
        };

        if ind.has_event(StructureEvent::BreakPrevHigh) {
            (StructureChange::Strengthen, format!("close broke the prior block high {}", volume_note))
        } else if ind.has_event(StructureEvent::SupportBreak) {
            (StructureChange::Weaken, format!("close broke the prior block low {}", volume_note))
        } else {
            (StructureChange::None, "no structural break".to_string())
        }
    }

    fn conclusion(trend: TrendState, risk: RiskLevel) -> &'static str {
        match (trend, risk) {
            (TrendState::Weakening, _) => {
                "Support broke and the trend is weakening; reduce exposure until structure rebuilds."
            }
            (TrendState::Bullish, RiskLevel::High) => {
                "Uptrend intact but stretched; avoid chasing and keep the trailing stop tight."
            }
            (TrendState::Bullish, _) => "Uptrend intact above the average and the stop; hold with the trailing stop.",
            (TrendState::Range, RiskLevel::High) => {
                "Range-bound with elevated volatility; keep size small and expect sharp swings."
            }
            (TrendState::Range, _) => "Range-bound; wait for a breakout or breakdown before acting.",
        }
    }
}
