// Layer 3 - Analytics
// Bars, rolling baselines, anomaly signals, indicators and the daily report

// Common utilities
pub mod common;

// Tick-to-bar aggregation
pub mod bars;

// Big trades and book walls
pub mod anomaly;

// MA / bands / RSI / ATR / parabolic stop / structure
pub mod indicators;

// Daily classifier
pub mod report;

pub use common::RollingWindow;
pub use bars::{BarAggregator, BarSeries, BarTransition};
pub use anomaly::{AnomalyDetector, AnomalyDetectorStats};
pub use indicators::{IndicatorEngine, IndicatorState};
pub use report::{DailyClassifier, DailyReport};
