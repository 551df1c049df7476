// Bars - Tick-to-OHLCV aggregation

pub mod bar_aggregator;

pub use bar_aggregator::{BarAggregator, BarSeries, BarTransition};
