// Indicators Module - MA, bands, RSI, ATR, parabolic stop and structure over closed bars

pub mod indicator_engine;
pub mod math;
pub mod structure;

pub use indicator_engine::{BandPosition, IndicatorEngine, IndicatorState, RsiZone, TrendRelation};
pub use math::{Bands, ParabolicStop, StopTrend};
pub use structure::StructureEvent;
