// Tape Sentinel - Real-time tick aggregation and anomaly detection for one security
//
//   Layer 1: tick sources (TickSink, mock random walk)
//   Layer 2: ingest coercion, state store, per-symbol pipeline, snapshot timer
//   Layer 3: bars, rolling baselines, anomaly signals, indicators, daily report

pub mod core;
pub mod layer1;
pub mod layer2;
pub mod layer3;

pub use crate::core::{AppConfig, ConfigManager, Event, EventBus, EventPayload};
pub use crate::layer2::{MarketHub, StateSnapshot, SymbolPipeline};
