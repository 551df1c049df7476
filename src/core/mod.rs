// Core Module - Foundational types, config, logging, events

pub mod types;
pub mod config;
pub mod logger;
pub mod events;

// Re-export commonly used items for convenience
pub use types::*;
pub use config::{
    AppConfig, MonitorConfig, DetectorThresholds, IndicatorParams, LoggingConfig,
    SourceKind, ConfigManager, ConfigSummary, ConfigError, FIVE_MINUTES_MS,
};
pub use logger::{setup_logging, symbol_span};
pub use events::{Event, EventPayload, EventPriority, EventBus, EventBusStatsSnapshot};
