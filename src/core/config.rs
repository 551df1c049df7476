// Configuration Management for Tape Sentinel
// JSON file + environment overrides, validated once and immutable afterwards

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub const FIVE_MINUTES_MS: i64 = 5 * 60 * 1000;

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Mock,
    Fugle,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(SourceKind::Mock),
            "fugle" => Ok(SourceKind::Fugle),
            other => Err(format!("Unknown quote source '{}'", other)),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Mock => write!(f, "mock"),
            SourceKind::Fugle => write!(f, "fugle"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub symbol: String,
    pub name: String,
    pub source: SourceKind,

    // Bars
    pub bar_width_ms: i64,
    pub closed_bar_capacity: usize,

    // Signals
    pub signal_capacity: usize,
    pub recent_signal_limit: usize,

    // Push
    pub snapshot_interval_ms: u64,
    pub event_history_capacity: usize,
    pub broadcast_buffer: usize,

    /// Offset used to decide which closed bars belong to "today"
    pub session_utc_offset_minutes: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbol: "2317".to_string(),
            name: "Hon Hai".to_string(),
            source: SourceKind::Mock,
            bar_width_ms: FIVE_MINUTES_MS,
            closed_bar_capacity: 200,
            signal_capacity: 200,
            recent_signal_limit: 50,
            snapshot_interval_ms: 1000,
            event_history_capacity: 1000,
            broadcast_buffer: 4096,
            session_utc_offset_minutes: 8 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    // Rolling baselines
    pub trade_size_window: usize,
    pub book_size_window: usize,

    // Big trade
    pub big_trade_min_size: u64,
    pub big_trade_min_notional: f64,
    pub big_trade_median_multiplier: f64,
    pub big_trade_high_notional: f64,
    pub big_trade_high_size: u64,

    // Book wall
    pub wall_min_size: u64,
    pub wall_median_multiplier: f64,
    pub wall_high_size: u64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            trade_size_window: 300,
            book_size_window: 300,
            big_trade_min_size: 800,
            big_trade_min_notional: 3_000_000.0,
            big_trade_median_multiplier: 6.0,
            big_trade_high_notional: 8_000_000.0,
            big_trade_high_size: 3000,
            wall_min_size: 3000,
            wall_median_multiplier: 8.0,
            wall_high_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ma_period: usize,
    pub band_std_dev: f64,
    pub rsi_period: usize,
    pub rsi_high: f64,
    pub rsi_low: f64,
    pub atr_period: usize,
    pub psar_step: f64,
    pub psar_max: f64,
    pub psar_seed_bars: usize,

    // Structure
    pub structure_min_bars: usize,
    pub structure_lookback: usize,
    pub structure_block: usize,

    // Volume spike
    pub volume_spike_min_bars: usize,
    pub volume_spike_lookback: usize,
    pub volume_spike_multiplier: f64,

    // Daily classifier
    pub classifier_min_bars: usize,
    pub risk_range_atr_ratio: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ma_period: 20,
            band_std_dev: 2.0,
            rsi_period: 14,
            rsi_high: 70.0,
            rsi_low: 30.0,
            atr_period: 14,
            psar_step: 0.02,
            psar_max: 0.2,
            psar_seed_bars: 5,
            structure_min_bars: 50,
            structure_lookback: 40,
            structure_block: 20,
            volume_spike_min_bars: 30,
            volume_spike_lookback: 10,
            volume_spike_multiplier: 1.8,
            classifier_min_bars: 30,
            risk_range_atr_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub json_format: bool,
    pub stats_interval_seconds: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            json_format: false,
            stats_interval_seconds: 30,
        }
    }
}

/// Everything the pipeline needs at construction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub thresholds: DetectorThresholds,
    pub indicators: IndicatorParams,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let m = &self.monitor;
        let t = &self.thresholds;
        let p = &self.indicators;

        if m.symbol.trim().is_empty() {
            errors.push("symbol must not be empty".to_string());
        }
        if m.bar_width_ms <= 0 {
            errors.push(format!("bar_width_ms must be positive, got {}", m.bar_width_ms));
        }
        if m.closed_bar_capacity == 0 || m.signal_capacity == 0 || m.event_history_capacity == 0 {
            errors.push("history capacities must be at least 1".to_string());
        }
        if m.broadcast_buffer == 0 {
            errors.push("broadcast_buffer must be at least 1".to_string());
        }
        if m.snapshot_interval_ms == 0 {
            errors.push("snapshot_interval_ms must be positive".to_string());
        }
        if t.trade_size_window == 0 || t.book_size_window == 0 {
            errors.push("rolling window capacities must be at least 1".to_string());
        }
        if !(t.big_trade_median_multiplier > 0.0) || !(t.wall_median_multiplier > 0.0) {
            errors.push("median multipliers must be positive".to_string());
        }
        if !(t.big_trade_min_notional >= 0.0) || !(t.big_trade_high_notional >= 0.0) {
            errors.push("notional floors must be non-negative".to_string());
        }
        if p.ma_period == 0 || p.rsi_period == 0 || p.atr_period == 0 {
            errors.push("indicator periods must be at least 1".to_string());
        }
        if p.psar_seed_bars < 2 {
            errors.push("psar_seed_bars must be at least 2".to_string());
        }
        if !(p.psar_step > 0.0) || p.psar_max < p.psar_step {
            errors.push("psar_step must be positive and not exceed psar_max".to_string());
        }
        if p.structure_block == 0 || p.structure_lookback < p.structure_block {
            errors.push("structure_lookback must be at least structure_block (> 0)".to_string());
        }
        if p.structure_min_bars < p.structure_lookback {
            errors.push("structure_min_bars must cover structure_lookback".to_string());
        }
        if p.volume_spike_lookback == 0 || p.volume_spike_min_bars <= p.volume_spike_lookback {
            errors.push("volume_spike_min_bars must exceed volume_spike_lookback (> 0)".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            for error in &errors {
                warn!(error = %error, "Config validation error");
            }
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

// ============================================================================
// Configuration Summary
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub symbol: String,
    pub name: String,
    pub source: String,
    pub bar_width_ms: i64,
    pub log_level: String,
}

// ============================================================================
// Configuration Manager
// ============================================================================

pub struct ConfigManager {
    config: AppConfig,
}

impl ConfigManager {
    /// Defaults, then the optional JSON file, then environment overrides, then validation
    pub fn new(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => AppConfig::default(),
        };

        Self::apply_env(&mut config);
        config.validate()?;

        info!(symbol = %config.monitor.symbol, source = %config.monitor.source, "Configuration initialized");
        Ok(Self { config })
    }

    /// Load configuration from a JSON file; a missing file yields defaults
    pub fn load_from_file(config_path: &str) -> Result<AppConfig, ConfigError> {
        let path = Path::new(config_path);
        if !path.exists() {
            warn!(path = config_path, "Config file not found, using defaults");
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;

        info!(path = config_path, "Configuration loaded");
        Ok(config)
    }

    fn apply_env(config: &mut AppConfig) {
        if let Ok(symbol) = std::env::var("SYMBOL") {
            config.monitor.symbol = symbol;
        }
        if let Ok(name) = std::env::var("NAME") {
            config.monitor.name = name;
        }
        if let Ok(source) = std::env::var("QUOTE_SOURCE") {
            match source.parse::<SourceKind>() {
                Ok(kind) => config.monitor.source = kind,
                Err(e) => warn!(error = %e, "Ignoring QUOTE_SOURCE, falling back to mock"),
            }
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.log_level = level;
        }
        if let Ok(width) = std::env::var("BAR_WIDTH_MS") {
            match width.parse::<i64>() {
                Ok(w) => config.monitor.bar_width_ms = w,
                Err(_) => warn!(value = %width, "Ignoring non-numeric BAR_WIDTH_MS"),
            }
        }
    }

    pub fn get_summary(&self) -> ConfigSummary {
        ConfigSummary {
            symbol: self.config.monitor.symbol.clone(),
            name: self.config.monitor.name.clone(),
            source: self.config.monitor.source.to_string(),
            bar_width_ms: self.config.monitor.bar_width_ms,
            log_level: self.config.logging.log_level.clone(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn monitor(&self) -> &MonitorConfig {
        &self.config.monitor
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.config.logging
    }
}
