// Anomaly Module - Big trades and book walls against rolling baselines

pub mod anomaly_detector;
pub mod big_trade;
pub mod book_wall;

pub use anomaly_detector::{AnomalyDetector, AnomalyDetectorStats};
pub use big_trade::BigTradeTracker;
pub use book_wall::{BookWallTracker, WallSide};
