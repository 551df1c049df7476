// Report Module - Daily risk/trend classification

pub mod daily_classifier;

pub use daily_classifier::{
    DailyClassifier, DailyReport, ReportStatus, RiskLevel, StructureChange, TrendState,
    INSUFFICIENT_DATA_REASON,
};
