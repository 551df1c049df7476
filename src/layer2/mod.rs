// Layer 2 - Ingestion & State
// Coerces raw source payloads, drives the per-symbol pipeline and owns the state store

pub mod ingest;
pub mod state_store;
pub mod pipeline;
pub mod snapshot;
pub mod metrics;

// Re-export commonly used items
pub use ingest::{now_ms, IngestError, IngestStats, Ingestor, RawBook, RawTrade};
pub use state_store::{StateSnapshot, StateStore, StateStoreStats};
pub use pipeline::{HubError, MarketHub, SymbolPipeline};
pub use snapshot::{publish_snapshots, spawn_snapshot_ticker, Snapshot1s};
pub use metrics::PipelineStats;
