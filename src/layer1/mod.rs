// Layer 1 - Tick Sources
// Quote feeds deliver raw trades and books through the TickSink capability

pub mod source;
pub mod mock_source;

// Re-export commonly used items for convenience
pub use source::{check_source, resolve_source, SourceError, TickSink};
pub use mock_source::{MockEmission, MockSource, MockSourceConfig, MockSourceStats};
