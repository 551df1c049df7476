// Tick Source - Capability a quote feed needs from the pipeline, plus source selection
// Sources call back with raw trades and books; they never touch state directly

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::config::SourceKind;
use crate::layer2::ingest::{RawBook, RawTrade};
use crate::layer2::pipeline::SymbolPipeline;

/// Receiver of raw source callbacks. Implementations must not panic on
/// malformed input.
pub trait TickSink: Send + Sync {
    fn on_trade(&self, raw: RawTrade);
    fn on_book(&self, raw: RawBook);
}

impl TickSink for SymbolPipeline {
    fn on_trade(&self, raw: RawTrade) {
        if let Err(e) = SymbolPipeline::on_trade(self, &raw) {
            debug!(symbol = %self.symbol(), error = %e, "Source trade skipped");
        }
    }

    fn on_book(&self, raw: RawBook) {
        SymbolPipeline::on_book(self, &raw);
    }
}

impl<T: TickSink + ?Sized> TickSink for Arc<T> {
    fn on_trade(&self, raw: RawTrade) {
        (**self).on_trade(raw)
    }

    fn on_book(&self, raw: RawBook) {
        (**self).on_book(raw)
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Missing credentials for {0}")]
    MissingCredentials(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Check that a requested source can be started in this build
pub fn check_source(kind: &SourceKind) -> Result<(), SourceError> {
    match kind {
        SourceKind::Mock => Ok(()),
        SourceKind::Fugle => {
            if std::env::var("FUGLE_API_KEY").map_or(true, |k| k.trim().is_empty()) {
                return Err(SourceError::MissingCredentials("fugle (FUGLE_API_KEY)".to_string()));
            }
            Err(SourceError::Unavailable("fugle adapter is not bundled".to_string()))
        }
    }
}

/// The source that will actually run; anything that cannot start falls back to mock
pub fn resolve_source(requested: &SourceKind) -> SourceKind {
    match check_source(requested) {
        Ok(()) => requested.clone(),
        Err(e) => {
            warn!(requested = %requested, error = %e, "Start source failed, falling back to mock");
            SourceKind::Mock
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        trades: Mutex<Vec<RawTrade>>,
        books: Mutex<Vec<RawBook>>,
    }

    impl TickSink for RecordingSink {
        fn on_trade(&self, raw: RawTrade) {
            self.trades.lock().push(raw);
        }

        fn on_book(&self, raw: RawBook) {
            self.books.lock().push(raw);
        }
    }

    #[test]
    fn test_mock_always_available() {
        assert!(check_source(&SourceKind::Mock).is_ok());
        assert_eq!(resolve_source(&SourceKind::Mock), SourceKind::Mock);
    }

    #[test]
    fn test_fugle_falls_back_to_mock() {
        assert!(check_source(&SourceKind::Fugle).is_err());
        assert_eq!(resolve_source(&SourceKind::Fugle), SourceKind::Mock);
    }

    #[test]
    fn test_arc_sink_forwards() {
        let sink = Arc::new(RecordingSink::default());
        let shared: Arc<RecordingSink> = Arc::clone(&sink);
        shared.on_trade(RawTrade::new(1, 100.0, 1));
        shared.on_book(RawBook::default());
        assert_eq!(sink.trades.lock().len(), 1);
        assert_eq!(sink.books.lock().len(), 1);
    }
}
