// Tape Sentinel binary - runs one symbol pipeline against the configured source
//
// ENV: CONFIG_PATH, SYMBOL, NAME, QUOTE_SOURCE, LOG_LEVEL, BAR_WIDTH_MS

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{error, info, warn};

use tape_sentinel::core::events::{EVENT_BAR_CLOSED, EVENT_SIGNAL};
use tape_sentinel::core::{setup_logging, ConfigManager, EventPayload};
use tape_sentinel::layer1::{resolve_source, MockSource, MockSourceConfig};
use tape_sentinel::layer2::{spawn_snapshot_ticker, MarketHub};

#[tokio::main]
async fn main() {
    let config_path = std::env::var("CONFIG_PATH").ok();
    let manager = match ConfigManager::new(config_path.as_deref()) {
        Ok(manager) => manager,
        Err(e) => {
            // Logging is not up yet
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let logging = manager.logging();
    setup_logging(Some(&logging.log_level), Some(logging.json_format));
    info!(summary = ?manager.get_summary(), "Starting tape-sentinel");

    let config = manager.config();
    let hub = Arc::new(MarketHub::from_config(config));
    let pipeline = match hub.register(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "Failed to register symbol");
            std::process::exit(1);
        }
    };

    hub.event_bus().subscribe(EVENT_SIGNAL, |event| {
        if let EventPayload::Signal(signal) = &event.payload {
            info!(priority = %event.priority, signal = %signal, notional = signal.notional, "Signal");
        }
    });
    hub.event_bus().subscribe(EVENT_BAR_CLOSED, |event| {
        if let EventPayload::BarClosed { symbol, bar } = &event.payload {
            info!(symbol = %symbol, bar = %bar, "Bar closed");
        }
    });

    let monitor = manager.monitor();
    let source = resolve_source(&monitor.source);
    pipeline.set_source(&source.to_string());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let snapshot_handle = spawn_snapshot_ticker(
        Arc::clone(&hub),
        monitor.snapshot_interval_ms,
        shutdown_rx.clone(),
    );

    let source_handle = tokio::spawn(
        MockSource::new(MockSourceConfig::default()).run(Arc::clone(&pipeline), shutdown_rx.clone()),
    );

    let stats_pipeline = Arc::clone(&pipeline);
    let stats_interval = logging.stats_interval_seconds.max(1);
    let mut stats_shutdown = shutdown_rx.clone();
    let stats_handle = tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(Duration::from_secs(stats_interval));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    stats_pipeline.get_stats().print_compact(started.elapsed().as_secs());
                }
                _ = stats_shutdown.changed() => break,
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c, shutting down");
    }
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    match source_handle.await {
        Ok(stats) => info!(stats = %stats, "Source stopped"),
        Err(e) => warn!(error = %e, "Source task failed"),
    }
    let _ = snapshot_handle.await;
    let _ = stats_handle.await;

    let final_stats = pipeline.get_stats();
    final_stats.print_report();
    info!(stats = %final_stats, bus = ?hub.event_bus().get_stats(), "Stopped");
}
