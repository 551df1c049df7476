// Event System for Tape Sentinel
// Push channel: callback subscribers plus a tokio broadcast channel

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::core::types::{Bar, BookSnapshot, Signal, SignalLevel, Tick};
use crate::layer2::snapshot::Snapshot1s;
use crate::layer3::indicators::IndicatorState;
use crate::layer3::report::DailyReport;

// ============================================================================
// Event Kinds
// ============================================================================

pub const EVENT_TICK: &str = "tick";
pub const EVENT_BOOK: &str = "book";
pub const EVENT_SIGNAL: &str = "signal";
pub const EVENT_SNAPSHOT_1S: &str = "snapshot_1s";
pub const EVENT_BAR_UPDATE: &str = "bar_update";
pub const EVENT_BAR_CLOSED: &str = "bar_closed";
pub const EVENT_INDICATORS: &str = "indicators";

/// Subscribe to every event kind
pub const WILDCARD: &str = "*";

// ============================================================================
// Event Priority
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EventPriority {
    High = 1,   // HIGH-level signals
    Medium = 2, // MED-level signals
    Low = 3,    // Bar closes, indicator refresh
    Info = 4,   // Ticks, books, snapshots
}

impl From<SignalLevel> for EventPriority {
    fn from(level: SignalLevel) -> Self {
        match level {
            SignalLevel::High => EventPriority::High,
            SignalLevel::Med => EventPriority::Medium,
        }
    }
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Event
// ============================================================================

/// Serialisable push record; `type` carries the event kind on the wire
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Tick(Tick),
    Book(BookSnapshot),
    Signal(Signal),
    BarUpdate { symbol: String, bar: Bar },
    BarClosed { symbol: String, bar: Bar },
    Indicators { symbol: String, indicators: IndicatorState, report: DailyReport },
    #[serde(rename = "snapshot_1s")]
    Snapshot1s(Snapshot1s),
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Tick(_) => EVENT_TICK,
            EventPayload::Book(_) => EVENT_BOOK,
            EventPayload::Signal(_) => EVENT_SIGNAL,
            EventPayload::BarUpdate { .. } => EVENT_BAR_UPDATE,
            EventPayload::BarClosed { .. } => EVENT_BAR_CLOSED,
            EventPayload::Indicators { .. } => EVENT_INDICATORS,
            EventPayload::Snapshot1s(_) => EVENT_SNAPSHOT_1S,
        }
    }

    pub fn default_priority(&self) -> EventPriority {
        match self {
            EventPayload::Signal(sig) => sig.level.into(),
            EventPayload::BarClosed { .. } | EventPayload::Indicators { .. } => EventPriority::Low,
            _ => EventPriority::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_id: String,
    pub priority: EventPriority,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            priority: payload.default_priority(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// JSON text for transports that forward events verbatim
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event(type={}, priority={:?}, id={})",
            self.kind(),
            self.priority,
            &self.event_id[..8]
        )
    }
}

// ============================================================================
// Event Bus
// ============================================================================

type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;

pub struct EventBus {
    tx: broadcast::Sender<Event>,
    subscribers: RwLock<HashMap<String, Vec<EventCallback>>>,
    wildcard_subscribers: RwLock<Vec<EventCallback>>,
    event_history: RwLock<VecDeque<Event>>,
    max_history: usize,
    stats: RwLock<EventBusStats>,
}

#[derive(Debug, Clone, Default)]
struct EventBusStats {
    total_published: u64,
    total_delivered: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1000, 4096)
    }

    pub fn with_capacity(max_history: usize, broadcast_buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(broadcast_buffer.max(1));

        Self {
            tx,
            subscribers: RwLock::new(HashMap::new()),
            wildcard_subscribers: RwLock::new(Vec::new()),
            event_history: RwLock::new(VecDeque::with_capacity(max_history.min(10_000))),
            max_history: max_history.max(1),
            stats: RwLock::new(EventBusStats::default()),
        }
    }

    /// Subscribe to events by kind, or "*" for all events.
    /// Callbacks run synchronously on the publishing thread.
    pub fn subscribe<F>(&self, event_kind: &str, callback: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);

        if event_kind == WILDCARD {
            self.wildcard_subscribers.write().push(callback);
        } else {
            self.subscribers
                .write()
                .entry(event_kind.to_string())
                .or_default()
                .push(callback);
        }

        tracing::debug!(event_kind = %event_kind, "Subscribed to events");
    }

    /// Get a receiver for all events (broadcast channel)
    pub fn subscribe_channel(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish_payload(&self, payload: EventPayload) {
        self.publish(Event::new(payload));
    }

    /// Publish event to history, channel receivers and callback subscribers
    pub fn publish(&self, event: Event) {
        self.stats.write().total_published += 1;

        {
            let mut history = self.event_history.write();
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        // No receivers is not an error for a push feed
        let _ = self.tx.send(event.clone());

        // Clone the callback lists so a callback may subscribe without deadlocking
        let direct: Vec<EventCallback> = self
            .subscribers
            .read()
            .get(event.kind())
            .cloned()
            .unwrap_or_default();
        let wildcard: Vec<EventCallback> = self.wildcard_subscribers.read().clone();

        let delivered = (direct.len() + wildcard.len()) as u64;
        for callback in direct.iter().chain(wildcard.iter()) {
            callback(event.clone());
        }

        self.stats.write().total_delivered += delivered;
    }

    /// Most recent events first, optionally filtered by kind
    pub fn get_recent_events(&self, event_kind: Option<&str>, limit: Option<usize>) -> Vec<Event> {
        let history = self.event_history.read();
        let limit = limit.unwrap_or(100);

        history
            .iter()
            .rev()
            .filter(|e| event_kind.map_or(true, |k| e.kind() == k))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_stats(&self) -> EventBusStatsSnapshot {
        let stats = self.stats.read();
        let subscribers = self.subscribers.read();
        let wildcard = self.wildcard_subscribers.read();

        EventBusStatsSnapshot {
            total_published: stats.total_published,
            total_delivered: stats.total_delivered,
            subscriber_count: subscribers.values().map(Vec::len).sum::<usize>() + wildcard.len(),
            channel_receivers: self.tx.receiver_count(),
            event_kinds: subscribers.keys().cloned().collect(),
            history_size: self.event_history.read().len(),
        }
    }

    pub fn clear_history(&self) {
        self.event_history.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of event bus statistics
#[derive(Debug, Clone)]
pub struct EventBusStatsSnapshot {
    pub total_published: u64,
    pub total_delivered: u64,
    pub subscriber_count: usize,
    pub channel_receivers: usize,
    pub event_kinds: Vec<String>,
    pub history_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SignalKind, SignalReason, SignalSide};

    fn tick_event(ts: i64) -> EventPayload {
        EventPayload::Tick(Tick::new("2317", ts, 100.0, 10, ts as u64))
    }

    fn signal(level: SignalLevel) -> Signal {
        Signal {
            timestamp: 0,
            kind: SignalKind::BigTrade,
            level,
            symbol: "2317".to_string(),
            side: SignalSide::Buy,
            price: 100.0,
            size: 5000,
            notional: 500_000.0,
            reason: SignalReason::BigTrade {
                min_size: 800,
                min_notional: 3_000_000.0,
                median_multiplier: 6.0,
                median_size: Some(10.0),
                triggers: vec![],
            },
        }
    }

    #[test]
    fn test_event_priority() {
        assert!(EventPriority::High < EventPriority::Medium);
        assert_eq!(EventPriority::from(SignalLevel::High), EventPriority::High);
        assert_eq!(Event::new(EventPayload::Signal(signal(SignalLevel::Med))).priority, EventPriority::Medium);
        assert_eq!(Event::new(tick_event(1)).priority, EventPriority::Info);
    }

    #[test]
    fn test_event_wire_type_tag() {
        let event = Event::new(tick_event(42));
        let v: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "tick");
        assert_eq!(v["timestamp"], 42);
        assert!(!v["event_id"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_event_bus_subscribe_and_publish() {
        let bus = EventBus::new();
        let received = Arc::new(RwLock::new(Vec::new()));
        let received_clone = Arc::clone(&received);

        bus.subscribe(EVENT_SIGNAL, move |event| {
            received_clone.write().push(event.kind());
        });

        bus.publish_payload(tick_event(1));
        bus.publish_payload(EventPayload::Signal(signal(SignalLevel::High)));

        assert_eq!(*received.read(), vec![EVENT_SIGNAL]);
    }

    #[test]
    fn test_wildcard_subscriber_sees_everything() {
        let bus = EventBus::new();
        let count = Arc::new(RwLock::new(0u32));
        let count_clone = Arc::clone(&count);
        bus.subscribe(WILDCARD, move |_| *count_clone.write() += 1);

        bus.publish_payload(tick_event(1));
        bus.publish_payload(EventPayload::Signal(signal(SignalLevel::Med)));

        assert_eq!(*count.read(), 2);
        assert_eq!(bus.get_stats().total_delivered, 2);
    }

    #[test]
    fn test_history_is_capped() {
        let bus = EventBus::with_capacity(3, 16);
        for ts in 0..5 {
            bus.publish_payload(tick_event(ts));
        }
        let recent = bus.get_recent_events(None, None);
        assert_eq!(recent.len(), 3);
        match &recent[0].payload {
            EventPayload::Tick(t) => assert_eq!(t.timestamp, 4),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(bus.get_stats().total_published, 5);
    }

    #[test]
    fn test_channel_receiver_gets_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_channel();
        bus.publish_payload(tick_event(7));
        let event = rx.try_recv().expect("event should be buffered");
        assert_eq!(event.kind(), EVENT_TICK);
    }
}
