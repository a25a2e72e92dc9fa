//! Bus events and the sinks that observe them.
//!
//! The bus reports every state transition a rider would notice (arrival,
//! each boarding, departure) to an [`EventSink`]. Production runs log them
//! through `tracing`; tests substitute a [`RecordingSink`] and assert on the
//! recorded sequence.

use parking_lot::Mutex;
use senate_env::PassengerId;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// An observable state transition of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BusEvent {
    /// The bus pulled in and opened its doors.
    Arrived,

    /// A passenger took a seat; `count` is the occupancy after boarding.
    Boarded { passenger: PassengerId, count: usize },

    /// The bus closed its doors and left with `passengers` aboard.
    Departed { passengers: usize },
}

impl std::fmt::Display for BusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusEvent::Arrived => write!(f, "bus has arrived"),
            BusEvent::Boarded { count, .. } => write!(f, "passenger boarded, count={}", count),
            BusEvent::Departed { passengers } => {
                write!(f, "bus departing with {} passengers", passengers)
            }
        }
    }
}

/// Receives bus events.
///
/// Called while the bus state is locked, so events arrive in exactly the
/// order the transitions happened. Implementations must not call back into
/// the bus, and must return quickly without blocking: every boarder and the
/// arriving bus wait on the lock while `record` runs.
pub trait EventSink: Send + Sync + 'static {
    /// Records a single event.
    fn record(&self, event: &BusEvent);
}

impl<S: EventSink> EventSink for Arc<S> {
    fn record(&self, event: &BusEvent) {
        (**self).record(event);
    }
}

/// Logs every event at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &BusEvent) {
        match event {
            BusEvent::Boarded { passenger, count } => {
                info!(%passenger, count, "passenger boarded, count={}", count)
            }
            other => info!("{}", other),
        }
    }
}

/// Keeps every event in memory for later inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BusEvent>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped recorder so a test can keep a handle to it.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns a copy of all events recorded so far.
    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().clone()
    }

    /// Passenger counts of every departure, in order.
    pub fn departures(&self) -> Vec<usize> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Departed { passengers } => Some(*passengers),
                _ => None,
            })
            .collect()
    }

    /// Number of boarding events.
    pub fn boarded_total(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, BusEvent::Boarded { .. }))
            .count()
    }

    /// Number of arrival events.
    pub fn arrivals(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, BusEvent::Arrived))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &BusEvent) {
        self.events.lock().push(*event);
    }
}

/// Writes one JSON object per event to the wrapped writer.
pub struct JsonLinesSink<W: Write + Send + 'static> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    /// Wraps a writer.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl JsonLinesSink<std::io::Stdout> {
    /// JSON lines on standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> EventSink for JsonLinesSink<W> {
    fn record(&self, event: &BusEvent) {
        let mut out = self.out.lock();
        let written = serde_json::to_writer(&mut *out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush());

        if let Err(e) = written {
            warn!("Failed to write bus event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display_matches_log_lines() {
        let id = PassengerId::from_seed(1);
        assert_eq!(BusEvent::Arrived.to_string(), "bus has arrived");
        assert_eq!(
            BusEvent::Boarded { passenger: id, count: 3 }.to_string(),
            "passenger boarded, count=3"
        );
        assert_eq!(
            BusEvent::Departed { passengers: 12 }.to_string(),
            "bus departing with 12 passengers"
        );
    }

    #[test]
    fn test_recording_sink_summaries() {
        let sink = RecordingSink::new();
        let id = PassengerId::from_seed(1);

        sink.record(&BusEvent::Arrived);
        sink.record(&BusEvent::Boarded { passenger: id, count: 1 });
        sink.record(&BusEvent::Departed { passengers: 1 });
        sink.record(&BusEvent::Arrived);
        sink.record(&BusEvent::Departed { passengers: 0 });

        assert_eq!(sink.arrivals(), 2);
        assert_eq!(sink.boarded_total(), 1);
        assert_eq!(sink.departures(), vec![1, 0]);
        assert_eq!(sink.events().len(), 5);
    }

    #[test]
    fn test_json_lines_sink_writes_tagged_objects() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.record(&BusEvent::Arrived);
        sink.record(&BusEvent::Departed { passengers: 4 });

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"event":"arrived"}"#);

        let parsed: BusEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed, BusEvent::Departed { passengers: 4 });
    }
}
