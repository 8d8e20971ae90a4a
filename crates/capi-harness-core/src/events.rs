// crates/capi-harness-core/src/events.rs
// ============================================================================
// Module: Harness Events
// Description: Structured lifecycle events for harness components.
// Purpose: Emit JSON-line logs without a hard logging dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Harness components report what they did (process started, config
//! synthesized, callback forwarded) as [`HarnessEvent`] values handed to a
//! [`HarnessEventSink`]. Sinks are passed explicitly to each component so
//! tests can capture events and CLIs can stream them to stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label attached to every harness event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The step completed.
    Ok,
    /// The step failed.
    Failed,
}

/// Harness event payload.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Emitting component label.
    pub component: &'static str,
    /// Step outcome.
    pub outcome: EventOutcome,
    /// Free-form structured detail.
    pub detail: Map<String, Value>,
}

/// Inputs required to construct a harness event.
pub struct HarnessEventParams {
    /// Event identifier.
    pub event: &'static str,
    /// Emitting component label.
    pub component: &'static str,
    /// Step outcome.
    pub outcome: EventOutcome,
    /// Free-form structured detail.
    pub detail: Map<String, Value>,
}

impl HarnessEvent {
    /// Creates a new event with a consistent timestamp.
    #[must_use]
    pub fn new(params: HarnessEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: params.event,
            timestamp_ms,
            component: params.component,
            outcome: params.outcome,
            detail: params.detail,
        }
    }

    /// Shorthand for a successful event.
    #[must_use]
    pub fn ok(component: &'static str, event: &'static str, detail: Map<String, Value>) -> Self {
        Self::new(HarnessEventParams {
            event,
            component,
            outcome: EventOutcome::Ok,
            detail,
        })
    }

    /// Shorthand for a failed event.
    #[must_use]
    pub fn failed(
        component: &'static str,
        event: &'static str,
        detail: Map<String, Value>,
    ) -> Self {
        Self::new(HarnessEventParams {
            event,
            component,
            outcome: EventOutcome::Failed,
            detail,
        })
    }

    /// Returns a detail field as a string slice when present.
    #[must_use]
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail.get(key).and_then(Value::as_str)
    }
}

/// Builds an event detail map from key/value pairs.
#[must_use]
pub fn detail<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries.into_iter().map(|(key, value)| (key.to_string(), value)).collect()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for harness events.
pub trait HarnessEventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: &HarnessEvent);
}

/// Event sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl HarnessEventSink for StderrEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Event sink that logs JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl HarnessEventSink for FileEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Event sink that drops all events.
pub struct NoopEventSink;

impl HarnessEventSink for NoopEventSink {
    fn record(&self, _event: &HarnessEvent) {}
}

/// Event sink that keeps events in memory for later inspection.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Captured events in record order.
    events: Mutex<Vec<HarnessEvent>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of captured events.
    #[must_use]
    pub fn events(&self) -> Vec<HarnessEvent> {
        self.events.lock().map_or_else(|_| Vec::new(), |events| events.clone())
    }

    /// Returns captured events with the given identifier.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<HarnessEvent> {
        self.events().into_iter().filter(|event| event.event == name).collect()
    }
}

impl HarnessEventSink for MemoryEventSink {
    fn record(&self, event: &HarnessEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
