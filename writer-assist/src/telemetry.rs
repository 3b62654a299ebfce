//! Fire-and-forget analytics.
//!
//! Sinks must never fail the caller; emission is best-effort.

use shared_types::TelemetryEvent;
use std::sync::{Mutex, PoisonError};

pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Logs every event at info under the `writer_assist::telemetry` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        tracing::info!(
            target: "writer_assist::telemetry",
            name = %event.name,
            doc_id = %event.doc_id,
            suggestion_id = ?event.suggestion_id.as_ref().map(|id| id.as_str()),
            payload = %event.payload,
            "Telemetry event"
        );
    }
}

/// Buffers events in memory, for screens that batch uploads and for tests
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
