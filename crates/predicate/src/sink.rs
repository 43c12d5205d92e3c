//! Diagnostic sinks for predicate decisions.
//!
//! Predicates never log through a global handle; they hold a [`TraceSink`]
//! handed to them at construction. [`TracingSink`] forwards to `tracing`,
//! [`RecordingSink`] keeps records in memory for assertions.

#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};

use quell_core::ObjectRef;

use crate::config::Level;

/// One structured diagnostic entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub level: Level,
    pub message: &'static str,
    pub object: ObjectRef,
    pub error: Option<String>,
}

impl TraceRecord {
    pub fn new(level: Level, message: &'static str, object: ObjectRef) -> Self {
        Self { level, message, object, error: None }
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Receiver for diagnostic records. Implementations must not panic and have
/// no way to report failure back to the predicate.
pub trait TraceSink: Send + Sync {
    fn record(&self, record: TraceRecord);
}

impl<S: TraceSink + ?Sized> TraceSink for Arc<S> {
    fn record(&self, record: TraceRecord) { (**self).record(record) }
}

impl<S: TraceSink + ?Sized> TraceSink for &S {
    fn record(&self, record: TraceRecord) { (**self).record(record) }
}

/// Forwards records to the `tracing` dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! emit {
    ($mac:ident, $r:ident) => {
        tracing::$mac!(
            target: "quell::predicate",
            name = %$r.object.name,
            namespace = $r.object.namespace.as_deref().unwrap_or(""),
            api_version = %$r.object.gvk.api_version(),
            kind = %$r.object.gvk.kind,
            error = $r.error.as_deref(),
            "{}",
            $r.message
        )
    };
}

impl TraceSink for TracingSink {
    fn record(&self, record: TraceRecord) {
        match record.level {
            Level::Trace => emit!(trace, record),
            Level::Debug => emit!(debug, record),
            Level::Info => emit!(info, record),
            Level::Warn => emit!(warn, record),
        }
    }
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _record: TraceRecord) {}
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<TraceRecord>>,
}

impl RecordingSink {
    pub fn new() -> Self { Self::default() }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl TraceSink for RecordingSink {
    fn record(&self, record: TraceRecord) {
        // A poisoned lock still holds usable data; keep recording.
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quell_core::GroupVersionKind;

    fn oref() -> ObjectRef {
        ObjectRef { name: "cm".into(), namespace: Some("ns".into()), gvk: GroupVersionKind::new("", "v1", "ConfigMap") }
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.record(TraceRecord::new(Level::Debug, "first", oref()));
        sink.record(TraceRecord::new(Level::Warn, "second", oref()).with_error("boom"));
        let recs = sink.records();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].message, "first");
        assert_eq!(recs[1].error.as_deref(), Some("boom"));
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn shared_sink_records_through_arc() {
        let sink = Arc::new(RecordingSink::new());
        let handle: Arc<dyn TraceSink> = sink.clone();
        handle.record(TraceRecord::new(Level::Info, "via arc", oref()));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn tracing_sink_accepts_every_level_without_subscriber() {
        for level in [Level::Trace, Level::Debug, Level::Info, Level::Warn] {
            TracingSink.record(TraceRecord::new(level, "noop", oref()));
        }
    }
}
