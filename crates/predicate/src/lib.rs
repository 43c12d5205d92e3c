//! Quell predicates: decide which lifecycle events of dependent resources
//! should trigger a reconcile.
//!
//! [`DependentPredicate`] is the filter registered for resources a controller
//! creates on behalf of a primary object. Creation and generic events are
//! suppressed, deletions always pass, and updates pass only when something
//! other than `status` and `metadata.resourceVersion` changed.
//!
//! Predicates are stateless. Each call works on its own deep copies, so a
//! single instance can be shared across worker threads.

#![forbid(unsafe_code)]

use metrics::counter;
use quell_core::{FieldPath, LifecycleEvent, ManagedObject};

pub mod config;
pub mod sink;

pub use config::{Level, PredicateConfig};
pub use sink::{NullSink, RecordingSink, TraceRecord, TraceSink, TracingSink};

/// Admission contract: one entry point per event kind.
pub trait Predicate<K> {
    fn create(&self, obj: &K) -> bool;
    fn delete(&self, obj: &K) -> bool;
    fn update(&self, old: &K, new: &K) -> bool;
    fn generic(&self, obj: &K) -> bool;

    /// Dispatch on the event kind.
    fn evaluate(&self, event: &LifecycleEvent<K>) -> bool {
        match event {
            LifecycleEvent::Created(o) => self.create(o),
            LifecycleEvent::Deleted(o) => self.delete(o),
            LifecycleEvent::Updated { old, new } => self.update(old, new),
            LifecycleEvent::Generic(o) => self.generic(o),
        }
    }
}

fn tally(predicate: &'static str, event: &'static str, admit: bool) -> bool {
    if admit {
        counter!("predicate_admitted_total", 1u64, "predicate" => predicate, "event" => event);
    } else {
        counter!("predicate_suppressed_total", 1u64, "predicate" => predicate, "event" => event);
    }
    admit
}

/// Filter for dependent resources.
#[derive(Debug, Clone)]
pub struct DependentPredicate<S = TracingSink> {
    ignored: Vec<FieldPath>,
    level: Level,
    sink: S,
}

impl DependentPredicate<TracingSink> {
    pub fn new() -> Self { Self::with_sink(&PredicateConfig::default(), TracingSink) }

    pub fn from_config(cfg: &PredicateConfig) -> Self { Self::with_sink(cfg, TracingSink) }
}

impl Default for DependentPredicate<TracingSink> {
    fn default() -> Self { Self::new() }
}

impl<S: TraceSink> DependentPredicate<S> {
    pub fn with_sink(cfg: &PredicateConfig, sink: S) -> Self {
        let mut ignored = vec![FieldPath::status(), FieldPath::resource_version()];
        for p in &cfg.extra_ignored_paths {
            if !ignored.contains(p) {
                ignored.push(p.clone());
            }
        }
        Self { ignored, level: cfg.trace_level, sink }
    }

    /// Paths removed from both snapshots before an update is compared.
    pub fn ignored_paths(&self) -> &[FieldPath] { &self.ignored }

    pub fn sink(&self) -> &S { &self.sink }

    fn trace<K: ManagedObject>(&self, message: &'static str, obj: &K) {
        self.sink.record(TraceRecord::new(self.level, message, obj.object_ref()));
    }
}

impl<K: ManagedObject, S: TraceSink> Predicate<K> for DependentPredicate<S> {
    // Dependents are created by the reconcile that is already running.
    fn create(&self, obj: &K) -> bool {
        self.trace("Skipping reconciliation for dependent resource creation", obj);
        tally("dependent", "create", false)
    }

    // Reconcile so the dependent gets recreated.
    fn delete(&self, obj: &K) -> bool {
        self.trace("Reconciling due to dependent resource deletion", obj);
        tally("dependent", "delete", true)
    }

    fn generic(&self, obj: &K) -> bool {
        self.trace("Skipping reconcile due to generic event", obj);
        tally("dependent", "generic", false)
    }

    /// Reconcile when the dependent changed in a way that may need patching
    /// back. Changes confined to status and resourceVersion are ignored.
    fn update(&self, old: &K, new: &K) -> bool {
        let (mut old_doc, mut new_doc) = match (old.to_document(), new.to_document()) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => {
                self.sink.record(
                    TraceRecord::new(Level::Warn, "Reconciling dependent resource with unreadable update", new.object_ref())
                        .with_error(e),
                );
                return tally("dependent", "update", true);
            }
        };
        old_doc.strip_paths(&self.ignored);
        new_doc.strip_paths(&self.ignored);
        if old_doc == new_doc {
            return tally("dependent", "update", false);
        }
        self.trace("Reconciling due to dependent resource update", new);
        tally("dependent", "update", true)
    }
}

/// Admits updates only when `metadata.generation` moved.
///
/// Every other event kind passes. A missing generation reads as 0, so kinds
/// that never carry one (ConfigMap, Secret) have all their updates suppressed.
#[derive(Debug, Clone, Default)]
pub struct GenerationChangedPredicate<S = TracingSink> {
    level: Level,
    sink: S,
}

impl GenerationChangedPredicate<TracingSink> {
    pub fn new() -> Self { Self::default() }
}

impl<S: TraceSink> GenerationChangedPredicate<S> {
    pub fn with_sink(cfg: &PredicateConfig, sink: S) -> Self { Self { level: cfg.trace_level, sink } }

    pub fn sink(&self) -> &S { &self.sink }
}

impl<K: ManagedObject, S: TraceSink> Predicate<K> for GenerationChangedPredicate<S> {
    fn create(&self, _obj: &K) -> bool { tally("generation", "create", true) }

    fn delete(&self, _obj: &K) -> bool { tally("generation", "delete", true) }

    fn generic(&self, _obj: &K) -> bool { tally("generation", "generic", true) }

    fn update(&self, old: &K, new: &K) -> bool {
        if old.generation().unwrap_or(0) == new.generation().unwrap_or(0) {
            return tally("generation", "update", false);
        }
        self.sink.record(TraceRecord::new(self.level, "Reconciling due to generation change", new.object_ref()));
        tally("generation", "update", true)
    }
}
