//! Quell core types: documents, object identity and lifecycle events.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub mod document;

pub use document::{Document, FieldPath};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid field path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("serializing object to document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("expected a map at document root, found {found}")]
    NotAnObject { found: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Split an `apiVersion` string (`v1`, `apps/v1`) into group and version.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        Self::new(group, version, kind)
    }

    /// Group/version rendered the way manifests spell it.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }
}

/// Identity of an object, used for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub name: String,
    pub namespace: Option<String>,
    pub gvk: GroupVersionKind,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.gvk.api_version(), self.gvk.kind)?;
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Capabilities the admission filter needs from a watched object type.
pub trait ManagedObject {
    fn object_ref(&self) -> ObjectRef;

    /// Deep copy of the object as a structured document.
    fn to_document(&self) -> Result<Document, CoreError>;

    /// `metadata.generation`, if the object carries one.
    fn generation(&self) -> Option<i64> {
        let doc = self.to_document().ok()?;
        doc.get_path(&FieldPath::generation()).and_then(Json::as_i64)
    }
}

/// Lifecycle notification delivered by the reconciliation engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent<K> {
    Created(K),
    Deleted(K),
    Updated { old: K, new: K },
    Generic(K),
}

impl<K> LifecycleEvent<K> {
    /// Short lowercase name of the event kind (`create`, `update`, ...).
    pub fn kind_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Created(_) => "create",
            LifecycleEvent::Deleted(_) => "delete",
            LifecycleEvent::Updated { .. } => "update",
            LifecycleEvent::Generic(_) => "generic",
        }
    }

    /// Convert the payload type, e.g. wrapping engine objects in an adapter.
    pub fn map<U>(self, mut f: impl FnMut(K) -> U) -> LifecycleEvent<U> {
        match self {
            LifecycleEvent::Created(o) => LifecycleEvent::Created(f(o)),
            LifecycleEvent::Deleted(o) => LifecycleEvent::Deleted(f(o)),
            LifecycleEvent::Updated { old, new } => LifecycleEvent::Updated { old: f(old), new: f(new) },
            LifecycleEvent::Generic(o) => LifecycleEvent::Generic(f(o)),
        }
    }

    /// The object the event is about (the new side for updates).
    pub fn object(&self) -> &K {
        match self {
            LifecycleEvent::Created(o) | LifecycleEvent::Deleted(o) | LifecycleEvent::Generic(o) => o,
            LifecycleEvent::Updated { new, .. } => new,
        }
    }
}

/// Object held in generic document form, without a typed schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unstructured(Document);

impl Unstructured {
    pub fn new(value: Json) -> Self { Self(Document::new(value)) }

    /// Like [`Unstructured::new`] but insists on a map at the root.
    pub fn try_from_value(value: Json) -> Result<Self, CoreError> {
        let found = match &value {
            Json::Object(_) => return Ok(Self::new(value)),
            Json::Null => "null",
            Json::Bool(_) => "bool",
            Json::Number(_) => "number",
            Json::String(_) => "string",
            Json::Array(_) => "sequence",
        };
        Err(CoreError::NotAnObject { found })
    }

    pub fn document(&self) -> &Document { &self.0 }

    fn str_at(&self, segments: &[&str]) -> Option<&str> {
        self.0.get_str(&FieldPath::from_segments(segments.iter().copied()))
    }
}

impl From<Json> for Unstructured {
    fn from(value: Json) -> Self { Self::new(value) }
}

impl ManagedObject for Unstructured {
    fn object_ref(&self) -> ObjectRef {
        let api_version = self.str_at(&["apiVersion"]).unwrap_or_default();
        let kind = self.str_at(&["kind"]).unwrap_or_default();
        ObjectRef {
            name: self.str_at(&["metadata", "name"]).unwrap_or_default().to_string(),
            namespace: self.str_at(&["metadata", "namespace"]).map(|s| s.to_string()),
            gvk: GroupVersionKind::from_api_version(api_version, kind),
        }
    }

    fn to_document(&self) -> Result<Document, CoreError> { Ok(self.0.clone()) }

    fn generation(&self) -> Option<i64> {
        self.0.get_path(&FieldPath::generation()).and_then(Json::as_i64)
    }
}

pub mod prelude {
    pub use super::{
        CoreError, Document, FieldPath, GroupVersionKind, LifecycleEvent, ManagedObject, ObjectRef, Unstructured,
    };
}
