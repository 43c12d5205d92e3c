//! Structured documents and dotted field paths.
//!
//! A [`Document`] is the tree form of a managed object: maps, sequences and
//! scalars, as produced by serializing the object to JSON. Path operations are
//! total: a missing key or a node of the wrong shape along the way is treated
//! as "nothing there" rather than an error.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;
use smallvec::SmallVec;

use crate::CoreError;

/// Dotted path into a document, e.g. `metadata.resourceVersion`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: SmallVec<[String; 4]>,
}

impl FieldPath {
    /// Parse a dotted path. A single leading `.` is accepted (`.status`).
    /// Wildcards, filters and index expressions are rejected.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidPath { path: raw.to_string(), reason: reason.to_string() };
        let s = raw.trim();
        let s = s.strip_prefix('.').unwrap_or(s);
        if s.is_empty() {
            return Err(invalid("empty path"));
        }
        let mut segments = SmallVec::new();
        for seg in s.split('.') {
            if seg.is_empty() {
                return Err(invalid("empty segment"));
            }
            if seg.contains(['*', '?', '[', ']']) {
                return Err(invalid("only plain keys are supported"));
            }
            segments.push(seg.to_string());
        }
        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Top-level `status` subtree.
    pub fn status() -> Self { Self::from_segments(["status"]) }

    /// `metadata.resourceVersion`.
    pub fn resource_version() -> Self { Self::from_segments(["metadata", "resourceVersion"]) }

    /// `metadata.generation`.
    pub fn generation() -> Self { Self::from_segments(["metadata", "generation"]) }

    pub fn segments(&self) -> &[String] { &self.segments }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl std::str::FromStr for FieldPath {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Tree-shaped snapshot of an object.
///
/// Equality is structural: maps compare irrespective of key order, sequences
/// compare element by element in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Json);

impl Document {
    pub fn new(value: Json) -> Self { Self(value) }

    pub fn as_value(&self) -> &Json { &self.0 }

    pub fn into_value(self) -> Json { self.0 }

    pub fn is_map(&self) -> bool { self.0.is_object() }

    /// Resolve `path`, returning `None` when any step is absent or not a map.
    pub fn get_path(&self, path: &FieldPath) -> Option<&Json> {
        let mut cur = &self.0;
        for seg in path.segments() {
            cur = cur.as_object()?.get(seg)?;
        }
        Some(cur)
    }

    /// Convenience for string-valued leaves.
    pub fn get_str(&self, path: &FieldPath) -> Option<&str> {
        self.get_path(path).and_then(Json::as_str)
    }

    /// Remove the node at `path` and return it.
    /// No-op when the path is absent or crosses a non-map node.
    pub fn remove_path(&mut self, path: &FieldPath) -> Option<Json> {
        let (last, parents) = path.segments().split_last()?;
        let mut cur = &mut self.0;
        for seg in parents {
            cur = cur.as_object_mut()?.get_mut(seg)?;
        }
        cur.as_object_mut()?.remove(last)
    }

    /// Remove every path in `paths`, skipping the ones that are not present.
    pub fn strip_paths<'a, I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = &'a FieldPath>,
    {
        for p in paths {
            self.remove_path(p);
        }
    }

    /// Deep copy with every path in `paths` removed. `self` is left untouched.
    pub fn normalized<'a, I>(&self, paths: I) -> Document
    where
        I: IntoIterator<Item = &'a FieldPath>,
    {
        let mut copy = self.clone();
        copy.strip_paths(paths);
        copy
    }
}

impl From<Json> for Document {
    fn from(value: Json) -> Self { Self(value) }
}
