//! Predicate configuration.

#![forbid(unsafe_code)]

use std::str::FromStr;

use quell_core::FieldPath;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Severity attached to a diagnostic record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown trace level {0:?} (expected trace, debug, info or warn)")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateConfig {
    /// Paths stripped before comparing update snapshots, on top of `status`
    /// and `metadata.resourceVersion`.
    pub extra_ignored_paths: Vec<FieldPath>,
    /// Level used for per-decision diagnostics.
    pub trace_level: Level,
}

impl PredicateConfig {
    /// Read `QUELL_IGNORE_PATHS` (comma separated) and `QUELL_TRACE_LEVEL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let extra_ignored_paths = lookup("QUELL_IGNORE_PATHS")
            .map(|raw| parse_path_list(&raw))
            .unwrap_or_default();
        let trace_level = lookup("QUELL_TRACE_LEVEL")
            .and_then(|raw| match raw.parse::<Level>() {
                Ok(l) => Some(l),
                Err(e) => {
                    warn!(error = %e, "ignoring QUELL_TRACE_LEVEL");
                    None
                }
            })
            .unwrap_or_default();
        Self { extra_ignored_paths, trace_level }
    }

    pub fn with_ignored_path(mut self, path: FieldPath) -> Self {
        if !self.extra_ignored_paths.contains(&path) {
            self.extra_ignored_paths.push(path);
        }
        self
    }
}

fn parse_path_list(raw: &str) -> Vec<FieldPath> {
    let mut out = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match FieldPath::parse(item) {
            Ok(p) => {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
            Err(e) => warn!(path = item, error = %e, "skipping invalid ignore path"),
        }
    }
    out
}
