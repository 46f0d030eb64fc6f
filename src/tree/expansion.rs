//! Persisted record of which nodes are expanded.
//!
//! The on-disk shape has changed once: `entries` used to be a flat JSON
//! object keyed by child name. It is now an explicit list of `[name, record]`
//! pairs tagged with a version. Both decode into [`StoredState`], and
//! [`migrate`] turns either into the canonical [`ExpansionState`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Version written by [`ExpansionState::to_json`].
pub const CURRENT_VERSION: u32 = 2;

/// Errors raised while decoding or encoding a persisted expansion state.
#[derive(Error, Debug)]
pub enum StateError {
    /// The JSON did not match any known shape.
    #[error("Failed to decode expansion state: {0}")]
    Decode(#[from] serde_json::Error),

    /// The record was written by a newer version.
    #[error("Unsupported expansion state version {found} (newest known is {})", CURRENT_VERSION)]
    UnsupportedVersion {
        /// Version found in the record.
        found: u32,
    },
}

/// Expansion flag of one directory plus the saved state of its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    /// Whether the node is expanded.
    pub is_expanded: bool,
    /// Saved states of directory children, keyed by name.
    pub entries: BTreeMap<String, ExpansionState>,
}

impl ExpansionState {
    /// A collapsed state with no saved children.
    pub fn new() -> Self {
        Self::default()
    }

    /// An expanded state with no children recorded.
    pub fn expanded() -> Self {
        Self {
            is_expanded: true,
            entries: BTreeMap::new(),
        }
    }

    /// Slash-joined relative paths of every expanded descendant.
    pub fn expanded_descendants(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_expanded("", &mut out);
        out
    }

    fn collect_expanded(&self, prefix: &str, out: &mut BTreeSet<String>) {
        for (name, child) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            if child.is_expanded {
                out.insert(path.clone());
            }
            child.collect_expanded(&path, out);
        }
    }

    /// Decode either the current or the legacy shape.
    pub fn from_json(raw: &str) -> Result<Self, StateError> {
        let stored: StoredState = serde_json::from_str(raw)?;
        if stored.version > CURRENT_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: stored.version,
            });
        }
        Ok(migrate(stored))
    }

    /// Encode in the current shape.
    pub fn to_json(&self) -> Result<String, StateError> {
        let mut stored = StoredState::from(self);
        stored.version = CURRENT_VERSION;
        Ok(serde_json::to_string(&stored)?)
    }
}

/// Wire form of one record. `version` is only meaningful at the top level;
/// nested records leave it at zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    /// Format version; only set on the top-level record.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: u32,
    /// Whether the node is expanded.
    #[serde(default)]
    pub is_expanded: bool,
    /// Child records in either encoding.
    #[serde(default)]
    pub entries: Option<StoredEntries>,
}

/// The two encodings of `entries` seen in the wild.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredEntries {
    /// Current: ordered `[name, record]` pairs.
    Mapping(Vec<(String, StoredState)>),
    /// Legacy: a JSON object keyed by name.
    Legacy(BTreeMap<String, StoredState>),
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Convert a decoded record of any version into the canonical tree.
pub fn migrate(stored: StoredState) -> ExpansionState {
    let entries = match stored.entries {
        None => BTreeMap::new(),
        Some(StoredEntries::Mapping(pairs)) => pairs
            .into_iter()
            .map(|(name, child)| (name, migrate(child)))
            .collect(),
        Some(StoredEntries::Legacy(map)) => map
            .into_iter()
            .map(|(name, child)| (name, migrate(child)))
            .collect(),
    };

    ExpansionState {
        is_expanded: stored.is_expanded,
        entries,
    }
}

impl From<&ExpansionState> for StoredState {
    fn from(state: &ExpansionState) -> Self {
        let pairs = state
            .entries
            .iter()
            .map(|(name, child)| (name.clone(), StoredState::from(child)))
            .collect();

        Self {
            version: 0,
            is_expanded: state.is_expanded,
            entries: Some(StoredEntries::Mapping(pairs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_collapsed_and_empty() {
        let state = ExpansionState::new();
        assert!(!state.is_expanded);
        assert!(state.entries.is_empty());
    }

    #[test]
    fn test_legacy_object_entries_are_migrated() {
        let raw = r#"{
            "isExpanded": true,
            "entries": {
                "src": {"isExpanded": true, "entries": {"tree": {"isExpanded": true}}},
                "docs": {"isExpanded": false, "entries": {}}
            }
        }"#;

        let state = ExpansionState::from_json(raw).unwrap();

        assert!(state.is_expanded);
        assert_eq!(state.entries.len(), 2);
        assert!(state.entries["src"].entries["tree"].is_expanded);
        assert_eq!(
            state.expanded_descendants(),
            BTreeSet::from(["src".to_string(), "src/tree".to_string()])
        );
    }

    #[test]
    fn test_current_shape_survives_encode_decode() {
        let mut state = ExpansionState::expanded();
        let mut lib = ExpansionState::expanded();
        lib.entries.insert("gone".to_string(), ExpansionState::expanded());
        state.entries.insert("lib".to_string(), lib);

        let raw = state.to_json().unwrap();
        assert!(raw.contains(r#""version":2"#));

        assert_eq!(ExpansionState::from_json(&raw).unwrap(), state);
    }

    #[test]
    fn test_missing_and_null_entries() {
        let state = ExpansionState::from_json(r#"{"isExpanded": true, "entries": null}"#).unwrap();
        assert!(state.entries.is_empty());

        let state = ExpansionState::from_json("{}").unwrap();
        assert_eq!(state, ExpansionState::default());
    }

    #[test]
    fn test_future_version_rejected() {
        let err = ExpansionState::from_json(r#"{"version": 9, "isExpanded": true}"#).unwrap_err();
        assert!(matches!(err, StateError::UnsupportedVersion { found: 9 }));
    }
}
