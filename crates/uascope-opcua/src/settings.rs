// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Persisted value bags and the identity-path codec.
//!
//! The engine produces and consumes two opaque bags for the persistence
//! collaborator: the last-used connection parameters and the last-viewed
//! node state. It never interprets them beyond field access. The JSON
//! store helper returns explicit `Result`s, but persistence is best-effort
//! by contract — callers log failures and continue, and a store failure
//! must never surface as an engine failure.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ConfigError, SettingsError};
use crate::types::{NodeClass, NodeId, SecurityMode, SecurityPolicy};

/// Last-used connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Server endpoint URL.
    pub endpoint_url: String,
    /// Security policy used.
    pub policy: SecurityPolicy,
    /// Security mode used.
    pub mode: SecurityMode,
}

/// Last-viewed node state, enough to restore selection and observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastViewedNode {
    /// Serialized node identity.
    pub node_id: String,
    /// Display name at the time of viewing.
    pub display_name: String,
    /// Node class at the time of viewing.
    pub node_class: NodeClass,
    /// Identity path, `"<displayName>|<nodeId>"`.
    pub path: String,
    /// Whether the node was being monitored.
    pub subscribed: bool,
    /// Sampling interval if subscribed, in milliseconds.
    pub interval_ms: Option<u64>,
}

/// The full persisted settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Last-used connection parameters, if any.
    pub connection: Option<ConnectionSettings>,
    /// Last-viewed node, if any.
    pub last_viewed: Option<LastViewedNode>,
}

// ============================================================================
// Identity path
// ============================================================================

/// Derived identity string pairing a display name with a node id,
/// rendered as `"<displayName>|<nodeId>"`.
///
/// The node-id side never contains `|`, so parsing splits on the last
/// separator and display names may contain `|` themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    /// Display name component.
    pub display_name: String,
    /// Node identity component.
    pub node_id: NodeId,
}

impl NodePath {
    /// Pairs a display name with a node id.
    pub fn new(display_name: impl Into<String>, node_id: NodeId) -> Self {
        Self { display_name: display_name.into(), node_id }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.display_name, self.node_id)
    }
}

impl FromStr for NodePath {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, id)) = s.rsplit_once('|') else {
            return Err(ClientError::config(ConfigError::InvalidIdentityPath {
                input: s.to_string(),
            }));
        };
        let node_id: NodeId = id.parse().map_err(|_| {
            ClientError::config(ConfigError::InvalidIdentityPath { input: s.to_string() })
        })?;
        Ok(Self { display_name: name.to_string(), node_id })
    }
}

// ============================================================================
// Store
// ============================================================================

/// JSON-file settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store over the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path backing the store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings document. A missing file yields the default
    /// (empty) document, not an error.
    pub fn load(&self) -> Result<AppSettings, ClientError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(AppSettings::default());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| SettingsError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        let settings = serde_json::from_str(&text).map_err(|e| SettingsError::Malformed {
            path: self.path.display().to_string(),
            source: e,
        })?;
        Ok(settings)
    }

    /// Saves the settings document, creating parent directories as needed.
    pub fn save(&self, settings: &AppSettings) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(settings).map_err(|e| SettingsError::Malformed {
            path: self.path.display().to_string(),
            source: e,
        })?;
        fs::write(&self.path, json).map_err(|e| SettingsError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn node_path_round_trips() {
        let path = NodePath::new("Motor Speed", NodeId::string(2, "Plant.Motor.Speed"));
        let rendered = path.to_string();
        assert_eq!(rendered, "Motor Speed|ns=2;s=Plant.Motor.Speed");
        assert_eq!(rendered.parse::<NodePath>().unwrap(), path);
    }

    #[test]
    fn node_path_display_name_may_contain_separator() {
        let path = NodePath::new("A|B", NodeId::numeric(0, 85));
        let parsed: NodePath = path.to_string().parse().unwrap();
        assert_eq!(parsed.display_name, "A|B");
        assert_eq!(parsed.node_id, NodeId::objects_folder());
    }

    #[test]
    fn node_path_rejects_missing_separator() {
        assert!("just-a-name".parse::<NodePath>().is_err());
    }

    #[test]
    fn store_round_trips_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        let settings = AppSettings {
            connection: Some(ConnectionSettings {
                endpoint_url: "opc.tcp://server:4840".to_string(),
                policy: SecurityPolicy::Basic256Sha256,
                mode: SecurityMode::SignAndEncrypt,
            }),
            last_viewed: Some(LastViewedNode {
                node_id: "ns=2;s=Plant.Motor.Speed".to_string(),
                display_name: "Speed".to_string(),
                node_class: NodeClass::Variable,
                path: "Speed|ns=2;s=Plant.Motor.Speed".to_string(),
                subscribed: true,
                interval_ms: Some(250),
            }),
        };

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), AppSettings::default());
    }

    #[test]
    fn malformed_file_is_an_explicit_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let err = SettingsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ClientError::Settings(SettingsError::Malformed { .. })));
    }
}
