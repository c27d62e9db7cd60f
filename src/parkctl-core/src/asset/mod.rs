// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::controller::policies::EmergencyPolicy;
use crate::error::{OverrideError, ParseError};

pub mod resolve;
pub mod status;

use resolve::ResolvedStatus;
use status::Status;

/// Category of controllable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Slot,
    Bollard,
    Door,
    Machine,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Slot,
        AssetKind::Bollard,
        AssetKind::Door,
        AssetKind::Machine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Slot => "slot",
            AssetKind::Bollard => "bollard",
            AssetKind::Door => "door",
            AssetKind::Machine => "machine",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AssetKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ParseError::Kind(s.to_string()))
    }
}

/// Identity of an asset: ids are only unique within a kind.
///
/// Text form is `<kind>:<id>`, e.g. `slot:E-12`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetKey {
    pub kind: AssetKind,
    pub id: String,
}

impl AssetKey {
    pub fn new(kind: AssetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn slot(id: impl Into<String>) -> Self {
        Self::new(AssetKind::Slot, id)
    }

    pub fn bollard(id: impl Into<String>) -> Self {
        Self::new(AssetKind::Bollard, id)
    }

    pub fn door(id: impl Into<String>) -> Self {
        Self::new(AssetKind::Door, id)
    }

    pub fn machine(id: impl Into<String>) -> Self {
        Self::new(AssetKind::Machine, id)
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for AssetKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, id)) = s.trim().split_once(':') else {
            return Err(ParseError::Key(s.to_string()));
        };
        if id.is_empty() {
            return Err(ParseError::Key(s.to_string()));
        }
        Ok(Self::new(kind.parse()?, id))
    }
}

impl TryFrom<String> for AssetKey {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetKey> for String {
    fn from(key: AssetKey) -> Self {
        key.to_string()
    }
}

/// Staff-forced state, present only while staff control is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOverride {
    pub status: Status,
    pub reason: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

/// Policy-forced state, present only while an emergency policy holds the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyOverride {
    pub status: Status,
    pub policy: EmergencyPolicy,
    /// Tag of the policy run that set this override.
    pub activation: Uuid,
    pub timestamp: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Canonical record of a controllable asset and its override layers.
///
/// This is also the persisted shape. `version` is owned by the store and
/// moves by exactly one per accepted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub kind: AssetKind,
    pub group: String,
    pub sensed_status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_override: Option<ManualOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_override: Option<EmergencyOverride>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub version: u64,
}

impl Asset {
    /// Create a fresh, active asset with only a sensed status.
    pub fn provision(
        kind: AssetKind,
        id: impl Into<String>,
        group: impl Into<String>,
        sensed_status: Status,
    ) -> Result<Self, OverrideError> {
        let asset = Self {
            id: id.into(),
            kind,
            group: group.into(),
            sensed_status,
            manual_override: None,
            emergency_override: None,
            active: true,
            version: 0,
        };
        asset.validate()?;
        Ok(asset)
    }

    pub fn key(&self) -> AssetKey {
        AssetKey::new(self.kind, self.id.clone())
    }

    pub fn resolve(&self) -> ResolvedStatus {
        resolve::resolve(self)
    }

    /// Whether the emergency layer was set by the given policy run.
    pub fn carries_activation(&self, activation: &Uuid) -> bool {
        self.emergency_override
            .as_ref()
            .is_some_and(|o| &o.activation == activation)
    }

    /// Check a record loaded from outside the engine (fleet files, provisioning).
    pub fn validate(&self) -> Result<(), OverrideError> {
        if self.id.trim().is_empty() {
            return Err(OverrideError::InvalidRequest(
                "asset id must not be empty".into(),
            ));
        }
        if self.id.contains(':') {
            return Err(OverrideError::InvalidRequest(format!(
                "asset id '{}' must not contain ':'",
                self.id
            )));
        }
        self.check_status(self.sensed_status)?;
        if let Some(manual) = &self.manual_override {
            self.check_status(manual.status)?;
            if manual.reason.trim().is_empty() || manual.actor.trim().is_empty() {
                return Err(OverrideError::InvalidRequest(format!(
                    "{}: manual override needs a reason and an actor",
                    self.key()
                )));
            }
        }
        if let Some(emergency) = &self.emergency_override {
            self.check_status(emergency.status)?;
        }
        Ok(())
    }

    pub(crate) fn check_status(&self, status: Status) -> Result<(), OverrideError> {
        if status.is_legal_for(self.kind) {
            Ok(())
        } else {
            Err(OverrideError::InvalidStatus {
                asset: self.key(),
                kind: self.kind,
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip_text() {
        let key: AssetKey = "slot:E-12".parse().unwrap();
        assert_eq!(key, AssetKey::slot("E-12"));
        assert_eq!(key.to_string(), "slot:E-12");

        let door: AssetKey = "door:A-1-MAIN".parse().unwrap();
        assert_eq!(door.kind, AssetKind::Door);
        assert_eq!(door.id, "A-1-MAIN");
    }

    #[test]
    fn test_key_rejects_malformed() {
        assert!(matches!(
            "E-12".parse::<AssetKey>(),
            Err(ParseError::Key(_))
        ));
        assert!(matches!(
            "slot:".parse::<AssetKey>(),
            Err(ParseError::Key(_))
        ));
        assert!(matches!(
            "gate:G1".parse::<AssetKey>(),
            Err(ParseError::Kind(_))
        ));
    }

    #[test]
    fn test_provision_rejects_illegal_sensed_status() {
        let err = Asset::provision(AssetKind::Bollard, "B-1", "main_entry", Status::Open)
            .unwrap_err();
        assert!(matches!(err, OverrideError::InvalidStatus { .. }));
    }

    #[test]
    fn test_provision_defaults() {
        let asset =
            Asset::provision(AssetKind::Slot, "E-12", "E", Status::Occupied).unwrap();
        assert!(asset.active);
        assert_eq!(asset.version, 0);
        assert!(asset.manual_override.is_none());
        assert!(asset.emergency_override.is_none());
    }

    #[test]
    fn test_persisted_shape_defaults() {
        let json = r#"{"id":"M-1","kind":"machine","group":"entry","sensed_status":"normal"}"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert!(asset.active);
        assert_eq!(asset.version, 0);
        assert_eq!(asset.key(), AssetKey::machine("M-1"));
    }
}
