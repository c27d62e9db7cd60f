// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Effective status resolution.
//!
//! Precedence is emergency, then manual, then sensed. The resolved status is
//! never stored; it is recomputed from a single asset snapshot every time.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::status::Status;
use super::Asset;

/// Which layer decided the resolved status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSource {
    Emergency,
    Manual,
    Sensor,
}

impl ControlSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlSource::Emergency => "emergency",
            ControlSource::Manual => "manual",
            ControlSource::Sensor => "sensor",
        }
    }
}

impl fmt::Display for ControlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single status consumers should treat as truth, with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedStatus {
    pub status: Status,
    pub source: ControlSource,
}

impl ResolvedStatus {
    /// True when something other than the sensor decided the status.
    pub fn is_overridden(&self) -> bool {
        self.source != ControlSource::Sensor
    }
}

impl fmt::Display for ResolvedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.status, self.source)
    }
}

pub fn resolve(asset: &Asset) -> ResolvedStatus {
    if let Some(emergency) = &asset.emergency_override {
        return ResolvedStatus {
            status: emergency.status,
            source: ControlSource::Emergency,
        };
    }
    if let Some(manual) = &asset.manual_override {
        return ResolvedStatus {
            status: manual.status,
            source: ControlSource::Manual,
        };
    }
    ResolvedStatus {
        status: asset.sensed_status,
        source: ControlSource::Sensor,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::asset::{AssetKind, EmergencyOverride, ManualOverride};
    use crate::controller::policies::EmergencyPolicy;

    fn door(manual: Option<Status>, emergency: Option<Status>) -> Asset {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Asset {
            id: "D-1".to_string(),
            kind: AssetKind::Door,
            group: "A".to_string(),
            sensed_status: Status::Closed,
            manual_override: manual.map(|status| ManualOverride {
                status,
                reason: "maintenance".to_string(),
                actor: "staff42".to_string(),
                timestamp: ts,
            }),
            emergency_override: emergency.map(|status| EmergencyOverride {
                status,
                policy: EmergencyPolicy::Evacuation,
                activation: Uuid::nil(),
                timestamp: ts,
            }),
            active: true,
            version: 3,
        }
    }

    #[test]
    fn test_precedence_matrix() {
        let cases = [
            (None, None, Status::Closed, ControlSource::Sensor),
            (Some(Status::Locked), None, Status::Locked, ControlSource::Manual),
            (None, Some(Status::Open), Status::Open, ControlSource::Emergency),
            (
                Some(Status::Locked),
                Some(Status::Open),
                Status::Open,
                ControlSource::Emergency,
            ),
        ];
        for (manual, emergency, status, source) in cases {
            let resolved = resolve(&door(manual, emergency));
            assert_eq!(resolved, ResolvedStatus { status, source });
        }
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let asset = door(Some(Status::Locked), None);
        assert_eq!(resolve(&asset), resolve(&asset.clone()));
    }

    #[test]
    fn test_override_badge() {
        assert!(!resolve(&door(None, None)).is_overridden());
        assert!(resolve(&door(Some(Status::Open), None)).is_overridden());
        assert_eq!(resolve(&door(None, None)).to_string(), "closed/sensor");
    }
}
