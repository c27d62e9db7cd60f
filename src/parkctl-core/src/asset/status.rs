// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

use super::AssetKind;

/// Every status any asset kind can report or be forced into.
///
/// Which statuses are legal for which kind is decided by [`legal_statuses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Available,
    Occupied,
    Reserved,
    Disabled,
    Raised,
    Lowered,
    Open,
    Closed,
    Locked,
    Normal,
    FreePass,
    OutOfService,
}

const SLOT_STATUSES: &[Status] = &[
    Status::Available,
    Status::Occupied,
    Status::Reserved,
    Status::Disabled,
];

const BOLLARD_STATUSES: &[Status] = &[Status::Raised, Status::Lowered];

const DOOR_STATUSES: &[Status] = &[Status::Open, Status::Closed, Status::Locked];

const MACHINE_STATUSES: &[Status] = &[
    Status::Normal,
    Status::FreePass,
    Status::Closed,
    Status::OutOfService,
];

/// Statuses an asset of `kind` may take, sensed or forced.
pub fn legal_statuses(kind: AssetKind) -> &'static [Status] {
    match kind {
        AssetKind::Slot => SLOT_STATUSES,
        AssetKind::Bollard => BOLLARD_STATUSES,
        AssetKind::Door => DOOR_STATUSES,
        AssetKind::Machine => MACHINE_STATUSES,
    }
}

impl Status {
    pub const ALL: [Status; 12] = [
        Status::Available,
        Status::Occupied,
        Status::Reserved,
        Status::Disabled,
        Status::Raised,
        Status::Lowered,
        Status::Open,
        Status::Closed,
        Status::Locked,
        Status::Normal,
        Status::FreePass,
        Status::OutOfService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Available => "available",
            Status::Occupied => "occupied",
            Status::Reserved => "reserved",
            Status::Disabled => "disabled",
            Status::Raised => "raised",
            Status::Lowered => "lowered",
            Status::Open => "open",
            Status::Closed => "closed",
            Status::Locked => "locked",
            Status::Normal => "normal",
            Status::FreePass => "free_pass",
            Status::OutOfService => "out_of_service",
        }
    }

    pub fn is_legal_for(self, kind: AssetKind) -> bool {
        legal_statuses(kind).contains(&self)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseError;

    /// Accepts the snake_case name; `-` is treated as `_` so that
    /// `out-of-service` parses as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Status::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ParseError::Status(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_is_legal_somewhere() {
        for status in Status::ALL {
            assert!(
                AssetKind::ALL.iter().any(|kind| status.is_legal_for(*kind)),
                "{status} is not legal for any kind"
            );
        }
    }

    #[test]
    fn test_kind_tables() {
        assert!(Status::Occupied.is_legal_for(AssetKind::Slot));
        assert!(!Status::Raised.is_legal_for(AssetKind::Slot));
        assert!(Status::Closed.is_legal_for(AssetKind::Door));
        assert!(Status::Closed.is_legal_for(AssetKind::Machine));
        assert!(!Status::Open.is_legal_for(AssetKind::Bollard));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!("free_pass".parse::<Status>().unwrap(), Status::FreePass);
        assert_eq!(
            "Out-Of-Service".parse::<Status>().unwrap(),
            Status::OutOfService
        );
        assert!("ajar".parse::<Status>().is_err());
    }

    #[test]
    fn test_serde_name_matches_display() {
        for status in Status::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }
}
