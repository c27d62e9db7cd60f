// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Emergency policy tables.
//!
//! A policy maps an asset's kind and group to the status it is forced into,
//! or to nothing when the policy leaves that asset alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::asset::status::Status;
use crate::asset::{Asset, AssetKind};
use crate::error::ParseError;

/// Group tag of assets on an emergency egress route.
pub const EMERGENCY_EXIT_GROUP: &str = "emergency_exit";
/// Group tag of the main vehicle entry.
pub const MAIN_ENTRY_GROUP: &str = "main_entry";

/// A named, system-wide emergency behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyPolicy {
    /// Advisory only; forces nothing.
    Warning,
    /// Takes machines and slots out of service.
    Disable,
    Lockdown,
    Evacuation,
}

enum GroupMatch {
    Any,
    Only(&'static [&'static str]),
    Except(&'static [&'static str]),
}

impl GroupMatch {
    fn matches(&self, group: &str) -> bool {
        match self {
            GroupMatch::Any => true,
            GroupMatch::Only(groups) => groups.contains(&group),
            GroupMatch::Except(groups) => !groups.contains(&group),
        }
    }
}

struct PolicyRule {
    kind: AssetKind,
    groups: GroupMatch,
    status: Status,
}

const WARNING_RULES: &[PolicyRule] = &[];

const DISABLE_RULES: &[PolicyRule] = &[
    PolicyRule {
        kind: AssetKind::Machine,
        groups: GroupMatch::Any,
        status: Status::OutOfService,
    },
    PolicyRule {
        kind: AssetKind::Slot,
        groups: GroupMatch::Any,
        status: Status::Disabled,
    },
];

const LOCKDOWN_RULES: &[PolicyRule] = &[
    PolicyRule {
        kind: AssetKind::Bollard,
        groups: GroupMatch::Any,
        status: Status::Raised,
    },
    PolicyRule {
        kind: AssetKind::Door,
        groups: GroupMatch::Except(&[EMERGENCY_EXIT_GROUP]),
        status: Status::Closed,
    },
];

const EVACUATION_RULES: &[PolicyRule] = &[
    PolicyRule {
        kind: AssetKind::Bollard,
        groups: GroupMatch::Only(&[EMERGENCY_EXIT_GROUP, MAIN_ENTRY_GROUP]),
        status: Status::Lowered,
    },
    PolicyRule {
        kind: AssetKind::Door,
        groups: GroupMatch::Any,
        status: Status::Open,
    },
    PolicyRule {
        kind: AssetKind::Machine,
        groups: GroupMatch::Any,
        status: Status::FreePass,
    },
];

impl EmergencyPolicy {
    pub const ALL: [EmergencyPolicy; 4] = [
        EmergencyPolicy::Warning,
        EmergencyPolicy::Disable,
        EmergencyPolicy::Lockdown,
        EmergencyPolicy::Evacuation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyPolicy::Warning => "warning",
            EmergencyPolicy::Disable => "disable",
            EmergencyPolicy::Lockdown => "lockdown",
            EmergencyPolicy::Evacuation => "evacuation",
        }
    }

    fn rules(self) -> &'static [PolicyRule] {
        match self {
            EmergencyPolicy::Warning => WARNING_RULES,
            EmergencyPolicy::Disable => DISABLE_RULES,
            EmergencyPolicy::Lockdown => LOCKDOWN_RULES,
            EmergencyPolicy::Evacuation => EVACUATION_RULES,
        }
    }

    /// Status this policy forces on an asset of `kind` in `group`, if any.
    pub fn forced_status(self, kind: AssetKind, group: &str) -> Option<Status> {
        self.rules()
            .iter()
            .find(|rule| rule.kind == kind && rule.groups.matches(group))
            .map(|rule| rule.status)
    }

    pub fn affects(self, asset: &Asset) -> bool {
        self.forced_status(asset.kind, &asset.group).is_some()
    }
}

impl fmt::Display for EmergencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmergencyPolicy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EmergencyPolicy::ALL
            .iter()
            .copied()
            .find(|policy| policy.as_str() == wanted)
            .ok_or_else(|| ParseError::Policy(s.to_string()))
    }
}
