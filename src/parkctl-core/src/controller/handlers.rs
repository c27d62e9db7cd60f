// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Command handlers for asset mutations.
//!
//! Each command is its own struct carrying validation and the mutation of a
//! working copy of the asset. Loading the record, the stale-version check,
//! the store write, auditing and notification are left to the manager, so
//! every entry point (single calls, bulk, emergency) shares one path.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::asset::status::Status;
use crate::asset::{Asset, EmergencyOverride, ManualOverride};
use crate::audit::AuditAction;
use crate::error::OverrideError;

use super::policies::EmergencyPolicy;

/// Actor attributed to sensor-feed writes.
pub const SENSOR_ACTOR: &str = "sensor";

/// Who to credit for a mutation in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub actor: String,
    pub reason: String,
}

/// Trait for asset commands following the Command Pattern.
pub trait CommandHandler: Debug + Send + Sync {
    /// Human-readable name of the command.
    fn name(&self) -> &'static str;

    /// Version the caller last saw. Only automation and emergency commands
    /// return `None` and write against whatever is read.
    fn expected_version(&self) -> Option<u64> {
        None
    }

    /// Whether a lost store race may be resolved by re-reading and retrying.
    fn retries_on_conflict(&self) -> bool {
        false
    }

    /// Reject the command against the current record. Runs before any mutation.
    fn validate(&self, asset: &Asset) -> Result<(), OverrideError>;

    /// Mutate the working copy. Returns `None` when there is nothing to write.
    fn apply(&self, asset: &mut Asset, now: DateTime<Utc>) -> Option<AuditAction>;

    fn attribution(&self) -> Attribution;
}

fn ensure_active(asset: &Asset) -> Result<(), OverrideError> {
    if asset.active {
        Ok(())
    } else {
        Err(OverrideError::InactiveAsset { asset: asset.key() })
    }
}

fn ensure_present(field: &str, value: &str) -> Result<(), OverrideError> {
    if value.trim().is_empty() {
        Err(OverrideError::InvalidRequest(format!(
            "{field} must not be empty"
        )))
    } else {
        Ok(())
    }
}

// ============================================================================
// Staff and automation commands
// ============================================================================

#[derive(Debug, Clone)]
pub struct SetManualOverrideCommand {
    pub status: Status,
    pub reason: String,
    pub actor: String,
    pub expected_version: u64,
}

impl CommandHandler for SetManualOverrideCommand {
    fn name(&self) -> &'static str {
        "set_manual_override"
    }

    fn expected_version(&self) -> Option<u64> {
        Some(self.expected_version)
    }

    fn validate(&self, asset: &Asset) -> Result<(), OverrideError> {
        ensure_active(asset)?;
        asset.check_status(self.status)?;
        ensure_present("reason", &self.reason)?;
        ensure_present("actor", &self.actor)
    }

    fn apply(&self, asset: &mut Asset, now: DateTime<Utc>) -> Option<AuditAction> {
        // Recorded even under an emergency; it takes effect once that clears.
        asset.manual_override = Some(ManualOverride {
            status: self.status,
            reason: self.reason.clone(),
            actor: self.actor.clone(),
            timestamp: now,
        });
        Some(AuditAction::ManualSet)
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            actor: self.actor.clone(),
            reason: self.reason.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClearManualOverrideCommand {
    pub actor: String,
    pub expected_version: u64,
}

impl CommandHandler for ClearManualOverrideCommand {
    fn name(&self) -> &'static str {
        "clear_manual_override"
    }

    fn expected_version(&self) -> Option<u64> {
        Some(self.expected_version)
    }

    fn validate(&self, asset: &Asset) -> Result<(), OverrideError> {
        ensure_active(asset)?;
        ensure_present("actor", &self.actor)?;
        if asset.manual_override.is_none() {
            return Err(OverrideError::NoOverride { asset: asset.key() });
        }
        Ok(())
    }

    fn apply(&self, asset: &mut Asset, _now: DateTime<Utc>) -> Option<AuditAction> {
        asset.manual_override.take()?;
        Some(AuditAction::ManualCleared)
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            actor: self.actor.clone(),
            reason: "manual override cleared".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateSensedStatusCommand {
    pub status: Status,
}

impl CommandHandler for UpdateSensedStatusCommand {
    fn name(&self) -> &'static str {
        "update_sensed_status"
    }

    // Sensor truth always wins for the sensed field.
    fn retries_on_conflict(&self) -> bool {
        true
    }

    fn validate(&self, asset: &Asset) -> Result<(), OverrideError> {
        asset.check_status(self.status)
    }

    fn apply(&self, asset: &mut Asset, _now: DateTime<Utc>) -> Option<AuditAction> {
        if asset.sensed_status == self.status {
            return None;
        }
        asset.sensed_status = self.status;
        Some(AuditAction::SensorUpdated)
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            actor: SENSOR_ACTOR.to_string(),
            reason: "sensor report".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetActiveCommand {
    pub active: bool,
    pub actor: String,
    pub expected_version: u64,
}

impl CommandHandler for SetActiveCommand {
    fn name(&self) -> &'static str {
        "set_active"
    }

    fn expected_version(&self) -> Option<u64> {
        Some(self.expected_version)
    }

    // Reactivation is the one command an inactive asset accepts.
    fn validate(&self, _asset: &Asset) -> Result<(), OverrideError> {
        ensure_present("actor", &self.actor)
    }

    fn apply(&self, asset: &mut Asset, _now: DateTime<Utc>) -> Option<AuditAction> {
        if asset.active == self.active {
            return None;
        }
        asset.active = self.active;
        Some(if self.active {
            AuditAction::Activated
        } else {
            AuditAction::Deactivated
        })
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            actor: self.actor.clone(),
            reason: if self.active { "activated" } else { "deactivated" }.to_string(),
        }
    }
}

// ============================================================================
// Emergency layer commands (issued by the broadcaster only)
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct SetEmergencyCommand {
    pub status: Status,
    pub policy: EmergencyPolicy,
    pub activation: Uuid,
}

impl CommandHandler for SetEmergencyCommand {
    fn name(&self) -> &'static str {
        "set_emergency_override"
    }

    fn retries_on_conflict(&self) -> bool {
        true
    }

    fn validate(&self, asset: &Asset) -> Result<(), OverrideError> {
        ensure_active(asset)?;
        asset.check_status(self.status)
    }

    fn apply(&self, asset: &mut Asset, now: DateTime<Utc>) -> Option<AuditAction> {
        let already_held = asset
            .emergency_override
            .as_ref()
            .is_some_and(|o| o.activation == self.activation && o.status == self.status);
        if already_held {
            return None;
        }
        asset.emergency_override = Some(EmergencyOverride {
            status: self.status,
            policy: self.policy,
            activation: self.activation,
            timestamp: now,
        });
        Some(AuditAction::EmergencySet)
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            actor: self.policy.to_string(),
            reason: self.activation.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ClearEmergencyCommand {
    pub policy: EmergencyPolicy,
    pub activation: Uuid,
}

impl CommandHandler for ClearEmergencyCommand {
    fn name(&self) -> &'static str {
        "clear_emergency_override"
    }

    fn retries_on_conflict(&self) -> bool {
        true
    }

    // Inactive assets are cleared too; otherwise a stale emergency layer
    // would resurface on reactivation.
    fn validate(&self, asset: &Asset) -> Result<(), OverrideError> {
        if asset.carries_activation(&self.activation) {
            Ok(())
        } else {
            Err(OverrideError::NoOverride { asset: asset.key() })
        }
    }

    fn apply(&self, asset: &mut Asset, _now: DateTime<Utc>) -> Option<AuditAction> {
        asset.emergency_override.take()?;
        Some(AuditAction::EmergencyCleared)
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            actor: self.policy.to_string(),
            reason: self.activation.to_string(),
        }
    }
}

// ============================================================================
// Command Factory
// ============================================================================

/// A single-asset command as data.
///
/// Staff commands must name the version they were issued against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    SetManualOverride {
        status: Status,
        reason: String,
        actor: String,
        expected_version: u64,
    },
    ClearManualOverride {
        actor: String,
        expected_version: u64,
    },
    UpdateSensedStatus {
        status: Status,
    },
    SetActive {
        active: bool,
        actor: String,
        expected_version: u64,
    },
}

/// Convert a command into its handler.
pub fn handler_for(cmd: Command) -> Box<dyn CommandHandler> {
    match cmd {
        Command::SetManualOverride {
            status,
            reason,
            actor,
            expected_version,
        } => Box::new(SetManualOverrideCommand {
            status,
            reason,
            actor,
            expected_version,
        }),
        Command::ClearManualOverride {
            actor,
            expected_version,
        } => Box::new(ClearManualOverrideCommand {
            actor,
            expected_version,
        }),
        Command::UpdateSensedStatus { status } => Box::new(UpdateSensedStatusCommand { status }),
        Command::SetActive {
            active,
            actor,
            expected_version,
        } => Box::new(SetActiveCommand {
            active,
            actor,
            expected_version,
        }),
    }
}
