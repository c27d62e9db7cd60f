// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Facility-wide emergency policies.
//!
//! Applying a policy tags every affected asset's emergency layer with one
//! activation id; clearing removes exactly the layers carrying that id. The
//! manual and sensed layers underneath are never touched, so each asset
//! falls back to whatever it resolved to before (or to a manual override
//! staged in the meantime).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::asset::Asset;
use crate::audit::AuditAction;
use crate::error::OverrideError;

use super::bulk::BatchReport;
use super::handlers::{ClearEmergencyCommand, SetEmergencyCommand};
use super::machine::{EmergencyEvent, EmergencyMode, EmergencyStateMachine, PolicyActivation};
use super::manager::OverrideManager;
use super::policies::EmergencyPolicy;

/// Actor recorded for an activation rebuilt from stored overrides.
pub const RECOVERED_ACTOR: &str = "recovered";

pub struct EmergencyBroadcaster {
    manager: Arc<OverrideManager>,
    machine: Mutex<EmergencyStateMachine>,
    /// Serializes apply, clear and recover. Never held by readers.
    run: Mutex<()>,
}

impl EmergencyBroadcaster {
    pub fn new(manager: Arc<OverrideManager>) -> Self {
        Self {
            manager,
            machine: Mutex::new(EmergencyStateMachine::new()),
            run: Mutex::new(()),
        }
    }

    pub fn manager(&self) -> &Arc<OverrideManager> {
        &self.manager
    }

    pub fn mode(&self) -> EmergencyMode {
        self.machine().mode().clone()
    }

    pub fn active_policy(&self) -> Option<EmergencyPolicy> {
        self.machine().mode().policy()
    }

    fn machine(&self) -> MutexGuard<'_, EmergencyStateMachine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_run(&self) -> MutexGuard<'_, ()> {
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn activation(&self) -> Option<PolicyActivation> {
        self.machine().mode().activation().cloned()
    }

    /// Feed `event` to the machine and tell listeners about the result.
    ///
    /// The machine lock is released before any listener runs, so listeners
    /// may read the mode.
    fn transition(&self, event: EmergencyEvent, actor: &str) {
        let change = {
            let mut machine = self.machine();
            let old = machine.mode().clone();
            machine
                .process_event(event)
                .then(|| (old, machine.mode().clone()))
        };
        if let Some((old, new)) = change {
            info!("Emergency mode {} -> {} by {}", old, new, actor);
            self.manager.events().notify_mode_change(&old, &new);
        }
    }

    /// Force `policy` onto every stored asset matching `target` that the
    /// policy has a rule for.
    ///
    /// Re-applying the active policy re-runs it under the same activation,
    /// which retries the assets that failed last time.
    pub fn apply_policy<F>(
        &self,
        policy: EmergencyPolicy,
        actor: &str,
        target: F,
    ) -> Result<BatchReport, OverrideError>
    where
        F: Fn(&Asset) -> bool,
    {
        if actor.trim().is_empty() {
            return Err(OverrideError::InvalidRequest(
                "actor must not be empty".into(),
            ));
        }

        let _run = self.begin_run();
        let (activation, first_run) = match self.activation() {
            Some(active) if active.policy != policy => {
                return Err(OverrideError::PolicyConflict {
                    active: active.policy,
                    requested: policy,
                });
            }
            Some(active) => (active, false),
            None => (
                PolicyActivation {
                    policy,
                    activation: Uuid::new_v4(),
                    actor: actor.to_string(),
                    activated_at: self.manager.clock().now(),
                },
                true,
            ),
        };
        let assets = self.manager.list()?;

        self.manager.record_policy(
            AuditAction::PolicyActivated,
            actor,
            format!("{} {}", policy, activation.activation),
        );
        if first_run {
            self.transition(EmergencyEvent::Activated(activation.clone()), actor);
        } else {
            info!("Re-applying {} ({})", policy, activation.activation);
        }

        let mut report = BatchReport::new(format!("apply_{policy}"));
        for asset in &assets {
            if !target(asset) {
                continue;
            }
            let Some(status) = policy.forced_status(asset.kind, &asset.group) else {
                continue;
            };
            let key = asset.key();
            let cmd = SetEmergencyCommand {
                status,
                policy,
                activation: activation.activation,
            };
            let result = self
                .manager
                .execute_handler(&key, &cmd)
                .map(|outcome| outcome.resolved);
            report.push(key, result);
        }

        if !report.is_success() {
            warn!(
                "{}: {} of {} assets not forced",
                policy,
                report.failed(),
                report.attempted()
            );
        }
        self.manager.events().notify_batch_complete(&report);
        Ok(report)
    }

    /// Remove the active policy's emergency layer from every asset.
    ///
    /// With no active policy this is a no-op. The mode only returns to
    /// normal once every carrying asset was cleared; otherwise the policy
    /// stays active and the call can be repeated.
    pub fn clear_policy(&self, actor: &str) -> Result<BatchReport, OverrideError> {
        if actor.trim().is_empty() {
            return Err(OverrideError::InvalidRequest(
                "actor must not be empty".into(),
            ));
        }

        let _run = self.begin_run();
        let Some(activation) = self.activation() else {
            return Ok(BatchReport::new("clear_policy"));
        };
        let assets = self.manager.list()?;

        let mut report = BatchReport::new(format!("clear_{}", activation.policy));
        for asset in assets
            .iter()
            .filter(|asset| asset.carries_activation(&activation.activation))
        {
            let key = asset.key();
            let cmd = ClearEmergencyCommand {
                policy: activation.policy,
                activation: activation.activation,
            };
            let result = self
                .manager
                .execute_handler(&key, &cmd)
                .map(|outcome| outcome.resolved);
            report.push(key, result);
        }

        self.manager.record_policy(
            AuditAction::PolicyCleared,
            actor,
            format!("{} {}", activation.policy, activation.activation),
        );

        if report.is_success() {
            self.transition(EmergencyEvent::Cleared, actor);
        } else {
            warn!(
                "{} stays active: {} of {} assets not cleared",
                activation.policy,
                report.failed(),
                report.attempted()
            );
        }
        self.manager.events().notify_batch_complete(&report);
        Ok(report)
    }

    /// Rebuild the mode from emergency layers already in the store.
    ///
    /// Only meaningful in normal mode, after a restart. When several
    /// activations are found the most recent one wins; the others stay on
    /// their assets until cleared by hand. A `warning` policy leaves no
    /// trace on assets and cannot be recovered.
    pub fn recover(&self) -> Result<Option<PolicyActivation>, OverrideError> {
        let _run = self.begin_run();
        if let Some(active) = self.activation() {
            return Ok(Some(active));
        }

        let mut found: HashMap<Uuid, (EmergencyPolicy, DateTime<Utc>)> = HashMap::new();
        for asset in self.manager.list()? {
            if let Some(layer) = asset.emergency_override {
                let entry = found
                    .entry(layer.activation)
                    .or_insert((layer.policy, layer.timestamp));
                entry.1 = entry.1.min(layer.timestamp);
            }
        }
        if found.len() > 1 {
            warn!(
                "Found {} emergency activations in store, keeping the latest",
                found.len()
            );
        }
        let Some((activation, (policy, activated_at))) = found
            .into_iter()
            .max_by_key(|(id, (_, activated_at))| (*activated_at, *id))
        else {
            return Ok(None);
        };

        let restored = PolicyActivation {
            policy,
            activation,
            actor: RECOVERED_ACTOR.to_string(),
            activated_at,
        };
        let (old, new) = {
            let mut machine = self.machine();
            let old = machine.mode().clone();
            machine.restore(restored.clone());
            (old, machine.mode().clone())
        };
        info!("Recovered emergency mode {} ({})", new, activation);
        self.manager.events().notify_mode_change(&old, &new);
        Ok(Some(restored))
    }
}
