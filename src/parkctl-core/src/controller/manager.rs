// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Single-asset override operations.
//!
//! Every mutation, whichever entry point it comes from, runs through
//! [`OverrideManager::execute_handler`]: read a snapshot, check the caller's
//! version, validate, mutate a copy, compare-and-swap it into the store,
//! audit, notify. A rejected command never reaches the store.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::asset::resolve::ResolvedStatus;
use crate::asset::status::Status;
use crate::asset::{Asset, AssetKey};
use crate::audit::{AuditAction, AuditRecord, AuditSink};
use crate::clock::{Clock, SystemClock};
use crate::error::OverrideError;
use crate::store::AssetStore;

use super::events::{AssetListener, EventEmitter, ListenerId};
use super::handlers::{
    handler_for, ClearManualOverrideCommand, Command, CommandHandler, SetActiveCommand,
    SetManualOverrideCommand, UpdateSensedStatusCommand,
};
use super::retry::{FixedAttempts, RetryPolicy};

/// Result of a single-asset operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Record after the operation, as stored.
    pub asset: Asset,
    pub previous: ResolvedStatus,
    pub resolved: ResolvedStatus,
    /// False when the command was a no-op and nothing was written.
    pub changed: bool,
}

pub struct OverrideManager {
    store: Arc<dyn AssetStore>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    retry: Arc<dyn RetryPolicy>,
    events: EventEmitter,
}

impl OverrideManager {
    pub fn new(store: Arc<dyn AssetStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            clock: Arc::new(SystemClock),
            retry: Arc::new(FixedAttempts::default()),
            events: EventEmitter::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    pub fn register_listener(&mut self, listener: Arc<dyn AssetListener>) -> ListenerId {
        self.events.register(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) {
        self.events.unregister(id);
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn get(&self, key: &AssetKey) -> Result<Asset, OverrideError> {
        Ok(self.store.get(key)?)
    }

    pub fn resolved(&self, key: &AssetKey) -> Result<ResolvedStatus, OverrideError> {
        Ok(self.get(key)?.resolve())
    }

    pub fn list(&self) -> Result<Vec<Asset>, OverrideError> {
        Ok(self.store.list()?)
    }

    pub fn set_manual_override(
        &self,
        key: &AssetKey,
        status: Status,
        reason: &str,
        actor: &str,
        expected_version: u64,
    ) -> Result<Outcome, OverrideError> {
        let cmd = SetManualOverrideCommand {
            status,
            reason: reason.to_string(),
            actor: actor.to_string(),
            expected_version,
        };
        self.execute_handler(key, &cmd)
    }

    pub fn clear_manual_override(
        &self,
        key: &AssetKey,
        actor: &str,
        expected_version: u64,
    ) -> Result<Outcome, OverrideError> {
        let cmd = ClearManualOverrideCommand {
            actor: actor.to_string(),
            expected_version,
        };
        self.execute_handler(key, &cmd)
    }

    /// Record a sensor report. Never version-checked by the caller.
    pub fn update_sensed_status(
        &self,
        key: &AssetKey,
        status: Status,
    ) -> Result<Outcome, OverrideError> {
        self.execute_handler(key, &UpdateSensedStatusCommand { status })
    }

    pub fn set_active(
        &self,
        key: &AssetKey,
        active: bool,
        actor: &str,
        expected_version: u64,
    ) -> Result<Outcome, OverrideError> {
        let cmd = SetActiveCommand {
            active,
            actor: actor.to_string(),
            expected_version,
        };
        self.execute_handler(key, &cmd)
    }

    /// Run a command given as data.
    pub fn execute(&self, key: &AssetKey, cmd: Command) -> Result<Outcome, OverrideError> {
        let handler = handler_for(cmd);
        self.execute_handler(key, handler.as_ref())
    }

    pub(crate) fn execute_handler(
        &self,
        key: &AssetKey,
        handler: &dyn CommandHandler,
    ) -> Result<Outcome, OverrideError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_execute(key, handler) {
                Ok(outcome) => return Ok(outcome),
                Err(err)
                    if handler.retries_on_conflict() && self.retry.should_retry(attempt, &err) =>
                {
                    debug!("{}: {} lost a write race, retrying", key, handler.name());
                }
                Err(err) => {
                    warn!("{} rejected: {}", handler.name(), err);
                    return Err(err);
                }
            }
        }
    }

    fn try_execute(
        &self,
        key: &AssetKey,
        handler: &dyn CommandHandler,
    ) -> Result<Outcome, OverrideError> {
        let current = self.store.get(key)?;

        if let Some(expected) = handler.expected_version() {
            if expected != current.version {
                return Err(OverrideError::Conflict {
                    asset: key.clone(),
                    expected,
                    current: current.version,
                });
            }
        }
        handler.validate(&current)?;

        let previous = current.resolve();
        let now = self.clock.now();
        let mut next = current.clone();
        let Some(action) = handler.apply(&mut next, now) else {
            return Ok(Outcome {
                asset: current,
                previous,
                resolved: previous,
                changed: false,
            });
        };

        let stored = self.store.put(next, current.version)?;
        let resolved = stored.resolve();

        let attribution = handler.attribution();
        let seq = self.audit.append(AuditRecord {
            asset: Some(key.clone()),
            action,
            previous: Some(previous),
            resolved: Some(resolved),
            actor: attribution.actor,
            reason: attribution.reason,
            timestamp: now,
        });
        debug!(
            "{}: {} v{} {} -> {} (audit #{})",
            key,
            handler.name(),
            stored.version,
            previous,
            resolved,
            seq
        );

        self.events.notify_record_change(&stored);
        if previous != resolved {
            self.events.notify_status_change(key, previous, resolved);
        }

        Ok(Outcome {
            asset: stored,
            previous,
            resolved,
            changed: true,
        })
    }

    /// Append a facility-level entry (policy activation or clear).
    pub(crate) fn record_policy(&self, action: AuditAction, actor: &str, reason: String) -> u64 {
        self.audit.append(AuditRecord {
            asset: None,
            action,
            previous: None,
            resolved: None,
            actor: actor.to_string(),
            reason,
            timestamp: self.clock.now(),
        })
    }
}
