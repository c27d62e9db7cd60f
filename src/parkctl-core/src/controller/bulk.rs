// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Best-effort multi-asset operations.
//!
//! Each target goes through the same single-asset path as a direct call, so
//! a failure on one asset neither blocks nor rolls back the others. There is
//! no batch-level atomicity: the report is the only source of truth.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::asset::resolve::ResolvedStatus;
use crate::asset::status::Status;
use crate::asset::{Asset, AssetKey};
use crate::error::{OverrideError, PartialBatchFailure};

use super::handlers::Command;
use super::manager::OverrideManager;

/// One asset to act on, pinned to the version the caller saw when selecting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTarget {
    pub asset: AssetKey,
    pub expected_version: u64,
}

impl BulkTarget {
    pub fn new(asset: AssetKey, expected_version: u64) -> Self {
        Self {
            asset,
            expected_version,
        }
    }
}

impl From<&Asset> for BulkTarget {
    fn from(asset: &Asset) -> Self {
        Self::new(asset.key(), asset.version)
    }
}

/// The command applied to every target of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BulkCommand {
    SetManualOverride {
        status: Status,
        reason: String,
        actor: String,
    },
    ClearManualOverride {
        actor: String,
    },
    UpdateSensedStatus {
        status: Status,
    },
    SetActive {
        active: bool,
        actor: String,
    },
}

impl BulkCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BulkCommand::SetManualOverride { .. } => "set_manual_override",
            BulkCommand::ClearManualOverride { .. } => "clear_manual_override",
            BulkCommand::UpdateSensedStatus { .. } => "update_sensed_status",
            BulkCommand::SetActive { .. } => "set_active",
        }
    }

    /// Specialize for one target.
    pub fn for_target(&self, expected_version: u64) -> Command {
        match self.clone() {
            BulkCommand::SetManualOverride {
                status,
                reason,
                actor,
            } => Command::SetManualOverride {
                status,
                reason,
                actor,
                expected_version,
            },
            BulkCommand::ClearManualOverride { actor } => Command::ClearManualOverride {
                actor,
                expected_version,
            },
            // Sensor reports carry no caller version.
            BulkCommand::UpdateSensedStatus { status } => Command::UpdateSensedStatus { status },
            BulkCommand::SetActive { active, actor } => Command::SetActive {
                active,
                actor,
                expected_version,
            },
        }
    }
}

/// Result for one requested target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub asset: AssetKey,
    pub result: Result<ResolvedStatus, OverrideError>,
}

/// Per-asset results of a batch, in request order.
#[must_use = "a batch may have partially failed; inspect the report or call check()"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub operation: String,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            items: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, asset: AssetKey, result: Result<ResolvedStatus, OverrideError>) {
        self.items.push(BatchItem { asset, result });
    }

    pub fn attempted(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|item| item.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&AssetKey, &OverrideError)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().err().map(|err| (&item.asset, err)))
    }

    /// Turn any per-asset failure into a [`PartialBatchFailure`].
    pub fn check(&self) -> Result<(), PartialBatchFailure> {
        if self.is_success() {
            return Ok(());
        }
        Err(PartialBatchFailure {
            operation: self.operation.clone(),
            attempted: self.attempted(),
            failures: self
                .failures()
                .map(|(asset, err)| (asset.clone(), err.clone()))
                .collect(),
        })
    }
}

/// Fans one command out over many assets.
pub struct BulkCoordinator {
    manager: Arc<OverrideManager>,
}

impl BulkCoordinator {
    pub fn new(manager: Arc<OverrideManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<OverrideManager> {
        &self.manager
    }

    /// Attempt `command` on every target independently.
    ///
    /// Exactly one item is reported per target, duplicates included.
    pub fn bulk_apply<I, T>(&self, targets: I, command: &BulkCommand) -> BatchReport
    where
        I: IntoIterator<Item = T>,
        T: Into<BulkTarget>,
    {
        let mut report = BatchReport::new(command.name());
        for target in targets {
            let target = target.into();
            let cmd = command.for_target(target.expected_version);
            let result = self
                .manager
                .execute(&target.asset, cmd)
                .map(|outcome| outcome.resolved);
            report.push(target.asset, result);
        }

        if report.is_success() {
            info!("{}: {} assets updated", report.operation, report.attempted());
        } else {
            warn!(
                "{}: {} of {} assets failed",
                report.operation,
                report.failed(),
                report.attempted()
            );
        }
        self.manager.events().notify_batch_complete(&report);
        report
    }
}
