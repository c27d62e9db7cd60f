// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::{info, warn};

use parkctl_core::controller::{AssetListener, BatchReport, EmergencyMode};
use parkctl_core::{AssetKey, ResolvedStatus};

/// Logs every resolved status change and mode transition.
pub struct ConsoleListener;

impl AssetListener for ConsoleListener {
    fn on_status_change(&self, asset: &AssetKey, old: ResolvedStatus, new: ResolvedStatus) {
        info!("{}: {} -> {}", asset, old, new);
    }

    fn on_mode_change(&self, old: &EmergencyMode, new: &EmergencyMode) {
        info!("Facility mode {} -> {}", old, new);
    }

    fn on_batch_complete(&self, report: &BatchReport) {
        for (asset, err) in report.failures() {
            warn!("{}: {}: {}", report.operation, asset, err);
        }
    }
}
