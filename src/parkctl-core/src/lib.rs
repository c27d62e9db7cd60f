// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod asset;
pub mod audit;
pub mod clock;
pub mod controller;
pub mod error;
pub mod store;

#[cfg(test)]
mod scenarios;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use asset::resolve::{resolve, ControlSource, ResolvedStatus};
pub use asset::status::Status;
pub use asset::{Asset, AssetKey, AssetKind};
pub use audit::{AuditAction, AuditEntry, AuditRecord, AuditSink, MemoryAuditLog};
pub use controller::{
    BatchReport, BulkCommand, BulkCoordinator, BulkTarget, EmergencyBroadcaster, EmergencyMode,
    EmergencyPolicy, Outcome, OverrideManager,
};
pub use error::{OverrideError, ParseError, PartialBatchFailure};
pub use store::{AssetStore, MemoryStore, StoreError};
