// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Append-only change log.
//!
//! Sinks assign sequence numbers; entries are never rewritten or removed by
//! the engine. Retention is up to whoever owns the sink.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::resolve::ResolvedStatus;
use crate::asset::AssetKey;

/// What kind of mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ManualSet,
    ManualCleared,
    SensorUpdated,
    Activated,
    Deactivated,
    EmergencySet,
    EmergencyCleared,
    PolicyActivated,
    PolicyCleared,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ManualSet => "manual_set",
            AuditAction::ManualCleared => "manual_cleared",
            AuditAction::SensorUpdated => "sensor_updated",
            AuditAction::Activated => "activated",
            AuditAction::Deactivated => "deactivated",
            AuditAction::EmergencySet => "emergency_set",
            AuditAction::EmergencyCleared => "emergency_cleared",
            AuditAction::PolicyActivated => "policy_activated",
            AuditAction::PolicyCleared => "policy_cleared",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry before the sink has sequenced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// `None` for policy-level entries.
    pub asset: Option<AssetKey>,
    pub action: AuditAction,
    pub previous: Option<ResolvedStatus>,
    pub resolved: Option<ResolvedStatus>,
    /// Staff actor, `sensor`, or the policy name for emergency entries.
    pub actor: String,
    /// Staff reason, or the policy activation tag for emergency entries.
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    #[serde(flatten)]
    pub record: AuditRecord,
}

/// Destination for audit entries.
pub trait AuditSink: Send + Sync {
    /// Append one entry and return its sequence number.
    fn append(&self, record: AuditRecord) -> u64;
}

/// Audit log held in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn for_asset(&self, asset: &AssetKey) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.record.asset.as_ref() == Some(asset))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, record: AuditRecord) -> u64 {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let seq = entries.len() as u64 + 1;
        entries.push(AuditEntry { seq, record });
        seq
    }
}

/// Fans each entry out to several sinks; the first sink's sequence wins.
#[derive(Default)]
pub struct AuditTee {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditTee {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for AuditTee {
    fn append(&self, record: AuditRecord) -> u64 {
        let mut first = None;
        for sink in &self.sinks {
            let seq = sink.append(record.clone());
            first.get_or_insert(seq);
        }
        first.unwrap_or(0)
    }
}
