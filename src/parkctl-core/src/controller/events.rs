// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Change notification.
//!
//! Listeners are told about every committed write after the store and the
//! audit log have taken it, so a listener never observes a change that
//! could still be rolled back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::asset::resolve::ResolvedStatus;
use crate::asset::{Asset, AssetKey};

use super::bulk::BatchReport;
use super::machine::EmergencyMode;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Trait for components that want to hear about asset changes.
///
/// All methods have default no-op implementations, so listeners can
/// selectively override only the events they care about.
pub trait AssetListener: Send + Sync {
    /// Called when the resolved status of an asset changes.
    fn on_status_change(&self, _asset: &AssetKey, _old: ResolvedStatus, _new: ResolvedStatus) {}

    /// Called after any committed write, including ones that leave the
    /// resolved status alone.
    fn on_record_change(&self, _asset: &Asset) {}

    /// Called when the facility emergency mode transitions.
    fn on_mode_change(&self, _old: &EmergencyMode, _new: &EmergencyMode) {}

    /// Called when a bulk or policy run finishes.
    fn on_batch_complete(&self, _report: &BatchReport) {}
}

/// Manages registered listeners and dispatches events.
pub struct EventEmitter {
    listeners: Vec<(ListenerId, Arc<dyn AssetListener>)>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register a listener to receive events.
    /// Returns an ID that can be used to unregister the listener.
    pub fn register(&mut self, listener: Arc<dyn AssetListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify_status_change(&self, asset: &AssetKey, old: ResolvedStatus, new: ResolvedStatus) {
        for (_, listener) in &self.listeners {
            listener.on_status_change(asset, old, new);
        }
    }

    pub fn notify_record_change(&self, asset: &Asset) {
        for (_, listener) in &self.listeners {
            listener.on_record_change(asset);
        }
    }

    pub fn notify_mode_change(&self, old: &EmergencyMode, new: &EmergencyMode) {
        for (_, listener) in &self.listeners {
            listener.on_mode_change(old, new);
        }
    }

    pub fn notify_batch_complete(&self, report: &BatchReport) {
        for (_, listener) in &self.listeners {
            listener.on_batch_complete(report);
        }
    }
}

/// Owned form of a notification, for shipping across tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    StatusChanged {
        asset: AssetKey,
        old: ResolvedStatus,
        new: ResolvedStatus,
    },
    ModeChanged {
        old: EmergencyMode,
        new: EmergencyMode,
    },
    BatchCompleted {
        operation: String,
        attempted: usize,
        failed: usize,
    },
}

/// Forwards status, mode and batch notifications onto a tokio broadcast
/// channel. Lagging or absent receivers never block the engine.
#[derive(Debug, Clone)]
pub struct BroadcastListener {
    tx: broadcast::Sender<ChangeEvent>,
}

impl BroadcastListener {
    pub fn channel(capacity: usize) -> (Self, broadcast::Receiver<ChangeEvent>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: ChangeEvent) {
        // No receivers is not an error for the engine.
        let _ = self.tx.send(event);
    }
}

impl AssetListener for BroadcastListener {
    fn on_status_change(&self, asset: &AssetKey, old: ResolvedStatus, new: ResolvedStatus) {
        self.send(ChangeEvent::StatusChanged {
            asset: asset.clone(),
            old,
            new,
        });
    }

    fn on_mode_change(&self, old: &EmergencyMode, new: &EmergencyMode) {
        self.send(ChangeEvent::ModeChanged {
            old: old.clone(),
            new: new.clone(),
        });
    }

    fn on_batch_complete(&self, report: &BatchReport) {
        self.send(ChangeEvent::BatchCompleted {
            operation: report.operation.clone(),
            attempted: report.attempted(),
            failed: report.failed(),
        });
    }
}
