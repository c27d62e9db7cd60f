// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Override control components.
//!
//! This module contains the single-asset override manager, the best-effort
//! bulk coordinator, the emergency broadcaster and its mode state machine,
//! command handlers, change events, and retry policies.

pub mod broadcaster;
pub mod bulk;
pub mod events;
pub mod handlers;
pub mod machine;
pub mod manager;
pub mod policies;
pub mod retry;

pub use broadcaster::EmergencyBroadcaster;
pub use bulk::{BatchItem, BatchReport, BulkCommand, BulkCoordinator, BulkTarget};
pub use events::{AssetListener, BroadcastListener, ChangeEvent, EventEmitter, ListenerId};
pub use handlers::{handler_for, Attribution, Command, CommandHandler};
pub use machine::{EmergencyEvent, EmergencyMode, EmergencyStateMachine, PolicyActivation};
pub use manager::{Outcome, OverrideManager};
pub use policies::{EmergencyPolicy, EMERGENCY_EXIT_GROUP, MAIN_ENTRY_GROUP};
pub use retry::{FixedAttempts, NoRetry, RetryPolicy};
