// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Global emergency mode state machine.
//!
//! The facility is either in `Normal` mode or under exactly one active
//! policy. Moving between two policies always goes through `Normal`.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::policies::EmergencyPolicy;

/// One run of `apply_policy`, identified by its activation tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyActivation {
    pub policy: EmergencyPolicy,
    pub activation: Uuid,
    pub actor: String,
    pub activated_at: DateTime<Utc>,
}

/// Events that can trigger mode transitions.
#[derive(Debug, Clone)]
pub enum EmergencyEvent {
    /// A policy was applied.
    Activated(PolicyActivation),
    /// The active policy was cleared from every asset it held.
    Cleared,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "data", rename_all = "snake_case")]
pub enum EmergencyMode {
    #[default]
    Normal,
    Warning(PolicyActivation),
    /// Entered through the `disable` policy.
    Critical(PolicyActivation),
    Lockdown(PolicyActivation),
    Evacuation(PolicyActivation),
}

impl fmt::Display for EmergencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl EmergencyMode {
    fn for_activation(activation: PolicyActivation) -> Self {
        match activation.policy {
            EmergencyPolicy::Warning => Self::Warning(activation),
            EmergencyPolicy::Disable => Self::Critical(activation),
            EmergencyPolicy::Lockdown => Self::Lockdown(activation),
            EmergencyPolicy::Evacuation => Self::Evacuation(activation),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning(_) => "warning",
            Self::Critical(_) => "critical",
            Self::Lockdown(_) => "lockdown",
            Self::Evacuation(_) => "evacuation",
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    pub fn activation(&self) -> Option<&PolicyActivation> {
        match self {
            Self::Normal => None,
            Self::Warning(a) | Self::Critical(a) | Self::Lockdown(a) | Self::Evacuation(a) => {
                Some(a)
            }
        }
    }

    pub fn policy(&self) -> Option<EmergencyPolicy> {
        self.activation().map(|a| a.policy)
    }
}

#[derive(Debug, Clone)]
pub struct EmergencyStateMachine {
    mode: EmergencyMode,
    transition_count: u64,
    last_transition: Option<Instant>,
}

impl Default for EmergencyStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyStateMachine {
    /// Create a new state machine in `Normal` mode.
    pub fn new() -> Self {
        Self {
            mode: EmergencyMode::Normal,
            transition_count: 0,
            last_transition: None,
        }
    }

    pub fn mode(&self) -> &EmergencyMode {
        &self.mode
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn time_in_mode(&self) -> Option<Duration> {
        self.last_transition.map(|t| t.elapsed())
    }

    /// Process an event and potentially transition to a new mode.
    /// Returns true if a transition occurred.
    pub fn process_event(&mut self, event: EmergencyEvent) -> bool {
        match self.next_mode(event) {
            Some(mode) => {
                self.enter(mode);
                true
            }
            None => false,
        }
    }

    fn next_mode(&self, event: EmergencyEvent) -> Option<EmergencyMode> {
        match (&self.mode, event) {
            (EmergencyMode::Normal, EmergencyEvent::Activated(activation)) => {
                Some(EmergencyMode::for_activation(activation))
            }
            // Another policy is active; it has to be cleared first.
            (_, EmergencyEvent::Activated(_)) => None,
            (EmergencyMode::Normal, EmergencyEvent::Cleared) => None,
            (_, EmergencyEvent::Cleared) => Some(EmergencyMode::Normal),
        }
    }

    /// Force the mode, used when rebuilding it from stored overrides.
    pub(crate) fn restore(&mut self, activation: PolicyActivation) {
        self.enter(EmergencyMode::for_activation(activation));
    }

    fn enter(&mut self, mode: EmergencyMode) {
        self.mode = mode;
        self.transition_count += 1;
        self.last_transition = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activation(policy: EmergencyPolicy) -> PolicyActivation {
        PolicyActivation {
            policy,
            activation: Uuid::new_v4(),
            actor: "ops1".to_string(),
            activated_at: Utc::now(),
        }
    }

    #[test]
    fn test_initial_mode() {
        let sm = EmergencyStateMachine::new();
        assert!(sm.mode().is_normal());
        assert_eq!(sm.transition_count(), 0);
    }

    #[test]
    fn test_policy_modes() {
        let cases = [
            (EmergencyPolicy::Warning, "warning"),
            (EmergencyPolicy::Disable, "critical"),
            (EmergencyPolicy::Lockdown, "lockdown"),
            (EmergencyPolicy::Evacuation, "evacuation"),
        ];
        for (policy, name) in cases {
            let mut sm = EmergencyStateMachine::new();
            assert!(sm.process_event(EmergencyEvent::Activated(activation(policy))));
            assert_eq!(sm.mode().name(), name);
            assert_eq!(sm.mode().policy(), Some(policy));

            assert!(sm.process_event(EmergencyEvent::Cleared));
            assert!(sm.mode().is_normal());
            assert_eq!(sm.transition_count(), 2);
        }
    }

    #[test]
    fn test_no_direct_policy_switch() {
        let mut sm = EmergencyStateMachine::new();
        sm.process_event(EmergencyEvent::Activated(activation(
            EmergencyPolicy::Lockdown,
        )));

        let switched = sm.process_event(EmergencyEvent::Activated(activation(
            EmergencyPolicy::Evacuation,
        )));
        assert!(!switched);
        assert_eq!(sm.mode().name(), "lockdown");
    }

    #[test]
    fn test_clear_in_normal_is_ignored() {
        let mut sm = EmergencyStateMachine::new();
        assert!(!sm.process_event(EmergencyEvent::Cleared));
        assert!(sm.time_in_mode().is_none());
    }
}
