// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for parkctl.
//!
//! Config is loaded from the `[parkctl]` section of `parkctl.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `$PARKCTL_CONFIG`
//! 3. `./parkctl.toml`
//! 4. `~/.config/parkctl/parkctl.toml`
//! 5. `/etc/parkctl/parkctl.toml`
//!
//! CLI arguments override config file values.

use serde::{Deserialize, Serialize};

use parkctl_app::ConfigFile;
use parkctl_audit_log::AuditLogConfig;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Fleet file location
    pub fleet: FleetConfig,
    /// Override engine tuning
    pub engine: EngineConfig,
    /// Audit file logging
    pub audit: AuditLogConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Staff identity recorded when `--actor` is not given
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// JSON file holding every provisioned asset
    pub path: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            path: "fleet.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts for sensor and emergency writes that lose a store race
    pub conflict_retries: u32,
    /// Capacity of the change event channel used by `feed`
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 3,
            event_buffer: 256,
        }
    }
}

impl CliConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        if let Some(actor) = &self.general.actor {
            if actor.trim().is_empty() {
                return Err("[general].actor must not be empty when set".to_string());
            }
        }
        if self.fleet.path.trim().is_empty() {
            return Err("[fleet].path must not be empty".to_string());
        }
        if self.engine.conflict_retries == 0 {
            return Err("[engine].conflict_retries must be > 0".to_string());
        }
        if self.engine.event_buffer == 0 {
            return Err("[engine].event_buffer must be > 0".to_string());
        }
        self.audit.validate()
    }

    /// Generate an example configuration as a TOML string.
    pub fn example_toml() -> String {
        #[derive(serde::Serialize)]
        struct Wrapper {
            parkctl: CliConfig,
        }
        let example = CliConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
                actor: Some("staff42".to_string()),
            },
            fleet: FleetConfig {
                path: "/var/lib/parkctl/fleet.json".to_string(),
            },
            engine: EngineConfig::default(),
            audit: AuditLogConfig {
                enabled: true,
                dir: "/var/lib/parkctl/audit".to_string(),
                ..AuditLogConfig::default()
            },
        };
        toml::to_string_pretty(&Wrapper { parkctl: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for CliConfig {
    const SECTION: &'static str = "parkctl";
}
