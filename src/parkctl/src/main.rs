// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod console;
mod feed;
mod fleet;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{debug, info};

use parkctl_app::{init_logging, normalize_group, ConfigFile};
use parkctl_audit_log::{read_dir_entries, JsonLinesAuditSink};
use parkctl_core::audit::{AuditSink, AuditTee};
use parkctl_core::controller::{BroadcastListener, ChangeEvent, FixedAttempts};
use parkctl_core::{
    Asset, AssetKey, AssetKind, AssetStore, BatchReport, BulkCommand, BulkCoordinator,
    BulkTarget, DynResult, EmergencyBroadcaster, EmergencyPolicy, MemoryAuditLog, MemoryStore,
    Outcome, OverrideManager, Status, StoreError,
};

use config::CliConfig;
use console::ConsoleListener;
use fleet::FleetFile;

const PKG_DESCRIPTION: &str =
    concat!(env!("CARGO_PKG_NAME"), " - parking asset override control");
/// Exit status when a batch or policy run partially failed.
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Fleet file (overrides [fleet].path)
    #[arg(long = "fleet", short = 'f', value_name = "FILE")]
    fleet: Option<PathBuf>,
    /// Staff identity recorded in the audit log (overrides [general].actor)
    #[arg(long = "actor", short = 'a')]
    actor: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List assets with their resolved status
    Show {
        /// Only assets in this group
        #[arg(long)]
        group: Option<String>,
        /// Print full records as JSON
        #[arg(long)]
        json: bool,
        /// Assets to show (default: all)
        assets: Vec<AssetKey>,
    },
    /// Add a new asset to the fleet
    Provision {
        kind: AssetKind,
        id: String,
        #[arg(long)]
        group: String,
        /// Initial sensed status
        #[arg(long)]
        sensed: Status,
    },
    /// Force a status on one asset
    SetManual {
        asset: AssetKey,
        status: Status,
        #[arg(long)]
        reason: String,
        /// Version the asset had when you last looked at it
        #[arg(long = "expect", value_name = "VERSION")]
        expected_version: u64,
    },
    /// Remove the manual override from one asset
    ClearManual {
        asset: AssetKey,
        #[arg(long = "expect", value_name = "VERSION")]
        expected_version: u64,
    },
    /// Record a sensor report
    Sense { asset: AssetKey, status: Status },
    /// Put an asset back into service
    Activate {
        asset: AssetKey,
        #[arg(long = "expect", value_name = "VERSION")]
        expected_version: u64,
    },
    /// Take an asset out of service
    Deactivate {
        asset: AssetKey,
        #[arg(long = "expect", value_name = "VERSION")]
        expected_version: u64,
    },
    /// Force a status on many assets, best effort
    BulkSet {
        status: Status,
        #[arg(long)]
        reason: String,
        /// Every asset in this group
        #[arg(long)]
        group: Option<String>,
        assets: Vec<AssetKey>,
    },
    /// Remove manual overrides from many assets, best effort
    BulkClear {
        #[arg(long)]
        group: Option<String>,
        assets: Vec<AssetKey>,
    },
    /// Facility-wide emergency policies
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Show recent audit entries from the audit log directory
    History {
        asset: Option<AssetKey>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Apply sensor reports from stdin, print change events as JSON lines
    Feed,
}

#[derive(Debug, Subcommand)]
enum PolicyAction {
    /// Activate a policy (warning, disable, lockdown, evacuation)
    Apply {
        policy: EmergencyPolicy,
        /// Restrict the policy to one group
        #[arg(long)]
        group: Option<String>,
    },
    /// Clear the active policy
    Clear,
    /// Show the facility mode
    Status,
}

struct Engine {
    store: Arc<MemoryStore>,
    manager: Arc<OverrideManager>,
    /// Entries written by this invocation.
    session: Arc<MemoryAuditLog>,
    /// Asset count when the fleet file was read.
    loaded: usize,
}

fn build_engine(
    cfg: &CliConfig,
    fleet_path: &Path,
    feed: Option<BroadcastListener>,
) -> DynResult<Engine> {
    let store = Arc::new(FleetFile::load(fleet_path)?.into_store()?);
    let loaded = store.len();

    let session = Arc::new(MemoryAuditLog::new());
    let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();
    // The file sink goes first so its persistent sequence numbers win.
    if let Some(file_sink) = JsonLinesAuditSink::from_config(&cfg.audit)? {
        info!("Audit log in {}", file_sink.base_dir().display());
        sinks.push(file_sink);
    }
    sinks.push(session.clone());

    let mut manager = OverrideManager::new(store.clone(), Arc::new(AuditTee::new(sinks)))
        .with_retry_policy(Arc::new(FixedAttempts::new(cfg.engine.conflict_retries)));
    manager.register_listener(Arc::new(ConsoleListener));
    if let Some(listener) = feed {
        manager.register_listener(Arc::new(listener));
    }

    Ok(Engine {
        store,
        manager: Arc::new(manager),
        session,
        loaded,
    })
}

fn require_actor(actor: Option<&str>) -> DynResult<String> {
    match actor.map(str::trim) {
        Some(actor) if !actor.is_empty() => Ok(actor.to_string()),
        _ => Err("No actor given. Use --actor or set [general].actor in config.".into()),
    }
}

fn print_outcome(key: &AssetKey, outcome: &Outcome) {
    let note = if outcome.changed { "" } else { " (unchanged)" };
    println!(
        "{} {} -> {} v{}{}",
        key, outcome.previous, outcome.resolved, outcome.asset.version, note
    );
}

fn print_asset(asset: &Asset) {
    let resolved = asset.resolve();
    let mut flags = Vec::new();
    if resolved.is_overridden() {
        flags.push("override");
    }
    if asset.manual_override.is_some() && asset.emergency_override.is_some() {
        flags.push("manual-staged");
    }
    if !asset.active {
        flags.push("inactive");
    }
    println!(
        "{:<24} {:<16} {:<15} {:<10} v{:<5} {}",
        asset.key().to_string(),
        asset.group,
        resolved.status.to_string(),
        resolved.source.to_string(),
        asset.version,
        flags.join(",")
    );
}

/// Print a batch and report whether it fully succeeded.
fn print_report(report: &BatchReport) -> bool {
    for item in &report.items {
        match &item.result {
            Ok(resolved) => println!("  {:<24} {}", item.asset.to_string(), resolved),
            Err(e) => println!("  {:<24} FAILED: {}", item.asset.to_string(), e),
        }
    }
    match report.check() {
        Ok(()) => {
            println!("{}: {} assets", report.operation, report.attempted());
            true
        }
        Err(failure) => {
            eprintln!("{}", failure);
            false
        }
    }
}

/// Pin every selected asset to the version read while selecting it.
fn bulk_targets(
    store: &MemoryStore,
    group: Option<&str>,
    assets: Vec<AssetKey>,
) -> DynResult<Vec<BulkTarget>> {
    let mut targets = Vec::new();
    for key in assets {
        match store.get(&key) {
            Ok(asset) => targets.push(BulkTarget::from(&asset)),
            // Still attempted so the report names it.
            Err(StoreError::NotFound { .. }) => targets.push(BulkTarget::new(key, 0)),
            Err(e) => return Err(e.into()),
        }
    }
    if let Some(group) = group {
        let group = normalize_group(group);
        targets.extend(store.list_by_group(&group)?.iter().map(BulkTarget::from));
    }
    if targets.is_empty() {
        return Err("No assets selected. Name assets or use --group.".into());
    }
    Ok(targets)
}

fn recovered_broadcaster(engine: &Engine) -> DynResult<EmergencyBroadcaster> {
    let broadcaster = EmergencyBroadcaster::new(engine.manager.clone());
    if let Some(active) = broadcaster.recover()? {
        debug!("Active policy {} since {}", active.policy, active.activated_at);
    }
    Ok(broadcaster)
}

/// Run one command. Returns false when a batch partially failed.
async fn dispatch(
    command: Commands,
    cfg: &CliConfig,
    engine: &Engine,
    actor: Option<&str>,
    feed_events: Option<broadcast::Receiver<ChangeEvent>>,
) -> DynResult<bool> {
    let manager = &engine.manager;
    match command {
        Commands::Show {
            group,
            json,
            assets,
        } => {
            let mut selected = match group {
                Some(group) => engine.store.list_by_group(&normalize_group(&group))?,
                None => engine.store.list()?,
            };
            if !assets.is_empty() {
                selected.retain(|asset| assets.contains(&asset.key()));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&selected)?);
            } else {
                let broadcaster = recovered_broadcaster(engine)?;
                println!("mode: {}", broadcaster.mode());
                for asset in &selected {
                    print_asset(asset);
                }
            }
        }
        Commands::Provision {
            kind,
            id,
            group,
            sensed,
        } => {
            let asset = Asset::provision(kind, id, normalize_group(&group), sensed)?;
            let key = asset.key();
            engine.store.insert(asset)?;
            println!("{} provisioned", key);
        }
        Commands::SetManual {
            asset,
            status,
            reason,
            expected_version,
        } => {
            let actor = require_actor(actor)?;
            let outcome =
                manager.set_manual_override(&asset, status, &reason, &actor, expected_version)?;
            print_outcome(&asset, &outcome);
        }
        Commands::ClearManual {
            asset,
            expected_version,
        } => {
            let actor = require_actor(actor)?;
            let outcome = manager.clear_manual_override(&asset, &actor, expected_version)?;
            print_outcome(&asset, &outcome);
        }
        Commands::Sense { asset, status } => {
            let outcome = manager.update_sensed_status(&asset, status)?;
            print_outcome(&asset, &outcome);
        }
        Commands::Activate {
            asset,
            expected_version,
        } => {
            let actor = require_actor(actor)?;
            let outcome = manager.set_active(&asset, true, &actor, expected_version)?;
            print_outcome(&asset, &outcome);
        }
        Commands::Deactivate {
            asset,
            expected_version,
        } => {
            let actor = require_actor(actor)?;
            let outcome = manager.set_active(&asset, false, &actor, expected_version)?;
            print_outcome(&asset, &outcome);
        }
        Commands::BulkSet {
            status,
            reason,
            group,
            assets,
        } => {
            let actor = require_actor(actor)?;
            let targets = bulk_targets(&engine.store, group.as_deref(), assets)?;
            let command = BulkCommand::SetManualOverride {
                status,
                reason,
                actor,
            };
            let report = BulkCoordinator::new(manager.clone()).bulk_apply(targets, &command);
            return Ok(print_report(&report));
        }
        Commands::BulkClear { group, assets } => {
            let actor = require_actor(actor)?;
            let targets = bulk_targets(&engine.store, group.as_deref(), assets)?;
            let command = BulkCommand::ClearManualOverride { actor };
            let report = BulkCoordinator::new(manager.clone()).bulk_apply(targets, &command);
            return Ok(print_report(&report));
        }
        Commands::Policy { action } => {
            let broadcaster = recovered_broadcaster(engine)?;
            match action {
                PolicyAction::Apply { policy, group } => {
                    let actor = require_actor(actor)?;
                    let group = group.map(|g| normalize_group(&g));
                    let report = broadcaster.apply_policy(policy, &actor, |asset: &Asset| {
                        group.as_deref().map_or(true, |g| asset.group == g)
                    })?;
                    println!("mode: {}", broadcaster.mode());
                    return Ok(print_report(&report));
                }
                PolicyAction::Clear => {
                    let actor = require_actor(actor)?;
                    let report = broadcaster.clear_policy(&actor)?;
                    println!("mode: {}", broadcaster.mode());
                    return Ok(print_report(&report));
                }
                PolicyAction::Status => match broadcaster.mode().activation() {
                    Some(active) => println!(
                        "mode: {} (policy {}, activation {}, by {} at {})",
                        broadcaster.mode(),
                        active.policy,
                        active.activation,
                        active.actor,
                        active.activated_at.to_rfc3339()
                    ),
                    None => println!("mode: {}", broadcaster.mode()),
                },
            }
        }
        Commands::History { asset, limit } => print_history(cfg, asset, limit)?,
        Commands::Feed => {
            let Some(events) = feed_events else {
                return Err("feed started without an event channel".into());
            };
            let stdin = BufReader::new(tokio::io::stdin());
            let stats = feed::run_feed(manager.clone(), events, stdin, tokio::io::stdout()).await?;
            info!(
                "Feed done: {} applied, {} unchanged, {} rejected",
                stats.applied, stats.unchanged, stats.rejected
            );
        }
    }
    Ok(true)
}

fn print_history(cfg: &CliConfig, asset: Option<AssetKey>, limit: usize) -> DynResult<()> {
    if !cfg.audit.enabled {
        return Err("Audit file logging is disabled. Set [audit].enabled in config.".into());
    }
    let entries = read_dir_entries(Path::new(cfg.audit.dir.trim()))?;
    let selected: Vec<_> = entries
        .iter()
        .filter(|entry| asset.is_none() || entry.record.asset == asset)
        .collect();
    for entry in &selected[selected.len().saturating_sub(limit)..] {
        let record = &entry.record;
        let target = record
            .asset
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "facility".to_string());
        let change = match (&record.previous, &record.resolved) {
            (Some(previous), Some(resolved)) => format!("{} -> {}", previous, resolved),
            _ => String::new(),
        };
        println!(
            "#{:<6} {} {:<18} {:<24} {:<10} {} {}",
            entry.seq,
            record.timestamp.to_rfc3339(),
            record.action.as_str(),
            target,
            record.actor,
            change,
            record.reason
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", CliConfig::example_toml());
        return Ok(());
    }

    let (cfg, config_path) = CliConfig::load(cli.config.as_deref())?;
    cfg.validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let Some(command) = cli.command else {
        return Err("No command given. See --help.".into());
    };
    let fleet_path = cli
        .fleet
        .clone()
        .unwrap_or_else(|| PathBuf::from(cfg.fleet.path.trim()));
    let actor = cli.actor.as_deref().or(cfg.general.actor.as_deref());

    let (feed_listener, feed_events) = if matches!(command, Commands::Feed) {
        let (listener, events) = BroadcastListener::channel(cfg.engine.event_buffer);
        (Some(listener), Some(events))
    } else {
        (None, None)
    };

    let engine = build_engine(&cfg, &fleet_path, feed_listener)?;
    let ok = dispatch(command, &cfg, &engine, actor, feed_events).await?;
    save_if_changed(&engine, &fleet_path)?;

    if !ok {
        std::process::exit(EXIT_PARTIAL_FAILURE);
    }
    Ok(())
}

/// Write the fleet back when this invocation changed anything.
fn save_if_changed(engine: &Engine, fleet_path: &Path) -> DynResult<()> {
    if engine.session.is_empty() && engine.store.len() == engine.loaded {
        return Ok(());
    }
    FleetFile::from_store(&engine.store)?.save(fleet_path)?;
    debug!(
        "Saved {} assets to {} ({} audit entries)",
        engine.store.len(),
        fleet_path.display(),
        engine.session.len()
    );
    Ok(())
}
