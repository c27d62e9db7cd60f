// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! End-to-end behavior across manager, bulk coordinator and broadcaster.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use crate::asset::resolve::{ControlSource, ResolvedStatus};
use crate::asset::status::Status;
use crate::asset::{Asset, AssetKey, AssetKind};
use crate::audit::{AuditAction, MemoryAuditLog};
use crate::clock::ManualClock;
use crate::controller::{
    BulkCommand, BulkCoordinator, BulkTarget, EmergencyBroadcaster, EmergencyPolicy,
    OverrideManager, EMERGENCY_EXIT_GROUP, MAIN_ENTRY_GROUP,
};
use crate::error::OverrideError;
use crate::store::{AssetStore, MemoryStore};

struct Facility {
    store: Arc<MemoryStore>,
    audit: Arc<MemoryAuditLog>,
    clock: Arc<ManualClock>,
    manager: Arc<OverrideManager>,
    bulk: BulkCoordinator,
    emergency: EmergencyBroadcaster,
}

fn facility() -> Facility {
    let assets = [
        (AssetKind::Slot, "E-12", "E", Status::Occupied),
        (AssetKind::Slot, "E-13", "E", Status::Available),
        (AssetKind::Slot, "E-14", "E", Status::Available),
        (AssetKind::Bollard, "B-MAIN", MAIN_ENTRY_GROUP, Status::Lowered),
        (AssetKind::Bollard, "B-EXIT", EMERGENCY_EXIT_GROUP, Status::Raised),
        (AssetKind::Bollard, "B-A", "A", Status::Lowered),
        (AssetKind::Door, "D-A", "A", Status::Open),
        (AssetKind::Door, "D-LOBBY", "lobby", Status::Locked),
        (AssetKind::Door, "D-EXIT", EMERGENCY_EXIT_GROUP, Status::Closed),
        (AssetKind::Machine, "M-IN", "entry", Status::Normal),
        (AssetKind::Machine, "M-OUT", "exit", Status::Closed),
    ];
    let store = Arc::new(
        MemoryStore::from_assets(
            assets
                .into_iter()
                .map(|(kind, id, group, sensed)| Asset::provision(kind, id, group, sensed).unwrap()),
        )
        .unwrap(),
    );
    let audit = Arc::new(MemoryAuditLog::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
    ));
    let manager = Arc::new(
        OverrideManager::new(store.clone(), audit.clone()).with_clock(clock.clone()),
    );
    Facility {
        bulk: BulkCoordinator::new(manager.clone()),
        emergency: EmergencyBroadcaster::new(manager.clone()),
        store,
        audit,
        clock,
        manager,
    }
}

fn resolved_all(store: &MemoryStore) -> BTreeMap<AssetKey, ResolvedStatus> {
    store
        .list()
        .unwrap()
        .iter()
        .map(|asset| (asset.key(), asset.resolve()))
        .collect()
}

fn all(_: &Asset) -> bool {
    true
}

#[test]
fn test_slot_e12_fault_through_lockdown() {
    let f = facility();
    let key = AssetKey::slot("E-12");

    let asset = f.manager.get(&key).unwrap();
    assert_eq!(asset.resolve().status, Status::Occupied);
    assert_eq!(asset.resolve().source, ControlSource::Sensor);

    let set = f
        .manager
        .set_manual_override(&key, Status::Available, "sensor fault", "staff42", asset.version)
        .unwrap();
    assert_eq!(
        set.resolved,
        ResolvedStatus {
            status: Status::Available,
            source: ControlSource::Manual
        }
    );

    // Lockdown forces nothing on slots.
    let report = f
        .emergency
        .apply_policy(EmergencyPolicy::Lockdown, "ops1", all)
        .unwrap();
    assert!(report.is_success());
    assert!(report.items.iter().all(|item| item.asset != key));
    assert_eq!(f.manager.resolved(&key).unwrap(), set.resolved);

    f.clock.advance(Duration::minutes(20));
    let cleared = f
        .manager
        .clear_manual_override(&key, "staff42", set.asset.version)
        .unwrap();
    assert_eq!(cleared.asset.version, set.asset.version + 1);
    assert_eq!(
        cleared.resolved,
        ResolvedStatus {
            status: Status::Occupied,
            source: ControlSource::Sensor
        }
    );

    let history: Vec<_> = f
        .audit
        .for_asset(&key)
        .into_iter()
        .map(|entry| entry.record.action)
        .collect();
    assert_eq!(history, vec![AuditAction::ManualSet, AuditAction::ManualCleared]);
}

#[test]
fn test_lockdown_raises_bollards_and_closes_doors() {
    let f = facility();
    let _ = f
        .emergency
        .apply_policy(EmergencyPolicy::Lockdown, "ops1", all)
        .unwrap();

    for asset in f.store.list().unwrap() {
        let resolved = asset.resolve();
        match asset.kind {
            AssetKind::Bollard => assert_eq!(resolved.status, Status::Raised, "{}", asset.id),
            AssetKind::Door if asset.group != EMERGENCY_EXIT_GROUP => {
                assert_eq!(resolved.status, Status::Closed, "{}", asset.id)
            }
            _ => assert_ne!(resolved.source, ControlSource::Emergency, "{}", asset.id),
        }
    }
}

#[test]
fn test_evacuation_opens_egress() {
    let f = facility();
    let _ = f
        .emergency
        .apply_policy(EmergencyPolicy::Evacuation, "ops1", all)
        .unwrap();

    let status = |key: AssetKey| f.manager.resolved(&key).unwrap().status;
    assert_eq!(status(AssetKey::bollard("B-EXIT")), Status::Lowered);
    assert_eq!(status(AssetKey::bollard("B-MAIN")), Status::Lowered);
    assert_eq!(status(AssetKey::door("D-LOBBY")), Status::Open);
    assert_eq!(status(AssetKey::door("D-EXIT")), Status::Open);
    assert_eq!(status(AssetKey::machine("M-OUT")), Status::FreePass);
    assert_eq!(
        f.manager.resolved(&AssetKey::bollard("B-A")).unwrap().source,
        ControlSource::Sensor
    );
}

#[test]
fn test_apply_then_clear_restores_everything() {
    for policy in EmergencyPolicy::ALL {
        let f = facility();
        let _ = f
            .manager
            .set_manual_override(&AssetKey::door("D-A"), Status::Locked, "cleaning", "staff7", 0)
            .unwrap();
        let before = resolved_all(&f.store);

        let applied = f.emergency.apply_policy(policy, "ops1", all).unwrap();
        assert!(applied.is_success(), "{policy}");
        let cleared = f.emergency.clear_policy("ops1").unwrap();
        assert!(cleared.is_success(), "{policy}");
        assert_eq!(cleared.attempted(), applied.attempted(), "{policy}");

        assert_eq!(resolved_all(&f.store), before, "{policy}");
        assert!(f.emergency.mode().is_normal());
    }
}

#[test]
fn test_manual_staged_during_lockdown_surfaces_after_clear() {
    let f = facility();
    let key = AssetKey::bollard("B-A");
    let _ = f
        .emergency
        .apply_policy(EmergencyPolicy::Lockdown, "ops1", all)
        .unwrap();

    let version = f.manager.get(&key).unwrap().version;
    let staged = f
        .manager
        .set_manual_override(&key, Status::Lowered, "delivery at 10:00", "staff42", version)
        .unwrap();
    assert_eq!(staged.resolved.status, Status::Raised);
    assert_eq!(staged.resolved.source, ControlSource::Emergency);

    let _ = f.emergency.clear_policy("ops1").unwrap();
    let resolved = f.manager.resolved(&key).unwrap();
    assert_eq!(resolved.status, Status::Lowered);
    assert_eq!(resolved.source, ControlSource::Manual);
}

#[test]
fn test_clear_manual_under_emergency_reveals_emergency_status() {
    let f = facility();
    let key = AssetKey::bollard("B-A");
    let set = f
        .manager
        .set_manual_override(&key, Status::Lowered, "delivery", "staff42", 0)
        .unwrap();
    let _ = f
        .emergency
        .apply_policy(EmergencyPolicy::Lockdown, "ops1", all)
        .unwrap();

    let version = f.manager.get(&key).unwrap().version;
    assert_eq!(version, set.asset.version + 1);
    let cleared = f
        .manager
        .clear_manual_override(&key, "staff42", version)
        .unwrap();
    assert_eq!(
        cleared.resolved,
        ResolvedStatus {
            status: Status::Raised,
            source: ControlSource::Emergency
        }
    );
    assert!(cleared.asset.manual_override.is_none());

    // Nothing manual left to fall back to.
    let _ = f.emergency.clear_policy("ops1").unwrap();
    assert_eq!(
        f.manager.resolved(&key).unwrap(),
        ResolvedStatus {
            status: Status::Lowered,
            source: ControlSource::Sensor
        }
    );
}

#[test]
fn test_clear_manual_rejected_on_inactive_asset() {
    let f = facility();
    let key = AssetKey::slot("E-13");
    let _ = f
        .manager
        .set_manual_override(&key, Status::Reserved, "vip", "staff42", 0)
        .unwrap();
    let _ = f.manager.set_active(&key, false, "staff42", 1).unwrap();
    let before = f.store.get(&key).unwrap();
    let audited = f.audit.len();

    let err = f
        .manager
        .clear_manual_override(&key, "staff42", before.version)
        .unwrap_err();
    assert_eq!(err, OverrideError::InactiveAsset { asset: key.clone() });
    assert_eq!(f.store.get(&key).unwrap(), before);
    assert_eq!(f.audit.len(), audited);
}

#[test]
fn test_stale_version_leaves_record_untouched() {
    let f = facility();
    let key = AssetKey::slot("E-13");
    let _ = f
        .manager
        .set_manual_override(&key, Status::Reserved, "vip", "staff42", 0)
        .unwrap();

    let before = serde_json::to_vec(&f.store.get(&key).unwrap()).unwrap();
    let audited = f.audit.len();

    let err = f
        .manager
        .set_manual_override(&key, Status::Disabled, "late", "staff9", 0)
        .unwrap_err();
    assert_eq!(
        err,
        OverrideError::Conflict {
            asset: key.clone(),
            expected: 0,
            current: 1
        }
    );

    let after = serde_json::to_vec(&f.store.get(&key).unwrap()).unwrap();
    assert_eq!(before, after);
    assert_eq!(f.audit.len(), audited);
}

#[test]
fn test_bulk_with_one_inactive_asset() {
    let f = facility();
    let _ = f
        .manager
        .set_active(&AssetKey::slot("E-13"), false, "staff42", 0)
        .unwrap();

    let targets = ["E-12", "E-13", "E-14"]
        .map(|id| BulkTarget::from(&f.store.get(&AssetKey::slot(id)).unwrap()));
    let cmd = BulkCommand::SetManualOverride {
        status: Status::Reserved,
        reason: "event parking".to_string(),
        actor: "staff42".to_string(),
    };
    let report = f.bulk.bulk_apply(targets, &cmd);

    assert_eq!(report.attempted(), 3);
    let failure = report.check().unwrap_err();
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].0, AssetKey::slot("E-13"));
    assert!(matches!(
        failure.failures[0].1,
        OverrideError::InactiveAsset { .. }
    ));

    for id in ["E-12", "E-14"] {
        let stored = f.store.get(&AssetKey::slot(id)).unwrap();
        assert_eq!(stored.resolve().status, Status::Reserved);
        assert_eq!(stored.version, 1);
    }
    assert_eq!(
        f.store.get(&AssetKey::slot("E-13")).unwrap().manual_override,
        None
    );
}

#[test]
fn test_deactivated_asset_fails_policy_but_others_hold() {
    let f = facility();
    let _ = f
        .manager
        .set_active(&AssetKey::door("D-LOBBY"), false, "staff42", 0)
        .unwrap();

    let report = f
        .emergency
        .apply_policy(EmergencyPolicy::Lockdown, "ops1", all)
        .unwrap();
    assert_eq!(report.failed(), 1);
    assert_eq!(
        f.manager.resolved(&AssetKey::door("D-A")).unwrap().status,
        Status::Closed
    );

    // Reactivate and re-run the same policy to pick up the straggler.
    let _ = f
        .manager
        .set_active(&AssetKey::door("D-LOBBY"), true, "staff42", 1)
        .unwrap();
    let report = f
        .emergency
        .apply_policy(EmergencyPolicy::Lockdown, "ops1", all)
        .unwrap();
    assert!(report.is_success());
    assert_eq!(
        f.manager.resolved(&AssetKey::door("D-LOBBY")).unwrap().status,
        Status::Closed
    );
}

#[test]
fn test_clear_reaches_assets_deactivated_mid_emergency() {
    let f = facility();
    let _ = f
        .emergency
        .apply_policy(EmergencyPolicy::Disable, "ops1", all)
        .unwrap();
    let key = AssetKey::machine("M-IN");
    let version = f.manager.get(&key).unwrap().version;
    let _ = f.manager.set_active(&key, false, "staff42", version).unwrap();

    let report = f.emergency.clear_policy("ops1").unwrap();
    assert!(report.is_success());
    let stored = f.store.get(&key).unwrap();
    assert!(stored.emergency_override.is_none());
    assert!(!stored.active);
}

#[test]
fn test_policy_audit_trail() {
    let f = facility();
    let applied = f
        .emergency
        .apply_policy(EmergencyPolicy::Lockdown, "ops1", all)
        .unwrap();
    let activation = f.emergency.mode().activation().unwrap().activation.to_string();
    let _ = f.emergency.clear_policy("ops2").unwrap();

    let entries = f.audit.entries();
    // One facility entry per apply and clear, one per asset each way.
    assert_eq!(entries.len(), 2 + 2 * applied.attempted());
    assert_eq!(entries[0].record.action, AuditAction::PolicyActivated);
    assert_eq!(entries[0].record.asset, None);
    assert_eq!(entries[0].record.actor, "ops1");

    assert!(entries[1..=applied.attempted()].iter().all(|entry| {
        entry.record.action == AuditAction::EmergencySet
            && entry.record.actor == "lockdown"
            && entry.record.reason == activation
    }));
    assert_eq!(
        entries.last().unwrap().record.action,
        AuditAction::PolicyCleared
    );
    assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
}
