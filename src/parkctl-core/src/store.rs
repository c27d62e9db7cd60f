// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Persistence port for asset records.
//!
//! Concurrency safety lives here rather than in the engine: every write is a
//! compare-and-swap on the record version, so exactly one writer wins a
//! given version and readers only ever see whole records.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::asset::{Asset, AssetKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{asset}: not found")]
    NotFound { asset: AssetKey },

    #[error("{asset}: version mismatch (expected {expected}, stored {stored})")]
    VersionMismatch {
        asset: AssetKey,
        expected: u64,
        stored: u64,
    },

    #[error("{asset}: already provisioned")]
    Duplicate { asset: AssetKey },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Versioned asset records behind get / put / list-by-group.
pub trait AssetStore: Send + Sync {
    fn get(&self, key: &AssetKey) -> Result<Asset, StoreError>;

    /// Write `asset` if the stored version still equals `expected_version`.
    ///
    /// The stored record gets version `expected_version + 1` regardless of
    /// what `asset.version` holds; the record as stored is returned.
    fn put(&self, asset: Asset, expected_version: u64) -> Result<Asset, StoreError>;

    fn list(&self) -> Result<Vec<Asset>, StoreError>;

    fn list_by_group(&self, group: &str) -> Result<Vec<Asset>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|asset| asset.group == group)
            .collect())
    }
}

/// In-process store, ordered by key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    assets: RwLock<BTreeMap<AssetKey, Asset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already provisioned records, rejecting duplicate keys.
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Result<Self, StoreError> {
        let store = Self::new();
        for asset in assets {
            store.insert(asset)?;
        }
        Ok(store)
    }

    /// Provision a new record. Existing records are never replaced.
    pub fn insert(&self, asset: Asset) -> Result<(), StoreError> {
        let key = asset.key();
        let mut assets = self.write()?;
        if assets.contains_key(&key) {
            return Err(StoreError::Duplicate { asset: key });
        }
        assets.insert(key, asset);
        Ok(())
    }

    /// Copy of every record, for the embedding application to persist.
    pub fn snapshot(&self) -> Result<Vec<Asset>, StoreError> {
        self.list()
    }

    pub fn len(&self) -> usize {
        self.read().map(|assets| assets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<AssetKey, Asset>>, StoreError> {
        self.assets
            .read()
            .map_err(|_| StoreError::Unavailable("asset map lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<AssetKey, Asset>>, StoreError> {
        self.assets
            .write()
            .map_err(|_| StoreError::Unavailable("asset map lock poisoned".into()))
    }
}

impl AssetStore for MemoryStore {
    fn get(&self, key: &AssetKey) -> Result<Asset, StoreError> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { asset: key.clone() })
    }

    fn put(&self, mut asset: Asset, expected_version: u64) -> Result<Asset, StoreError> {
        let key = asset.key();
        let mut assets = self.write()?;
        let Some(stored) = assets.get_mut(&key) else {
            return Err(StoreError::NotFound { asset: key });
        };
        if stored.version != expected_version {
            return Err(StoreError::VersionMismatch {
                asset: key,
                expected: expected_version,
                stored: stored.version,
            });
        }
        asset.version = expected_version + 1;
        *stored = asset.clone();
        Ok(asset)
    }

    fn list(&self) -> Result<Vec<Asset>, StoreError> {
        Ok(self.read()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::status::Status;
    use crate::asset::AssetKind;

    fn slot(id: &str, group: &str) -> Asset {
        Asset::provision(AssetKind::Slot, id, group, Status::Available).unwrap()
    }

    #[test]
    fn test_put_bumps_version() {
        let store = MemoryStore::from_assets([slot("E-1", "E")]).unwrap();
        let mut asset = store.get(&AssetKey::slot("E-1")).unwrap();
        asset.sensed_status = Status::Occupied;

        let stored = store.put(asset, 0).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(store.get(&AssetKey::slot("E-1")).unwrap(), stored);
    }

    #[test]
    fn test_stale_put_rejected() {
        let store = MemoryStore::from_assets([slot("E-1", "E")]).unwrap();
        let asset = store.get(&AssetKey::slot("E-1")).unwrap();
        store.put(asset.clone(), 0).unwrap();

        let err = store.put(asset, 0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                expected: 0,
                stored: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = MemoryStore::new();
        store.insert(slot("E-1", "E")).unwrap();
        assert!(matches!(
            store.insert(slot("E-1", "F")),
            Err(StoreError::Duplicate { .. })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_id_different_kind_allowed() {
        let store = MemoryStore::new();
        store.insert(slot("A-1", "A")).unwrap();
        store
            .insert(Asset::provision(AssetKind::Door, "A-1", "A", Status::Closed).unwrap())
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_list_by_group() {
        let store =
            MemoryStore::from_assets([slot("E-1", "E"), slot("E-2", "E"), slot("F-1", "F")])
                .unwrap();
        let group_e = store.list_by_group("E").unwrap();
        assert_eq!(group_e.len(), 2);
        assert!(group_e.iter().all(|a| a.group == "E"));
    }

    #[test]
    fn test_put_unknown_asset() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.put(slot("E-9", "E"), 0),
            Err(StoreError::NotFound { .. })
        ));
    }
}
