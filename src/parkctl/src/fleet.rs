// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON fleet file: the persisted form of every provisioned asset.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use parkctl_app::normalize_group;
use parkctl_core::{Asset, DynResult, MemoryStore};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetFile {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl FleetFile {
    /// Read and check a fleet file. A missing file is an empty fleet.
    pub fn load(path: &Path) -> DynResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| format!("read fleet file '{}': {}", path.display(), e))?;
        let mut fleet: FleetFile = serde_json::from_str(&content)
            .map_err(|e| format!("parse fleet file '{}': {}", path.display(), e))?;
        for asset in &mut fleet.assets {
            asset.group = normalize_group(&asset.group);
            asset
                .validate()
                .map_err(|e| format!("fleet file '{}': {}", path.display(), e))?;
        }
        Ok(fleet)
    }

    pub fn into_store(self) -> DynResult<MemoryStore> {
        Ok(MemoryStore::from_assets(self.assets)?)
    }

    pub fn from_store(store: &MemoryStore) -> DynResult<Self> {
        Ok(Self {
            assets: store.snapshot()?,
        })
    }

    /// Write through a temporary file so a crash never leaves half a fleet.
    pub fn save(&self, path: &Path) -> DynResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| format!("create fleet dir '{}': {}", parent.display(), e))?;
        }
        let tmp = temp_path(path);
        fs::write(&tmp, json + "\n")
            .map_err(|e| format!("write fleet file '{}': {}", tmp.display(), e))?;
        fs::rename(&tmp, path)
            .map_err(|e| format!("replace fleet file '{}': {}", path.display(), e))?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
