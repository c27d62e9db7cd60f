// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in each candidate directory.
pub const CONFIG_FILE_NAME: &str = "parkctl.toml";
/// Names a config file consulted ahead of every other candidate.
pub const CONFIG_ENV_VAR: &str = "PARKCTL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config in {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },

    #[error("{} has no [{section}] table", path.display())]
    MissingSection { path: PathBuf, section: &'static str },
}

/// Candidate files in lookup order: the environment override, the working
/// directory, the user config dir, then `/etc/parkctl`.
fn candidate_paths() -> Vec<PathBuf> {
    let from_env = std::env::var_os(CONFIG_ENV_VAR)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    let user = dirs::config_dir().map(|dir| dir.join("parkctl").join(CONFIG_FILE_NAME));

    from_env
        .into_iter()
        .chain(std::iter::once(PathBuf::from(CONFIG_FILE_NAME)))
        .chain(user)
        .chain(std::iter::once(Path::new("/etc/parkctl").join(CONFIG_FILE_NAME)))
        .collect()
}

/// Pull one top-level table out of a TOML document. `None` means the
/// document parsed but has no such table.
fn read_section<T: DeserializeOwned>(
    path: &Path,
    section: &str,
) -> Result<Option<T>, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut document: toml::Table = text
        .parse()
        .map_err(|e: toml::de::Error| invalid(e.to_string()))?;
    match document.remove(section) {
        None => Ok(None),
        Some(table) => table
            .try_into::<T>()
            .map(Some)
            .map_err(|e| invalid(format!("[{}]: {}", section, e))),
    }
}

/// A settings struct stored as one table of `parkctl.toml`.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Name of the table holding these settings.
    const SECTION: &'static str;

    /// Read the settings from `path`, which must contain the table.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        read_section(path, Self::SECTION)?.ok_or_else(|| ConfigError::MissingSection {
            path: path.to_path_buf(),
            section: Self::SECTION,
        })
    }

    /// First candidate file that exists and carries the table. Files lacking
    /// the table are passed over; with no match the defaults are used.
    fn discover() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in candidate_paths().into_iter().filter(|p| p.is_file()) {
            if let Some(found) = read_section(&path, Self::SECTION)? {
                return Ok((found, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// An explicit path is authoritative; otherwise fall back to [`discover`].
    ///
    /// [`discover`]: ConfigFile::discover
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match explicit {
            Some(path) => Self::from_path(path).map(|cfg| (cfg, Some(path.to_path_buf()))),
            None => Self::discover(),
        }
    }
}
