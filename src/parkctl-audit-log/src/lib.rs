// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! File-backed audit log.
//!
//! Provides [`AuditLogConfig`] for TOML configuration and
//! [`JsonLinesAuditSink`], an [`AuditSink`] writing one JSON object per line
//! with daily file rotation. The file an entry lands in is chosen from the
//! entry's own timestamp, not from the wall clock at write time.

use std::fs::{create_dir_all, read_dir, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use parkctl_core::audit::{AuditEntry, AuditRecord, AuditSink};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn default_audit_dir() -> String {
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir
            .join("parkctl")
            .join("audit")
            .to_string_lossy()
            .to_string();
    }
    "logs/audit".to_string()
}

/// Audit file logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLogConfig {
    /// Whether audit file logging is enabled
    pub enabled: bool,
    /// Base directory for log files
    pub dir: String,
    /// Log filename template; `%YYYY%`, `%MM%` and `%DD%` are substituted
    pub file: String,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_audit_dir(),
            file: "PARKCTL-AUDIT-%YYYY%-%MM%-%DD%.log".to_string(),
        }
    }
}

impl AuditLogConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.dir.trim().is_empty() {
            return Err("[audit].dir must not be empty when enabled".to_string());
        }
        let file = self.file.trim();
        if file.is_empty() || file.contains('/') || file.contains('\\') {
            return Err("[audit].file must be a plain file name".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File sink
// ---------------------------------------------------------------------------

struct AuditFileState {
    current_file_name: String,
    writer: BufWriter<File>,
    last_seq: u64,
}

/// Append-only JSON-Lines audit sink.
///
/// Sequence numbers continue from the highest one found in the directory
/// when the sink is opened.
pub struct JsonLinesAuditSink {
    base_dir: PathBuf,
    file_template: String,
    state: Mutex<AuditFileState>,
}

fn resolve_file_name(template: &str, at: DateTime<Utc>) -> String {
    template
        .replace("%YYYY%", &at.format("%Y").to_string())
        .replace("%MM%", &at.format("%m").to_string())
        .replace("%DD%", &at.format("%d").to_string())
}

fn open_writer(path: &Path) -> Result<BufWriter<File>, String> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .map_err(|e| format!("create audit log dir '{}': {}", parent.display(), e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("open audit log '{}': {}", path.display(), e))?;
    Ok(BufWriter::new(file))
}

impl JsonLinesAuditSink {
    pub fn open(base_dir: &Path, template: &str) -> Result<Self, String> {
        let last_seq = read_dir_entries(base_dir)?
            .iter()
            .map(|entry| entry.seq)
            .max()
            .unwrap_or(0);
        let file_name = resolve_file_name(template, Utc::now());
        let writer = open_writer(&base_dir.join(&file_name))?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            file_template: template.to_string(),
            state: Mutex::new(AuditFileState {
                current_file_name: file_name,
                writer,
                last_seq,
            }),
        })
    }

    /// Create the sink from config, or return `None` when logging is disabled.
    pub fn from_config(cfg: &AuditLogConfig) -> Result<Option<Arc<Self>>, String> {
        if !cfg.enabled {
            return Ok(None);
        }
        let base_dir = PathBuf::from(cfg.dir.trim());
        create_dir_all(&base_dir)
            .map_err(|e| format!("create audit log dir '{}': {}", base_dir.display(), e))?;
        Ok(Some(Arc::new(Self::open(&base_dir, cfg.file.trim())?)))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl AuditSink for JsonLinesAuditSink {
    /// The sequence only advances once the line is written, so a failed
    /// write leaves no gap on disk; its number goes to the next entry.
    fn append(&self, record: AuditRecord) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let seq = state.last_seq + 1;

        let next_file_name = resolve_file_name(&self.file_template, record.timestamp);
        if next_file_name != state.current_file_name {
            let next_path = self.base_dir.join(&next_file_name);
            match open_writer(&next_path) {
                Ok(next_writer) => {
                    let _ = state.writer.flush();
                    state.current_file_name = next_file_name;
                    state.writer = next_writer;
                }
                Err(e) => {
                    warn!("audit entry {} not written: {}", seq, e);
                    return seq;
                }
            }
        }

        let mut line = match serde_json::to_vec(&AuditEntry { seq, record }) {
            Ok(line) => line,
            Err(e) => {
                warn!("audit entry {} not written: serialization failed: {}", seq, e);
                return seq;
            }
        };
        line.push(b'\n');
        if let Err(e) = state.writer.write_all(&line).and_then(|_| state.writer.flush()) {
            warn!("audit entry {} not written to {}: {}", seq, state.current_file_name, e);
            return seq;
        }
        state.last_seq = seq;
        seq
    }
}

// ---------------------------------------------------------------------------
// Reading back
// ---------------------------------------------------------------------------

/// Parse one audit file. Lines that fail to parse are skipped with a warning.
pub fn read_entries(path: &Path) -> Result<Vec<AuditEntry>, String> {
    let file =
        File::open(path).map_err(|e| format!("open audit log '{}': {}", path.display(), e))?;
    let mut entries = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| format!("read audit log '{}': {}", path.display(), e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("{}:{}: skipping bad audit line: {}", path.display(), idx + 1, e),
        }
    }
    Ok(entries)
}

/// All entries of every `.log` file in `dir`, ordered by sequence number.
/// A missing directory reads as empty.
pub fn read_dir_entries(dir: &Path) -> Result<Vec<AuditEntry>, String> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    let listing =
        read_dir(dir).map_err(|e| format!("list audit dir '{}': {}", dir.display(), e))?;
    for item in listing {
        let path = item
            .map_err(|e| format!("list audit dir '{}': {}", dir.display(), e))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "log") {
            entries.extend(read_entries(&path)?);
        }
    }
    entries.sort_by_key(|entry| entry.seq);
    Ok(entries)
}
