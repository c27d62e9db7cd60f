// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sensor feed: reports in, change events out.
//!
//! Each input line is either JSON (`{"asset":"slot:E-12","status":"occupied"}`)
//! or the short form `slot:E-12 occupied`. Change events produced by the
//! engine are written to the output as JSON lines.

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

use parkctl_core::controller::ChangeEvent;
use parkctl_core::{AssetKey, DynResult, OverrideManager, Status};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SensorReport {
    pub asset: AssetKey,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub applied: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

pub fn parse_report(line: &str) -> Result<SensorReport, String> {
    let line = line.trim();
    if line.starts_with('{') {
        return serde_json::from_str(line).map_err(|e| format!("bad report '{}': {}", line, e));
    }
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(asset), Some(status), None) => Ok(SensorReport {
            asset: asset.parse().map_err(|e| format!("{}", e))?,
            status: status.parse().map_err(|e| format!("{}", e))?,
        }),
        _ => Err(format!(
            "bad report '{}' (expected '<kind>:<id> <status>')",
            line
        )),
    }
}

async fn drain_events<W>(
    events: &mut broadcast::Receiver<ChangeEvent>,
    output: &mut W,
) -> DynResult<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        match events.try_recv() {
            Ok(event) => {
                let mut line = serde_json::to_vec(&event)?;
                line.push(b'\n');
                output.write_all(&line).await?;
            }
            Err(TryRecvError::Lagged(missed)) => warn!("Event output lagged, {} events dropped", missed),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    output.flush().await?;
    Ok(())
}

/// Apply reports until the input ends. Bad lines are logged and skipped.
pub async fn run_feed<R, W>(
    manager: Arc<OverrideManager>,
    mut events: broadcast::Receiver<ChangeEvent>,
    input: R,
    mut output: W,
) -> DynResult<FeedStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let report = match parse_report(&line) {
            Ok(report) => report,
            Err(e) => {
                warn!("{}", e);
                stats.rejected += 1;
                continue;
            }
        };
        match manager.update_sensed_status(&report.asset, report.status) {
            Ok(outcome) if outcome.changed => stats.applied += 1,
            Ok(_) => stats.unchanged += 1,
            // Already logged by the manager.
            Err(_) => stats.rejected += 1,
        }
        drain_events(&mut events, &mut output).await?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkctl_core::controller::BroadcastListener;
    use parkctl_core::{Asset, AssetKind, MemoryAuditLog, MemoryStore};

    #[test]
    fn test_parse_report_forms() {
        let short = parse_report("slot:E-12 occupied").unwrap();
        let json = parse_report(r#"{"asset":"slot:E-12","status":"occupied"}"#).unwrap();
        assert_eq!(short, json);
        assert_eq!(short.status, Status::Occupied);

        assert!(parse_report("slot:E-12").is_err());
        assert!(parse_report("E-12 occupied").is_err());
        assert!(parse_report("slot:E-12 melted").is_err());
    }

    #[tokio::test]
    async fn test_feed_emits_changes() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(Asset::provision(AssetKind::Slot, "E-12", "E", Status::Available).unwrap())
            .unwrap();
        let (listener, rx) = BroadcastListener::channel(16);
        let mut manager = OverrideManager::new(store, Arc::new(MemoryAuditLog::new()));
        manager.register_listener(Arc::new(listener));

        let input: &[u8] =
            b"# morning\nslot:E-12 occupied\nslot:E-12 occupied\nslot:E-99 occupied\nbogus\n";
        let mut output = Vec::new();
        let stats = run_feed(Arc::new(manager), rx, input, &mut output)
            .await
            .unwrap();

        assert_eq!(
            stats,
            FeedStats {
                applied: 1,
                unchanged: 1,
                rejected: 2,
            }
        );
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event["event"], "status_changed");
        assert_eq!(event["asset"], "slot:E-12");
        assert_eq!(event["new"]["status"], "occupied");
    }
}
