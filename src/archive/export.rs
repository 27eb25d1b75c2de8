//! Slack workspace export loader
//!
//! An export directory holds `channels.json` and one directory per channel
//! named after it, each containing a JSON array of messages per day.

use super::{ChannelRef, archive_message};
use crate::store::{MessageStore, UNKNOWN_USER};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct ExportChannel {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub channels: usize,
    pub files: usize,
    pub archived: usize,
    pub inserted: u64,
    /// Channel directories with no entry in `channels.json`.
    pub skipped_dirs: Vec<String>,
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Entries of `dir` that pass `keep`, sorted by path.
async fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to list {}", dir.display()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Import every channel directory under `dir` into `store`.
pub async fn load_export(
    dir: &Path,
    permalink_base_url: &str,
    store: &dyn MessageStore,
) -> anyhow::Result<ExportReport> {
    let channels: Vec<ExportChannel> = read_json(&dir.join("channels.json")).await?;
    let mut report = ExportReport::default();

    for channel_dir in sorted_entries(dir, Path::is_dir).await? {
        let Some(name) = channel_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(channel) = channels.iter().find(|c| c.name == name) else {
            tracing::warn!("No channel named {} in channels.json, skipping", name);
            report.skipped_dirs.push(name.to_string());
            continue;
        };

        tracing::info!("Getting messages for {}", channel.name);
        let channel_ref = ChannelRef {
            id: &channel.id,
            name: &channel.name,
        };
        let mut count = 0;

        let files = sorted_entries(&channel_dir, |p| {
            p.extension().is_some_and(|ext| ext == "json")
        })
        .await?;
        for file in &files {
            let raw: Vec<Value> = read_json(file).await?;
            let rows: Vec<_> = raw
                .iter()
                .filter_map(|message| {
                    archive_message(message, channel_ref, permalink_base_url, |_| {
                        message
                            .pointer("/user_profile/name")
                            .and_then(Value::as_str)
                            .unwrap_or(UNKNOWN_USER)
                    })
                })
                .collect();
            count += rows.len();
            report.inserted += store.insert_batch(&rows).await?;
        }

        tracing::info!("Inserted/updated {} messages for {}", count, channel.name);
        report.channels += 1;
        report.files += files.len();
        report.archived += count;
    }

    Ok(report)
}
