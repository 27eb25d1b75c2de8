//! Message Archive
//!
//! Copies Slack history into the local [`MessageStore`] so the leaderboards
//! can search it: a daily refresh over the Web API, and a one-off loader for
//! workspace export directories.

pub mod export;
pub mod refresh;

pub use export::{ExportReport, load_export};
pub use refresh::{RefreshJob, RefreshReport};

use crate::permalink;
use crate::store::ArchivedMessage;
use serde_json::Value;

/// Fields every archived message must carry.
const REQUIRED_FIELDS: [&str; 3] = ["ts", "user", "text"];

/// Where an archived message came from.
#[derive(Debug, Clone, Copy)]
pub struct ChannelRef<'a> {
    pub id: &'a str,
    pub name: &'a str,
}

/// Convert one raw Slack message into an archive row.
///
/// Returns `None` when `ts`, `user` or `text` is missing. `user_name` is
/// given the author's user ID.
pub fn archive_message<'u>(
    raw: &Value,
    channel: ChannelRef<'_>,
    permalink_base_url: &str,
    user_name: impl FnOnce(&str) -> &'u str,
) -> Option<ArchivedMessage> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| raw.get(field).and_then(Value::as_str).is_none())
        .collect();
    if !missing.is_empty() {
        let ts = raw.get("ts").and_then(Value::as_str).unwrap_or("?");
        tracing::debug!(
            "Skipping message {} in {}: missing {}",
            ts,
            channel.name,
            missing.join(",")
        );
        return None;
    }

    let ts = raw.get("ts")?.as_str()?;
    let user = raw.get("user")?.as_str()?;
    let text = raw.get("text")?.as_str()?;

    Some(ArchivedMessage {
        timestamp: ts.to_string(),
        channel_id: channel.id.to_string(),
        channel_name: channel.name.to_string(),
        user_id: user.to_string(),
        user_name: user_name(user).to_string(),
        text: text.to_string(),
        permalink: permalink::encode(permalink_base_url, channel.id, ts),
    })
}
