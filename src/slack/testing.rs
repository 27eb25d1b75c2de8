//! In-memory [`SlackApi`] used by unit tests.

use super::{HistoryPage, Result, SlackApi, SlackChannel, SlackUser};
use crate::error::SlackError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Something the fake was asked to send.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { channel: String, text: String },
    Blocks { channel: String, blocks: Vec<Value> },
    Reaction { channel: String, ts: String, name: String },
}

#[derive(Default)]
pub struct FakeSlack {
    pub sent: Mutex<Vec<Sent>>,
    /// Messages by `(channel, ts)` served from `fetch_message`.
    pub messages: HashMap<(String, String), Value>,
    /// History served per channel as a single page.
    pub history: HashMap<String, Vec<Value>>,
    pub pins: HashMap<String, Vec<Value>>,
    pub users: Vec<SlackUser>,
    pub channels: Vec<SlackChannel>,
    /// Make `fetch_message` and `history_page` fail.
    pub fail_reads: bool,
    /// Make `add_reaction` fail without recording anything.
    pub fail_reactions: bool,
}

impl FakeSlack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, name: &str) -> Self {
        self.users.push(SlackUser {
            id: id.to_string(),
            name: name.to_string(),
            avatar_url: Some(format!("https://avatars/{}.png", name)),
        });
        self
    }

    pub fn with_channel(mut self, id: &str, name: &str) -> Self {
        self.channels.push(SlackChannel {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_message(mut self, channel: &str, ts: &str, message: Value) -> Self {
        self.messages
            .insert((channel.to_string(), ts.to_string()), message);
        self
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Text of every posted text message.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> usize {
        let mut log = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        log.push(sent);
        log.len()
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn post_message(&self, channel: &str, text: &str) -> Result<String> {
        let n = self.record(Sent::Text {
            channel: channel.to_string(),
            text: text.to_string(),
        });
        Ok(format!("1700000000.{:06}", n))
    }

    async fn post_blocks(&self, channel: &str, blocks: &[Value]) -> Result<String> {
        let n = self.record(Sent::Blocks {
            channel: channel.to_string(),
            blocks: blocks.to_vec(),
        });
        Ok(format!("1700000000.{:06}", n))
    }

    async fn add_reaction(&self, channel: &str, ts: &str, name: &str) -> Result<()> {
        if self.fail_reactions {
            return Err(SlackError::api("reactions.add", "invalid_name"));
        }
        self.record(Sent::Reaction {
            channel: channel.to_string(),
            ts: ts.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<Option<Value>> {
        if self.fail_reads {
            return Err(SlackError::api("conversations.history", "channel_not_found"));
        }
        Ok(self
            .messages
            .get(&(channel.to_string(), ts.to_string()))
            .cloned())
    }

    async fn history_page(
        &self,
        channel: &str,
        _oldest: &str,
        _latest: &str,
        _cursor: Option<&str>,
    ) -> Result<HistoryPage> {
        if self.fail_reads {
            return Err(SlackError::api("conversations.history", "not_in_channel"));
        }
        Ok(HistoryPage {
            messages: self.history.get(channel).cloned().unwrap_or_default(),
            next_cursor: None,
        })
    }

    async fn list_pins(&self, channel: &str) -> Result<Vec<Value>> {
        Ok(self.pins.get(channel).cloned().unwrap_or_default())
    }

    async fn list_users(&self) -> Result<Vec<SlackUser>> {
        Ok(self.users.clone())
    }

    async fn list_channels(&self) -> Result<Vec<SlackChannel>> {
        Ok(self.channels.clone())
    }
}
