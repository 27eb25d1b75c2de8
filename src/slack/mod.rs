//! Slack Integration
//!
//! The Slack capabilities the bot needs, their slack-morphism implementation,
//! and the Socket Mode listener that turns `app_mention` events into
//! dispatched commands.

mod agent;
pub(crate) mod handler;
#[cfg(test)]
pub(crate) mod testing;
mod web;

pub use agent::SlackBot;
pub use web::SlackWebApi;

use crate::error::SlackError;
use async_trait::async_trait;
use serde_json::Value;

pub type Result<T> = std::result::Result<T, SlackError>;

/// A workspace member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A public or private channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackChannel {
    pub id: String,
    pub name: String,
}

/// One page of `conversations.history`.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    /// Raw message objects as Slack returns them.
    pub messages: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// The mention that triggered a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEvent {
    pub channel: String,
    pub user: String,
    pub ts: String,
    pub text: String,
}

/// Slack Web API calls used by the command handlers and archive jobs.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Post a text message; returns the new message's timestamp.
    async fn post_message(&self, channel: &str, text: &str) -> Result<String>;

    /// Post a Block Kit message.
    async fn post_blocks(&self, channel: &str, blocks: &[Value]) -> Result<String>;

    async fn add_reaction(&self, channel: &str, ts: &str, name: &str) -> Result<()>;

    /// The message at exactly `ts` in `channel`, if Slack still has it.
    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<Option<Value>>;

    /// One page of channel history between `oldest` and `latest`, inclusive.
    async fn history_page(
        &self,
        channel: &str,
        oldest: &str,
        latest: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage>;

    /// Slack's own pinned items for a channel (`pins.list`).
    async fn list_pins(&self, channel: &str) -> Result<Vec<Value>>;

    async fn list_users(&self) -> Result<Vec<SlackUser>>;

    async fn list_channels(&self) -> Result<Vec<SlackChannel>>;
}
