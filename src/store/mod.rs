//! Local Storage
//!
//! Pin and message-archive records, the store capabilities the command
//! handlers depend on, and the SQLite implementation of both.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, StoreError>;

/// A bookmarked Slack message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinRecord {
    pub channel: String,
    pub timestamp: String,
    /// The message as returned by Slack at pin time; `{}` when it could not
    /// be fetched.
    pub message: serde_json::Value,
    pub permalink: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl PinRecord {
    pub fn new(
        channel: impl Into<String>,
        timestamp: impl Into<String>,
        message: serde_json::Value,
        permalink: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            timestamp: timestamp.into(),
            message,
            permalink: permalink.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }

    /// Slack user ID of the pinned message's author, if the payload has one.
    pub fn author(&self) -> Option<&str> {
        self.message.get("user").and_then(|u| u.as_str())
    }
}

/// A message copied from Slack history into the local archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub timestamp: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub permalink: String,
}

/// Author name recorded when a message's author cannot be resolved.
pub const UNKNOWN_USER: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Pins keyed by `(channel, timestamp)`; channels compare case-insensitively.
#[async_trait]
pub trait PinStore: Send + Sync {
    async fn get(&self, channel: &str, timestamp: &str) -> Result<Option<PinRecord>>;

    /// A random pin, optionally restricted to one channel.
    async fn random(&self, channel: Option<&str>) -> Result<Option<PinRecord>>;

    /// All pins in creation order, optionally restricted to one channel.
    async fn all(&self, channel: Option<&str>) -> Result<Vec<PinRecord>>;

    /// Insert unless a pin for the same key exists; never overwrites.
    async fn insert(&self, pin: &PinRecord) -> Result<InsertOutcome>;

    async fn remove(&self, channel: &str, timestamp: &str) -> Result<RemoveOutcome>;
}

/// The archived-message corpus searched by the leaderboards.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert messages, ignoring any already archived. Returns how many were new.
    async fn insert_batch(&self, messages: &[ArchivedMessage]) -> Result<u64>;

    /// Messages whose text matches `pattern`, oldest first.
    async fn search(&self, pattern: &Regex) -> Result<Vec<ArchivedMessage>>;

    async fn count(&self) -> Result<u64>;
}
