//! SQLite-backed pin and message store
//!
//! One database file holds both tables. The pin primary key uses a
//! `NOCASE` channel column, so uniqueness and every lookup ignore channel
//! case, and `INSERT OR IGNORE` makes pin creation an atomic insert-if-absent.

use super::{
    ArchivedMessage, InsertOutcome, MessageStore, PinRecord, PinStore, RemoveOutcome, Result,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use regex::Regex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;

const MIGRATIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS pins (
        channel     TEXT NOT NULL COLLATE NOCASE,
        timestamp   TEXT NOT NULL,
        json        TEXT NOT NULL,
        permalink   TEXT NOT NULL,
        created_by  TEXT NOT NULL,
        created_at  TEXT NOT NULL,
        PRIMARY KEY (channel, timestamp)
    );
    CREATE TABLE IF NOT EXISTS messages (
        timestamp     TEXT NOT NULL,
        channel_id    TEXT NOT NULL,
        channel_name  TEXT NOT NULL,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        message       TEXT NOT NULL,
        permalink     TEXT NOT NULL,
        PRIMARY KEY (timestamp, channel_id)
    );
    CREATE INDEX IF NOT EXISTS idx_messages_user_name ON messages (user_name)
"#;

const PIN_COLUMNS: &str = "channel, timestamp, json, permalink, created_by, created_at";
const MESSAGE_COLUMNS: &str =
    "timestamp, channel_id, channel_name, user_id, user_name, message, permalink";

/// Pins and archived messages in a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tracing::debug!("Creating database directory {:?}", parent);
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create database directory {:?}: {}", parent, e);
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        tracing::debug!("Opened store at {:?}", path);
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    pub async fn run_migrations(&self) -> Result<()> {
        // sqlx executes one statement per call
        for stmt in MIGRATIONS.split(';') {
            let trimmed = stmt.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn pin_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pins")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    fn pin_from_row(row: &SqliteRow) -> Result<PinRecord> {
        let json: String = row.try_get("json")?;
        Ok(PinRecord {
            channel: row.try_get("channel")?,
            timestamp: row.try_get("timestamp")?,
            message: serde_json::from_str(&json)?,
            permalink: row.try_get("permalink")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn message_from_row(row: &SqliteRow) -> Result<ArchivedMessage> {
        Ok(ArchivedMessage {
            timestamp: row.try_get("timestamp")?,
            channel_id: row.try_get("channel_id")?,
            channel_name: row.try_get("channel_name")?,
            user_id: row.try_get("user_id")?,
            user_name: row.try_get("user_name")?,
            text: row.try_get("message")?,
            permalink: row.try_get("permalink")?,
        })
    }
}

#[async_trait]
impl PinStore for SqliteStore {
    async fn get(&self, channel: &str, timestamp: &str) -> Result<Option<PinRecord>> {
        let sql = format!("SELECT {PIN_COLUMNS} FROM pins WHERE channel = ? AND timestamp = ?");
        let row = sqlx::query(&sql)
            .bind(channel)
            .bind(timestamp)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::pin_from_row).transpose()
    }

    async fn random(&self, channel: Option<&str>) -> Result<Option<PinRecord>> {
        // Single statement so a concurrent remove can't leave us past the end.
        let row = match channel {
            Some(ch) => {
                let sql = format!(
                    "SELECT {PIN_COLUMNS} FROM pins WHERE channel = ? ORDER BY RANDOM() LIMIT 1"
                );
                sqlx::query(&sql).bind(ch).fetch_optional(&self.pool).await?
            }
            None => {
                let sql = format!("SELECT {PIN_COLUMNS} FROM pins ORDER BY RANDOM() LIMIT 1");
                sqlx::query(&sql).fetch_optional(&self.pool).await?
            }
        };
        row.as_ref().map(Self::pin_from_row).transpose()
    }

    async fn all(&self, channel: Option<&str>) -> Result<Vec<PinRecord>> {
        let rows = match channel {
            Some(ch) => {
                let sql =
                    format!("SELECT {PIN_COLUMNS} FROM pins WHERE channel = ? ORDER BY created_at, rowid");
                sqlx::query(&sql).bind(ch).fetch_all(&self.pool).await?
            }
            None => {
                let sql = format!("SELECT {PIN_COLUMNS} FROM pins ORDER BY created_at, rowid");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(Self::pin_from_row).collect()
    }

    async fn insert(&self, pin: &PinRecord) -> Result<InsertOutcome> {
        let sql = format!("INSERT OR IGNORE INTO pins ({PIN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)");
        let result = sqlx::query(&sql)
            .bind(&pin.channel)
            .bind(&pin.timestamp)
            .bind(serde_json::to_string(&pin.message)?)
            .bind(&pin.permalink)
            .bind(&pin.created_by)
            .bind(pin.created_at)
            .execute(&self.pool)
            .await?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn remove(&self, channel: &str, timestamp: &str) -> Result<RemoveOutcome> {
        let result = sqlx::query("DELETE FROM pins WHERE channel = ? AND timestamp = ?")
            .bind(channel)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;

        Ok(if result.rows_affected() == 0 {
            RemoveOutcome::NotFound
        } else {
            RemoveOutcome::Removed
        })
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_batch(&self, messages: &[ArchivedMessage]) -> Result<u64> {
        if messages.is_empty() {
            return Ok(0);
        }

        let sql =
            format!("INSERT OR IGNORE INTO messages ({MESSAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)");
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for message in messages {
            let result = sqlx::query(&sql)
                .bind(&message.timestamp)
                .bind(&message.channel_id)
                .bind(&message.channel_name)
                .bind(&message.user_id)
                .bind(&message.user_name)
                .bind(&message.text)
                .bind(&message.permalink)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn search(&self, pattern: &Regex) -> Result<Vec<ArchivedMessage>> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY timestamp");
        let mut rows = sqlx::query(&sql).fetch(&self.pool);
        let mut matches = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let message = Self::message_from_row(&row)?;
            if pattern.is_match(&message.text) {
                matches.push(message);
            }
        }
        Ok(matches)
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::connect(&dir.path().join("pins.db")).await.unwrap();
        (dir, store)
    }

    fn pin(channel: &str, ts: &str, text: &str) -> PinRecord {
        PinRecord::new(
            channel,
            ts,
            json!({ "user": "U1", "text": text, "ts": ts }),
            format!("https://t.slack.com/archives/{}/p{}", channel, ts.replace('.', "")),
            "U9",
        )
    }

    fn message(ts: &str, channel: &str, user: &str, text: &str) -> ArchivedMessage {
        ArchivedMessage {
            timestamp: ts.to_string(),
            channel_id: channel.to_string(),
            channel_name: "general".to_string(),
            user_id: format!("ID-{}", user),
            user_name: user.to_string(),
            text: text.to_string(),
            permalink: String::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_pin() {
        let (_dir, store) = open().await;
        let record = pin("C1", "1612345678.123456", "hello");

        assert_eq!(store.insert(&record).await.unwrap(), InsertOutcome::Inserted);
        let loaded = store.get("C1", "1612345678.123456").await.unwrap().unwrap();
        assert_eq!(loaded.message, record.message);
        assert_eq!(loaded.created_by, "U9");
        assert_eq!(loaded.author(), Some("U1"));
    }

    #[tokio::test]
    async fn test_insert_duplicate_does_not_overwrite() {
        let (_dir, store) = open().await;
        store.insert(&pin("C1", "1612345678.123456", "first")).await.unwrap();

        let outcome = store.insert(&pin("c1", "1612345678.123456", "second")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::AlreadyExists);

        let loaded = store.get("C1", "1612345678.123456").await.unwrap().unwrap();
        assert_eq!(loaded.message["text"], "first");
        assert_eq!(store.pin_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_channel_lookups_ignore_case() {
        let (_dir, store) = open().await;
        store.insert(&pin("C0ABC", "1612345678.000001", "a")).await.unwrap();

        assert!(store.get("c0abc", "1612345678.000001").await.unwrap().is_some());
        assert!(store.random(Some("c0abc")).await.unwrap().is_some());
        assert_eq!(store.all(Some("C0abc")).await.unwrap().len(), 1);
        assert_eq!(
            store.remove("c0ABC", "1612345678.000001").await.unwrap(),
            RemoveOutcome::Removed
        );
        assert!(store.get("C0ABC", "1612345678.000001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_pin() {
        let (_dir, store) = open().await;
        assert_eq!(
            store.remove("C1", "1612345678.123456").await.unwrap(),
            RemoveOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_random_respects_channel() {
        let (_dir, store) = open().await;
        assert!(store.random(None).await.unwrap().is_none());

        store.insert(&pin("C1", "1612345678.000001", "a")).await.unwrap();
        store.insert(&pin("C2", "1612345678.000002", "b")).await.unwrap();

        for _ in 0..10 {
            let picked = store.random(Some("C2")).await.unwrap().unwrap();
            assert_eq!(picked.channel, "C2");
        }
        assert!(store.random(Some("C3")).await.unwrap().is_none());
        assert!(store.random(None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_random_after_removals() {
        let (_dir, store) = open().await;
        for i in 1..=3 {
            let ts = format!("1612345678.00000{}", i);
            store.insert(&pin("C1", &ts, "a")).await.unwrap();
        }
        store.remove("C1", "1612345678.000001").await.unwrap();
        store.remove("C1", "1612345678.000003").await.unwrap();

        for _ in 0..10 {
            let picked = store.random(Some("C1")).await.unwrap().unwrap();
            assert_eq!(picked.timestamp, "1612345678.000002");
            let picked = store.random(None).await.unwrap().unwrap();
            assert_eq!(picked.timestamp, "1612345678.000002");
        }
    }

    #[tokio::test]
    async fn test_random_reaches_every_pin() {
        let (_dir, store) = open().await;
        for i in 1..=3 {
            let ts = format!("1612345678.00000{}", i);
            store.insert(&pin("C1", &ts, "a")).await.unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(store.random(None).await.unwrap().unwrap().timestamp);
        }
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_insert_batch_ignores_duplicates() {
        let (_dir, store) = open().await;
        let batch = vec![
            message("1.000001", "C1", "alice", "go go"),
            message("1.000002", "C1", "bob", "hello"),
        ];
        assert_eq!(store.insert_batch(&batch).await.unwrap(), 2);

        let mut again = batch.clone();
        again[0].text = "changed".to_string();
        again.push(message("1.000001", "C2", "alice", "other channel"));
        assert_eq!(store.insert_batch(&again).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 3);

        let all = store.search(&Regex::new("go go").unwrap()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "go go");
    }

    #[tokio::test]
    async fn test_search_filters_by_pattern() {
        let (_dir, store) = open().await;
        store
            .insert_batch(&[
                message("1.000001", "C1", "alice", "GO team"),
                message("1.000002", "C1", "bob", "no match"),
                message("1.000003", "C1", "carol", "let's go"),
            ])
            .await
            .unwrap();

        let pattern = regex::RegexBuilder::new(r"\bgo\b")
            .case_insensitive(true)
            .build()
            .unwrap();
        let found = store.search(&pattern).await.unwrap();
        let users: Vec<&str> = found.iter().map(|m| m.user_name.as_str()).collect();
        assert_eq!(users, vec!["alice", "carol"]);
    }
}
