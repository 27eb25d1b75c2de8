//! Daily archive refresh
//!
//! Once a day, at a configured local hour, pull the previous calendar day's
//! history from every channel the bot can see.

use super::{ChannelRef, archive_message};
use crate::slack::SlackApi;
use crate::store::{MessageStore, UNKNOWN_USER};
use anyhow::Context;
use chrono::{DateTime, Duration, Local, TimeZone};
use std::collections::HashMap;
use std::sync::Arc;

/// Totals from one refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub channels: usize,
    pub failed_channels: usize,
    /// Messages seen that had every required field.
    pub archived: usize,
    /// Of those, how many were new to the store.
    pub inserted: u64,
}

/// `[yesterday 00:00, today 00:00)` in `now`'s timezone.
pub fn previous_day<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
    let tz = now.timezone();
    let today = now.date_naive().and_hms_opt(0, 0, 0)?;
    let start = tz
        .from_local_datetime(&(today - Duration::days(1)))
        .earliest()?;
    let end = tz.from_local_datetime(&today).earliest()?;
    Some((start, end))
}

/// The first `hour:00` strictly after `now`.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive().and_hms_opt(hour, 0, 0)?;
    let candidate = tz.from_local_datetime(&today).earliest()?;
    if candidate > *now {
        return Some(candidate);
    }
    tz.from_local_datetime(&(today + Duration::days(1)))
        .earliest()
}

/// Slack's `seconds.micros` form of a point in time.
pub fn slack_ts<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    format!("{}.000000", at.timestamp())
}

pub struct RefreshJob {
    slack: Arc<dyn SlackApi>,
    messages: Arc<dyn MessageStore>,
    permalink_base_url: String,
}

impl RefreshJob {
    pub fn new(
        slack: Arc<dyn SlackApi>,
        messages: Arc<dyn MessageStore>,
        permalink_base_url: impl Into<String>,
    ) -> Self {
        Self {
            slack,
            messages,
            permalink_base_url: permalink_base_url.into(),
        }
    }

    /// Archive every channel's messages between `oldest` and `latest`.
    ///
    /// Slack failures on one channel are logged and that channel skipped.
    /// Directory lookups and store writes abort the run.
    pub async fn refresh_window(&self, oldest: &str, latest: &str) -> anyhow::Result<RefreshReport> {
        let channels = self
            .slack
            .list_channels()
            .await
            .context("failed to list channels")?;
        let users: HashMap<String, String> = self
            .slack
            .list_users()
            .await
            .context("failed to list users")?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect();

        let mut report = RefreshReport {
            channels: channels.len(),
            ..RefreshReport::default()
        };

        for channel in &channels {
            let channel_ref = ChannelRef {
                id: &channel.id,
                name: &channel.name,
            };
            let mut cursor: Option<String> = None;
            let mut count = 0;

            loop {
                let page = match self
                    .slack
                    .history_page(&channel.id, oldest, latest, cursor.as_deref())
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::error!("Could not get messages for {}: {}", channel.name, e);
                        report.failed_channels += 1;
                        break;
                    }
                };

                let rows: Vec<_> = page
                    .messages
                    .iter()
                    .filter_map(|raw| {
                        archive_message(raw, channel_ref, &self.permalink_base_url, |id| {
                            users.get(id).map(String::as_str).unwrap_or(UNKNOWN_USER)
                        })
                    })
                    .collect();
                count += rows.len();
                report.inserted += self.messages.insert_batch(&rows).await?;

                match page.next_cursor {
                    Some(next) if !next.is_empty() => cursor = Some(next),
                    _ => break,
                }
            }

            report.archived += count;
            tracing::info!("Processed {} messages for {}", count, channel.name);
        }

        Ok(report)
    }

    /// Archive the calendar day before `now`.
    pub async fn refresh_previous_day<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> anyhow::Result<RefreshReport> {
        let (start, end) =
            previous_day(now).context("previous day has no unambiguous local midnight")?;
        tracing::info!("Refreshing messages between {} and {}", start.naive_local(), end.naive_local());
        self.refresh_window(&slack_ts(&start), &slack_ts(&end)).await
    }

    /// Run [`Self::refresh_previous_day`] every day at `hour` local time.
    pub fn spawn_daily(self, hour: u32) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = Local::now();
                let Some(next) = next_run_after(&now, hour) else {
                    tracing::error!("Cannot schedule archive refresh at hour {}", hour);
                    return;
                };
                tracing::info!("Next archive refresh at {}", next.to_rfc3339());

                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                match self.refresh_previous_day(&Local::now()).await {
                    Ok(report) => tracing::info!(
                        "Refresh complete: {} messages ({} new) from {} channels, {} failed",
                        report.archived,
                        report.inserted,
                        report.channels,
                        report.failed_channels
                    ),
                    Err(e) => tracing::error!("Archive refresh failed: {:#}", e),
                }
            }
        })
    }
}
