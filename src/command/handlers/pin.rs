//! `pin` commands: bookmarking Slack messages and reading them back.

use super::{CommandContext, Handler, Reply};
use crate::command::parser::ParsedCommand;
use crate::error::CommandError;
use crate::leaderboard;
use crate::permalink::Permalink;
use crate::slack::SlackUser;
use crate::store::{InsertOutcome, PinRecord, RemoveOutcome};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;

/// Entries shown in each section of `pin stats`.
const STATS_TOP: usize = 3;

fn no_pins() -> CommandError {
    CommandError::user("No pins found")
}

/// Channel ID from a `<#C123|name>` mention, or the argument itself.
fn channel_id_from_arg(arg: &str) -> &str {
    let inner = arg
        .strip_prefix("<#")
        .map(|rest| rest.trim_end_matches('>'))
        .unwrap_or(arg);
    inner.split('|').next().unwrap_or(inner)
}

fn permalink_arg<'c>(command: &'c ParsedCommand, missing: &str) -> Result<&'c str, CommandError> {
    command
        .arguments()
        .first()
        .map(String::as_str)
        .ok_or_else(|| CommandError::user(missing))
}

pub struct RandomPin;

#[async_trait]
impl Handler for RandomPin {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let pin = ctx.pins.random(Some(ctx.event.channel.as_str())).await?.ok_or_else(no_pins)?;
        Ok(Reply::Message(pin.permalink))
    }
}

pub struct AnyPin;

#[async_trait]
impl Handler for AnyPin {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let pin = ctx.pins.random(None).await?.ok_or_else(no_pins)?;
        Ok(Reply::Message(pin.permalink))
    }
}

pub struct ChannelPin;

#[async_trait]
impl Handler for ChannelPin {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let arg = permalink_arg(command, "Need a channel to pick a pin from")?;
        let channel_id = channel_id_from_arg(arg);

        if let Some(pin) = ctx.pins.random(Some(channel_id)).await? {
            return Ok(Reply::Message(pin.permalink));
        }

        let channels = ctx.slack.list_channels().await?;
        if channels.iter().any(|c| c.id.eq_ignore_ascii_case(channel_id)) {
            Err(no_pins())
        } else {
            Err(CommandError::user(format!("Channel `{}` not found", arg)))
        }
    }
}

pub struct AddPin;

#[async_trait]
impl Handler for AddPin {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let arg = permalink_arg(command, "Need a permalink to pin")?;
        let link = Permalink::parse(arg).ok_or_else(|| {
            CommandError::user(format!("{} does not seem like a valid permalink", arg))
        })?;

        if ctx.pins.get(link.channel(), link.timestamp()).await?.is_some() {
            return Err(CommandError::user("Message is already pinned"));
        }

        let message = match ctx.slack.fetch_message(link.channel(), link.timestamp()).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::warn!(
                    "Could not find a message matching {}, adding with empty json",
                    link.url()
                );
                json!({})
            }
            Err(e) => {
                tracing::warn!(
                    "Could not fetch message for {} ({}), adding with empty json",
                    link.url(),
                    e
                );
                json!({})
            }
        };

        let record = PinRecord::new(
            link.channel(),
            link.timestamp(),
            message,
            link.url(),
            ctx.event.user.as_str(),
        );
        match ctx.pins.insert(&record).await? {
            InsertOutcome::Inserted => Ok(Reply::Message(
                ":white_check_mark: Successfully added pin".to_string(),
            )),
            InsertOutcome::AlreadyExists => Err(CommandError::user("Message is already pinned")),
        }
    }
}

/// Build a pin from one `pins.list` item.
fn pin_from_item(item: &Value, created_by: &str) -> Option<PinRecord> {
    let kind = item.get("type")?.as_str()?;
    let payload = item.get(kind)?;
    let permalink = payload.get("permalink")?.as_str()?;

    let (channel, timestamp) = match kind {
        "message" => {
            let link = Permalink::parse(permalink)?;
            (link.channel().to_string(), link.timestamp().to_string())
        }
        "file" => {
            let channel = payload.pointer("/pinned_to/0")?.as_str()?.to_string();
            let timestamp = match payload.get("timestamp")? {
                Value::String(ts) => ts.clone(),
                Value::Number(ts) => ts.to_string(),
                _ => return None,
            };
            (channel, timestamp)
        }
        _ => return None,
    };

    Some(PinRecord::new(
        channel,
        timestamp,
        payload.clone(),
        permalink,
        created_by,
    ))
}

pub struct LoadPins;

#[async_trait]
impl Handler for LoadPins {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let items = ctx.slack.list_pins(&ctx.event.channel).await?;
        tracing::info!("Loading {} pinned items from {}", items.len(), ctx.event.channel);

        let mut added = 0;
        let mut ignored = 0;
        for item in &items {
            let Some(record) = pin_from_item(item, &ctx.event.user) else {
                tracing::debug!("Skipping unsupported pinned item: {}", item);
                ignored += 1;
                continue;
            };
            match ctx.pins.insert(&record).await? {
                InsertOutcome::Inserted => added += 1,
                InsertOutcome::AlreadyExists => ignored += 1,
            }
        }

        Ok(Reply::Message(format!(
            ":white_check_mark: Successfully loaded {} pins and ignored {} pins",
            added, ignored
        )))
    }
}

pub struct RemovePin;

#[async_trait]
impl Handler for RemovePin {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let arg = permalink_arg(command, "Need a permalink to remove")?;
        let link = Permalink::parse(arg)
            .ok_or_else(|| CommandError::user("Message does not seem like a valid permalink"))?;

        match ctx.pins.remove(link.channel(), link.timestamp()).await? {
            RemoveOutcome::Removed => Ok(Reply::Message(
                ":white_check_mark: Successfully removed pin".to_string(),
            )),
            RemoveOutcome::NotFound => Err(CommandError::user("No matching pin found")),
        }
    }
}

/// Sum of all reaction counts on a Slack message object.
fn reaction_total(message: &Value) -> u64 {
    message
        .get("reactions")
        .and_then(Value::as_array)
        .map(|reactions| {
            reactions
                .iter()
                .filter_map(|r| r.get("count").and_then(Value::as_u64))
                .sum()
        })
        .unwrap_or(0)
}

fn section(text: String, avatar: Option<&str>) -> Value {
    let mut block = json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text },
    });
    if let Some(url) = avatar {
        block["accessory"] = json!({
            "type": "image",
            "image_url": url,
            "alt_text": "Avatar",
        });
    }
    block
}

fn heading(text: &str) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text },
    })
}

fn divider() -> Value {
    json!({ "type": "divider" })
}

struct PinSummary<'u> {
    author: &'u str,
    avatar: Option<&'u str>,
    text: String,
    reactions: u64,
}

pub struct PinStats;

#[async_trait]
impl Handler for PinStats {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let pins = ctx.pins.all(None).await?;
        if pins.is_empty() {
            return Err(no_pins());
        }

        let users = ctx.slack.list_users().await?;
        let by_id: HashMap<&str, &SlackUser> = users.iter().map(|u| (u.id.as_str(), u)).collect();

        let mut summaries = Vec::new();
        for pin in &pins {
            let Some(user) = pin.author().and_then(|id| by_id.get(id)) else {
                continue;
            };

            let reactions = match ctx.slack.fetch_message(&pin.channel, &pin.timestamp).await {
                Ok(Some(current)) => reaction_total(&current),
                Ok(None) => reaction_total(&pin.message),
                Err(e) => {
                    tracing::error!("Couldn't grab reactions for {}: {}", pin.permalink, e);
                    continue;
                }
            };

            summaries.push(PinSummary {
                author: user.name.as_str(),
                avatar: user.avatar_url.as_deref(),
                text: pin
                    .message
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                reactions,
            });
        }

        let avatars: HashMap<&str, Option<&str>> =
            summaries.iter().map(|s| (s.author, s.avatar)).collect();
        let top_users = leaderboard::rank(summaries.iter().map(|s| s.author));

        let mut blocks = vec![heading("*Top Users:*"), divider()];
        for (name, count) in top_users.iter().take(STATS_TOP) {
            let avatar = avatars.get(name.as_str()).copied().flatten();
            blocks.push(section(format!("{}\n{} pins", name, count), avatar));
        }

        blocks.push(divider());
        blocks.push(heading("*Top Reactions:*"));
        summaries.sort_by(|a, b| b.reactions.cmp(&a.reactions));
        for summary in summaries.iter().take(STATS_TOP) {
            blocks.push(section(
                format!(
                    "{}\n{} reactions\n{}",
                    summary.author, summary.reactions, summary.text
                ),
                summary.avatar,
            ));
        }

        Ok(Reply::Blocks(blocks))
    }
}

pub struct PinLeaderboard;

#[async_trait]
impl Handler for PinLeaderboard {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let pins = ctx.pins.all(None).await?;
        let users = ctx.slack.list_users().await?;
        let names: HashMap<&str, &str> = users
            .iter()
            .map(|u| (u.id.as_str(), u.name.as_str()))
            .collect();

        let authors: Vec<&str> = pins
            .iter()
            .filter_map(|p| p.author())
            .map(|id| names.get(id).copied().unwrap_or(id))
            .collect();
        if authors.is_empty() {
            return Err(no_pins());
        }

        let ranked = leaderboard::rank(authors);
        Ok(Reply::Message(leaderboard::render(
            "Most pinned members",
            &ranked,
            "pins",
        )))
    }
}
