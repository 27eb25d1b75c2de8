//! Command Handlers
//!
//! One [`Handler`] per registered command, plus the table wiring them up.

mod general;
mod msg;
mod pin;

use super::CommandSettings;
use super::parser::ParsedCommand;
use super::registry::{CommandSpec, Registry};
use crate::error::{CommandError, RegistryError};
use crate::slack::{MentionEvent, SlackApi};
use crate::store::{MessageStore, PinStore};
use async_trait::async_trait;
use serde_json::Value;

/// What a handler produced for the requester.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Post this text to the channel.
    Message(String),
    /// Post these Block Kit blocks to the channel.
    Blocks(Vec<Value>),
    /// The handler already posted its reply itself.
    Sent,
}

/// Everything a handler may use for one invocation.
pub struct CommandContext<'a> {
    pub event: &'a MentionEvent,
    pub slack: &'a dyn SlackApi,
    pub pins: &'a dyn PinStore,
    pub messages: &'a dyn MessageStore,
    pub registry: &'a Registry,
    pub settings: &'a CommandSettings,
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        command: &ParsedCommand,
    ) -> Result<Reply, CommandError>;
}

/// The bot's full command table.
pub fn builtin_registry() -> Result<Registry, RegistryError> {
    Registry::new(vec![
        CommandSpec::new("help", None, &[], "Prints this message", general::Help),
        CommandSpec::new(
            "pin",
            None,
            &[],
            "Prints a random pin from this channel",
            pin::RandomPin,
        ),
        CommandSpec::new(
            "pin",
            Some("any"),
            &[],
            "Prints a random pin from any channel",
            pin::AnyPin,
        ),
        CommandSpec::new(
            "pin",
            None,
            &["channel"],
            "Prints a random pin from the specified channel",
            pin::ChannelPin,
        ),
        CommandSpec::new(
            "pin",
            Some("add"),
            &["message_permalink"],
            "Adds a message to the database",
            pin::AddPin,
        ),
        CommandSpec::new(
            "pin",
            Some("load"),
            &[],
            "Adds all current pins in this channel to the database",
            pin::LoadPins,
        ),
        CommandSpec::new(
            "pin",
            Some("remove"),
            &["message_permalink"],
            "Removes a message from the database",
            pin::RemovePin,
        ),
        CommandSpec::new(
            "pin",
            Some("stats"),
            &[],
            "Gets some stats on pinned messages",
            pin::PinStats,
        ),
        CommandSpec::new(
            "pin",
            Some("leaderboard"),
            &[],
            "Ranks members by how many of their messages are pinned",
            pin::PinLeaderboard,
        ),
        CommandSpec::new(
            "poll",
            Some("react"),
            &[],
            "Adds reactions for pin showdown",
            general::PollReact,
        ),
        CommandSpec::new(
            "msg",
            Some("leaderboard"),
            &["search"],
            "Ranks members by messages matching a phrase (`raw <regex>` for a pattern)",
            msg::UserLeaderboard,
        ),
        CommandSpec::new(
            "msg",
            Some("match"),
            &["search"],
            "Lists the most common matches of a phrase (`raw <regex>` for a pattern)",
            msg::TokenLeaderboard,
        ),
        CommandSpec::new(
            "fg",
            Some("round"),
            &[],
            "Asks who made it through the round",
            general::FgRound,
        ),
        CommandSpec::new("fg", Some("dab"), &[], "Dabs", general::FgDab),
    ])
}
