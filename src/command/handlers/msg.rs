//! `msg` commands: leaderboards over the archived message corpus.

use super::{CommandContext, Handler, Reply};
use crate::command::parser::ParsedCommand;
use crate::error::CommandError;
use crate::leaderboard::{self, compose_pattern};
use crate::store::ArchivedMessage;
use async_trait::async_trait;
use regex::Regex;

async fn search(
    ctx: &CommandContext<'_>,
    command: &ParsedCommand,
) -> Result<(Regex, Vec<ArchivedMessage>), CommandError> {
    let pattern = compose_pattern(command.arguments(), ctx.settings.case_insensitive_search)?;
    let corpus = ctx.messages.search(&pattern).await?;
    tracing::debug!("Pattern `{}` matched {} messages", pattern, corpus.len());
    Ok((pattern, corpus))
}

fn no_matches(pattern: &Regex) -> CommandError {
    CommandError::user(format!("No messages match `{}`", pattern))
}

/// Members ranked by how many of their messages match.
pub struct UserLeaderboard;

#[async_trait]
impl Handler for UserLeaderboard {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let (pattern, corpus) = search(ctx, command).await?;
        let ranked =
            leaderboard::count_by_user(&pattern, &corpus).ok_or_else(|| no_matches(&pattern))?;

        Ok(Reply::Message(leaderboard::render(
            &format!("Messages matching `{}`", pattern),
            &ranked,
            "messages",
        )))
    }
}

/// The most common matched substrings.
pub struct TokenLeaderboard;

#[async_trait]
impl Handler for TokenLeaderboard {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let (pattern, corpus) = search(ctx, command).await?;
        let ranked =
            leaderboard::count_by_token(&pattern, &corpus).ok_or_else(|| no_matches(&pattern))?;

        Ok(Reply::Message(leaderboard::render(
            &format!("Most common matches for `{}`", pattern),
            &ranked,
            "times",
        )))
    }
}
