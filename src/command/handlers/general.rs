use super::{CommandContext, Handler, Reply};
use crate::command::parser::ParsedCommand;
use crate::error::CommandError;
use async_trait::async_trait;

/// Reactions added by `poll react`, in order.
const POLL_REACTIONS: [&str; 4] = ["one", "two", "wastebasket", "put_litter_in_its_place"];

const ROUND_QUESTION: &str = "Did you make it through this round?";
const ROUND_REACTIONS: [&str; 2] = ["heavy_check_mark", "x"];

pub struct Help;

#[async_trait]
impl Handler for Help {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        Ok(Reply::Message(format!(
            "Here is everything I can do:\n{}",
            ctx.registry.help_text()
        )))
    }
}

/// Reacts to the requesting message so it can be used as a ballot.
pub struct PollReact;

#[async_trait]
impl Handler for PollReact {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        for name in POLL_REACTIONS {
            ctx.slack
                .add_reaction(&ctx.event.channel, &ctx.event.ts, name)
                .await?;
        }
        Ok(Reply::Message("Poll is open, vote away".to_string()))
    }
}

pub struct FgRound;

#[async_trait]
impl Handler for FgRound {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        let ts = ctx
            .slack
            .post_message(&ctx.event.channel, ROUND_QUESTION)
            .await?;
        // The question is already out; a missing reaction must not add a second reply.
        for name in ROUND_REACTIONS {
            if let Err(e) = ctx.slack.add_reaction(&ctx.event.channel, &ts, name).await {
                tracing::error!("Failed to add :{}: to round question {}: {}", name, ts, e);
            }
        }
        Ok(Reply::Sent)
    }
}

pub struct FgDab;

#[async_trait]
impl Handler for FgDab {
    async fn handle(
        &self,
        _ctx: &CommandContext<'_>,
        _command: &ParsedCommand,
    ) -> Result<Reply, CommandError> {
        Ok(Reply::Message(":fgdab:".to_string()))
    }
}
