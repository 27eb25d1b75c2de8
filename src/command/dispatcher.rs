//! Command Dispatcher
//!
//! Resolves a parsed mention against the [`Registry`], runs the handler and
//! turns whatever it returned into exactly one chat message.

use super::CommandSettings;
use super::handlers::{CommandContext, Reply};
use super::parser::{DefaultSubCommands, ParsedCommand, parse};
use super::registry::Registry;
use crate::error::CommandError;
use crate::slack::{MentionEvent, SlackApi};
use crate::store::{MessageStore, PinStore};
use std::sync::Arc;

const WARNING: &str = ":warning:";
const INTERNAL_ERROR_TEXT: &str = ":warning: Something unexpected went wrong";

/// How one mention ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    UserError,
    InternalError,
}

/// Collaborators shared by every invocation.
#[derive(Clone)]
pub struct Services {
    pub slack: Arc<dyn SlackApi>,
    pub pins: Arc<dyn PinStore>,
    pub messages: Arc<dyn MessageStore>,
}

pub struct Dispatcher {
    registry: Registry,
    defaults: DefaultSubCommands,
    settings: CommandSettings,
    /// `<@U123>` for the bot itself, when known.
    bot_mention: Option<String>,
}

impl Dispatcher {
    pub fn new(registry: Registry, defaults: DefaultSubCommands, settings: CommandSettings) -> Self {
        Self {
            registry,
            defaults,
            settings,
            bot_mention: None,
        }
    }

    /// Only accept mentions of this user ID as the leading token.
    pub fn with_bot_user_id(mut self, bot_user_id: Option<&str>) -> Self {
        self.bot_mention = bot_user_id.map(|id| format!("<@{}>", id));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Parse the mention text and dispatch it.
    pub async fn handle_mention(&self, event: &MentionEvent, services: &Services) -> DispatchOutcome {
        match parse(&event.text, self.bot_mention.as_deref(), self.settings.case_fold) {
            Ok(parsed) => self.dispatch(&parsed, event, services).await,
            Err(e) => {
                tracing::warn!("Malformed command in {}: {}", event.channel, e);
                self.respond(
                    services,
                    event,
                    Reply::Message(format!("{} {}", WARNING, e)),
                    DispatchOutcome::UserError,
                )
                .await
            }
        }
    }

    pub async fn dispatch(
        &self,
        parsed: &ParsedCommand,
        event: &MentionEvent,
        services: &Services,
    ) -> DispatchOutcome {
        tracing::info!(
            "Received command `{}` in {} from {}",
            parsed.raw_text(),
            event.channel,
            event.user
        );

        let Some(resolved) = self.registry.resolve(parsed, &self.defaults) else {
            tracing::warn!("Unknown command `{}`", parsed.raw_text());
            let text = format!("{} Unknown command `{}`", WARNING, parsed.raw_text());
            return self
                .respond(services, event, Reply::Message(text), DispatchOutcome::UserError)
                .await;
        };

        let ctx = CommandContext {
            event,
            slack: services.slack.as_ref(),
            pins: services.pins.as_ref(),
            messages: services.messages.as_ref(),
            registry: &self.registry,
            settings: &self.settings,
        };

        match resolved.spec.handler.handle(&ctx, &resolved.command).await {
            Ok(reply) => {
                let outcome = self
                    .respond(services, event, reply, DispatchOutcome::Success)
                    .await;
                if outcome == DispatchOutcome::Success {
                    tracing::info!(
                        "Successfully processed command `{}`",
                        resolved.spec.usage()
                    );
                }
                outcome
            }
            Err(CommandError::User(message)) => {
                tracing::warn!("Command `{}` failed: {}", parsed.raw_text(), message);
                let text = format!("{} {}", WARNING, message);
                self.respond(services, event, Reply::Message(text), DispatchOutcome::UserError)
                    .await
            }
            Err(CommandError::Internal(e)) => {
                tracing::error!("Command `{}` failed: {:#}", parsed.raw_text(), e);
                self.respond(
                    services,
                    event,
                    Reply::Message(INTERNAL_ERROR_TEXT.to_string()),
                    DispatchOutcome::InternalError,
                )
                .await
            }
        }
    }

    /// Deliver `reply` to the mention's channel. A delivery failure turns
    /// the outcome into [`DispatchOutcome::InternalError`].
    async fn respond(
        &self,
        services: &Services,
        event: &MentionEvent,
        reply: Reply,
        outcome: DispatchOutcome,
    ) -> DispatchOutcome {
        let sent = match reply {
            Reply::Message(text) => services
                .slack
                .post_message(&event.channel, &text)
                .await
                .map(drop),
            Reply::Blocks(blocks) => services
                .slack
                .post_blocks(&event.channel, &blocks)
                .await
                .map(drop),
            Reply::Sent => Ok(()),
        };

        match sent {
            Ok(()) => outcome,
            Err(e) => {
                tracing::error!("Failed to deliver reply to {}: {}", event.channel, e);
                DispatchOutcome::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::builtin_registry;
    use crate::slack::testing::{FakeSlack, Sent};
    use crate::store::{ArchivedMessage, InsertOutcome, PinRecord, SqliteStore, UNKNOWN_USER};
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const BOT: &str = "UBOT";
    const CHANNEL: &str = "C0GENERAL";
    const LINK: &str = "https://team.slack.com/archives/C0RANDOM/p1612345678123456";
    /// Never equal to a ts handed out by `FakeSlack::post_message`.
    const MENTION_TS: &str = "1700000001.000009";

    struct Harness {
        _dir: TempDir,
        slack: Arc<FakeSlack>,
        store: Arc<SqliteStore>,
        services: Services,
        dispatcher: Dispatcher,
    }

    impl Harness {
        async fn new(slack: FakeSlack) -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(SqliteStore::connect(&dir.path().join("pinbot.db")).await.unwrap());
            let slack = Arc::new(slack);
            let services = Services {
                slack: slack.clone(),
                pins: store.clone(),
                messages: store.clone(),
            };
            let defaults =
                DefaultSubCommands::new(HashMap::from([("fg".to_string(), "round".to_string())]));
            let dispatcher = Dispatcher::new(
                builtin_registry().unwrap(),
                defaults,
                CommandSettings::default(),
            )
            .with_bot_user_id(Some(BOT));

            Self {
                _dir: dir,
                slack,
                store,
                services,
                dispatcher,
            }
        }

        async fn mention(&self, text: &str) -> DispatchOutcome {
            let event = MentionEvent {
                channel: CHANNEL.to_string(),
                user: "U0ASKER".to_string(),
                ts: MENTION_TS.to_string(),
                text: format!("<@{}> {}", BOT, text),
            };
            self.dispatcher.handle_mention(&event, &self.services).await
        }

        fn last_text(&self) -> String {
            self.slack.texts().pop().unwrap_or_default()
        }

        async fn seed_pin(&self, channel: &str, ts: &str, user: &str) {
            let record = PinRecord::new(
                channel,
                ts,
                json!({ "user": user, "text": format!("said by {}", user), "ts": ts }),
                format!("https://team.slack.com/archives/{}/p{}", channel, ts.replace('.', "")),
                "U0ASKER",
            );
            assert_eq!(self.store.insert(&record).await.unwrap(), InsertOutcome::Inserted);
        }

        async fn seed_messages(&self, rows: &[(&str, &str)]) {
            let messages: Vec<ArchivedMessage> = rows
                .iter()
                .enumerate()
                .map(|(i, (user, text))| ArchivedMessage {
                    timestamp: format!("16000000{:02}.000000", i),
                    channel_id: CHANNEL.to_string(),
                    channel_name: "general".to_string(),
                    user_id: format!("ID-{}", user),
                    user_name: user.to_string(),
                    text: text.to_string(),
                    permalink: String::new(),
                })
                .collect();
            self.store.insert_batch(&messages).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_help_lists_every_command() {
        let h = Harness::new(FakeSlack::new()).await;
        assert_eq!(h.mention("help").await, DispatchOutcome::Success);

        let text = h.last_text();
        assert!(text.starts_with("Here is everything I can do:\n`fg dab` - Dabs"));
        assert_eq!(text.lines().count(), 15);
    }

    #[tokio::test]
    async fn test_unknown_command_is_user_error() {
        let h = Harness::new(FakeSlack::new()).await;
        assert_eq!(h.mention("dance   now").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: Unknown command `dance now`");
    }

    #[tokio::test]
    async fn test_mention_not_first_is_malformed() {
        let h = Harness::new(FakeSlack::new()).await;
        let event = MentionEvent {
            channel: CHANNEL.to_string(),
            user: "U0ASKER".to_string(),
            ts: MENTION_TS.to_string(),
            text: format!("hey <@{}> help", BOT),
        };
        let outcome = h.dispatcher.handle_mention(&event, &h.services).await;
        assert_eq!(outcome, DispatchOutcome::UserError);
        assert_eq!(h.slack.texts().len(), 1);
        assert!(h.last_text().starts_with(":warning: "));
    }

    #[tokio::test]
    async fn test_pin_add_then_duplicate() {
        let slack = FakeSlack::new().with_message(
            "C0RANDOM",
            "1612345678.123456",
            json!({ "user": "U0ALICE", "text": "quotable", "ts": "1612345678.123456" }),
        );
        let h = Harness::new(slack).await;

        assert_eq!(h.mention(&format!("pin add <{}>", LINK)).await, DispatchOutcome::Success);
        assert_eq!(h.last_text(), ":white_check_mark: Successfully added pin");

        let stored = h.store.get("C0RANDOM", "1612345678.123456").await.unwrap().unwrap();
        assert_eq!(stored.message["text"], "quotable");
        assert_eq!(stored.created_by, "U0ASKER");
        assert_eq!(stored.permalink, LINK);

        assert_eq!(h.mention(&format!("pin add {}", LINK)).await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: Message is already pinned");
        assert_eq!(h.store.pin_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pin_add_falls_back_to_empty_payload() {
        let slack = FakeSlack {
            fail_reads: true,
            ..FakeSlack::new()
        };
        let h = Harness::new(slack).await;

        assert_eq!(h.mention(&format!("pin add {}", LINK)).await, DispatchOutcome::Success);
        let stored = h.store.get("C0RANDOM", "1612345678.123456").await.unwrap().unwrap();
        assert_eq!(stored.message, json!({}));
    }

    #[tokio::test]
    async fn test_pin_add_validation() {
        let h = Harness::new(FakeSlack::new()).await;

        assert_eq!(h.mention("pin add").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: Need a permalink to pin");

        assert_eq!(h.mention("pin add not-a-link").await, DispatchOutcome::UserError);
        assert_eq!(
            h.last_text(),
            ":warning: not-a-link does not seem like a valid permalink"
        );
    }

    #[tokio::test]
    async fn test_pin_remove() {
        let h = Harness::new(FakeSlack::new()).await;
        h.seed_pin("C0RANDOM", "1612345678.123456", "U0ALICE").await;

        assert_eq!(h.mention(&format!("pin remove {}", LINK)).await, DispatchOutcome::Success);
        assert_eq!(h.last_text(), ":white_check_mark: Successfully removed pin");

        assert_eq!(h.mention(&format!("pin remove {}", LINK)).await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: No matching pin found");

        assert_eq!(h.mention("pin remove junk").await, DispatchOutcome::UserError);
        assert_eq!(
            h.last_text(),
            ":warning: Message does not seem like a valid permalink"
        );
    }

    #[tokio::test]
    async fn test_random_pin_scoped_to_channel() {
        let h = Harness::new(FakeSlack::new()).await;

        assert_eq!(h.mention("pin").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: No pins found");

        h.seed_pin("C0OTHER", "1612345678.000001", "U0ALICE").await;
        assert_eq!(h.mention("pin").await, DispatchOutcome::UserError);

        assert_eq!(h.mention("pin any").await, DispatchOutcome::Success);
        assert!(h.last_text().contains("/archives/C0OTHER/"));

        h.seed_pin(CHANNEL, "1612345678.000002", "U0ALICE").await;
        assert_eq!(h.mention("pin").await, DispatchOutcome::Success);
        assert!(h.last_text().contains(&format!("/archives/{}/", CHANNEL)));
    }

    #[tokio::test]
    async fn test_pin_from_named_channel() {
        let slack = FakeSlack::new()
            .with_channel("C0OTHER", "other")
            .with_channel("C0EMPTY", "empty");
        let h = Harness::new(slack).await;
        h.seed_pin("C0OTHER", "1612345678.000001", "U0ALICE").await;

        assert_eq!(h.mention("pin <#C0OTHER|other>").await, DispatchOutcome::Success);
        assert!(h.last_text().contains("/archives/C0OTHER/"));

        assert_eq!(h.mention("pin <#C0EMPTY|empty>").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: No pins found");

        assert_eq!(h.mention("pin <#C0NOPE|nope>").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: Channel `<#C0NOPE|nope>` not found");
    }

    #[tokio::test]
    async fn test_pin_load_counts_added_and_ignored() {
        let mut slack = FakeSlack::new();
        slack.pins.insert(
            CHANNEL.to_string(),
            vec![
                json!({
                    "type": "message",
                    "message": {
                        "user": "U0ALICE",
                        "text": "one",
                        "permalink": format!("https://team.slack.com/archives/{}/p1612345678000001", CHANNEL)
                    }
                }),
                json!({
                    "type": "message",
                    "message": {
                        "user": "U0BOB",
                        "text": "two",
                        "permalink": format!("https://team.slack.com/archives/{}/p1612345678000002", CHANNEL)
                    }
                }),
                json!({ "type": "file_comment", "file_comment": {} }),
            ],
        );
        let h = Harness::new(slack).await;
        h.seed_pin(CHANNEL, "1612345678.000001", "U0ALICE").await;

        assert_eq!(h.mention("pin load").await, DispatchOutcome::Success);
        assert_eq!(
            h.last_text(),
            ":white_check_mark: Successfully loaded 1 pins and ignored 2 pins"
        );
        assert_eq!(h.store.pin_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_pin_leaderboard_uses_display_names() {
        let slack = FakeSlack::new()
            .with_user("U0ALICE", "alice")
            .with_user("U0BOB", "bob");
        let h = Harness::new(slack).await;
        h.seed_pin(CHANNEL, "1612345678.000001", "U0BOB").await;
        h.seed_pin(CHANNEL, "1612345678.000002", "U0ALICE").await;
        h.seed_pin(CHANNEL, "1612345678.000003", "U0ALICE").await;

        assert_eq!(h.mention("pin leaderboard").await, DispatchOutcome::Success);
        assert_eq!(
            h.last_text(),
            "*Most pinned members*\n1. alice - 2 pins\n2. bob - 1 pin"
        );
    }

    #[tokio::test]
    async fn test_pin_stats_posts_blocks() {
        let slack = FakeSlack::new()
            .with_user("U0ALICE", "alice")
            .with_user("U0BOB", "bob")
            .with_message(
                CHANNEL,
                "1612345678.000001",
                json!({ "user": "U0BOB", "reactions": [{ "name": "fire", "count": 7 }] }),
            );
        let h = Harness::new(slack).await;
        h.seed_pin(CHANNEL, "1612345678.000001", "U0BOB").await;
        h.seed_pin(CHANNEL, "1612345678.000002", "U0ALICE").await;
        h.seed_pin(CHANNEL, "1612345678.000003", "U0ALICE").await;

        assert_eq!(h.mention("pin stats").await, DispatchOutcome::Success);
        let blocks = h
            .slack
            .sent()
            .into_iter()
            .find_map(|s| match s {
                Sent::Blocks { blocks, .. } => Some(blocks),
                _ => None,
            })
            .unwrap();

        let texts: Vec<String> = blocks
            .iter()
            .filter_map(|b| b.pointer("/text/text").and_then(|t| t.as_str()))
            .map(str::to_string)
            .collect();
        assert_eq!(texts[0], "*Top Users:*");
        assert_eq!(texts[1], "alice\n2 pins");
        assert_eq!(texts[2], "bob\n1 pins");
        assert_eq!(texts[3], "*Top Reactions:*");
        assert!(texts[4].starts_with("bob\n7 reactions"));
        assert_eq!(blocks[2]["accessory"]["image_url"], "https://avatars/alice.png");
    }

    #[tokio::test]
    async fn test_pin_stats_without_pins() {
        let h = Harness::new(FakeSlack::new()).await;
        assert_eq!(h.mention("pin stats").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: No pins found");
    }

    #[tokio::test]
    async fn test_msg_leaderboard() {
        let h = Harness::new(FakeSlack::new()).await;
        h.seed_messages(&[
            ("alice", "Go team"),
            ("bob", "gopher"),
            ("alice", "let's go"),
            ("bob", "go go"),
            (UNKNOWN_USER, "go"),
        ])
        .await;

        assert_eq!(h.mention("msg leaderboard go").await, DispatchOutcome::Success);
        assert_eq!(
            h.last_text(),
            "*Messages matching `\\bgo\\b`*\n1. alice - 2 messages\n2. bob - 1 message"
        );
    }

    #[tokio::test]
    async fn test_msg_match_raw_pattern() {
        let h = Harness::new(FakeSlack::new()).await;
        h.seed_messages(&[("alice", "gooo go"), ("bob", "GOOO")]).await;

        assert_eq!(h.mention("msg match raw go+").await, DispatchOutcome::Success);
        assert_eq!(
            h.last_text(),
            "*Most common matches for `go+`*\n1. gooo - 2 times\n2. go - 1 time"
        );
    }

    #[tokio::test]
    async fn test_msg_no_matches_and_bad_pattern() {
        let h = Harness::new(FakeSlack::new()).await;
        h.seed_messages(&[("alice", "hello")]).await;

        assert_eq!(h.mention("msg match nothing").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: No messages match `\\bnothing\\b`");

        assert_eq!(h.mention("msg match raw (oops").await, DispatchOutcome::UserError);
        assert!(h.last_text().starts_with(":warning: `(oops` is not a valid pattern"));
    }

    #[tokio::test]
    async fn test_poll_react_adds_ballot_reactions() {
        let h = Harness::new(FakeSlack::new()).await;
        assert_eq!(h.mention("poll react").await, DispatchOutcome::Success);

        let reactions: Vec<String> = h
            .slack
            .sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Reaction { ts, name, .. } => {
                    assert_eq!(ts, MENTION_TS);
                    Some(name)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            reactions,
            vec!["one", "two", "wastebasket", "put_litter_in_its_place"]
        );
        assert_eq!(h.slack.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_fg_defaults_to_round() {
        let h = Harness::new(FakeSlack::new()).await;
        assert_eq!(h.mention("fg").await, DispatchOutcome::Success);

        let sent = h.slack.sent();
        assert_eq!(
            sent[0],
            Sent::Text {
                channel: CHANNEL.to_string(),
                text: "Did you make it through this round?".to_string(),
            }
        );
        // Reactions go on the posted question, not on the mention.
        let question_ts = "1700000000.000001";
        assert_ne!(question_ts, MENTION_TS);
        assert_eq!(
            sent[1..],
            [
                Sent::Reaction {
                    channel: CHANNEL.to_string(),
                    ts: question_ts.to_string(),
                    name: "heavy_check_mark".to_string(),
                },
                Sent::Reaction {
                    channel: CHANNEL.to_string(),
                    ts: question_ts.to_string(),
                    name: "x".to_string(),
                },
            ]
        );

        assert_eq!(h.mention("FG DAB").await, DispatchOutcome::Success);
        assert_eq!(h.last_text(), ":fgdab:");
    }

    #[tokio::test]
    async fn test_fg_round_reaction_failure_posts_once() {
        let slack = FakeSlack {
            fail_reactions: true,
            ..FakeSlack::new()
        };
        let h = Harness::new(slack).await;

        assert_eq!(h.mention("fg").await, DispatchOutcome::Success);
        assert_eq!(
            h.slack.texts(),
            vec!["Did you make it through this round?".to_string()]
        );
    }

    #[tokio::test]
    async fn test_msg_leaderboard_only_unknown_authors() {
        let h = Harness::new(FakeSlack::new()).await;
        h.seed_messages(&[(UNKNOWN_USER, "go"), (UNKNOWN_USER, "go go"), ("alice", "stop")])
            .await;

        assert_eq!(h.mention("msg leaderboard go").await, DispatchOutcome::UserError);
        assert_eq!(h.last_text(), ":warning: No messages match `\\bgo\\b`");
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let h = Harness::new(FakeSlack::new()).await;
        sqlx::query("DROP TABLE pins")
            .execute(h.store.pool())
            .await
            .unwrap();

        assert_eq!(h.mention("pin any").await, DispatchOutcome::InternalError);
        assert_eq!(h.last_text(), INTERNAL_ERROR_TEXT);
    }
}
