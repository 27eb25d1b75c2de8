//! Slack Web API client
//!
//! Posting, reactions and history go through slack-morphism's typed client.
//! `pins.list`, `users.list` and `conversations.list` are read as plain JSON
//! over reqwest since only a handful of fields are needed from each.

use super::{HistoryPage, Result, SlackApi, SlackChannel, SlackUser};
use crate::error::SlackError;
use async_trait::async_trait;
use serde_json::Value;
use slack_morphism::prelude::*;
use std::sync::Arc;

const SLACK_API_BASE: &str = "https://slack.com/api";
const HISTORY_PAGE_SIZE: u16 = 200;
const LIST_PAGE_SIZE: &str = "200";

/// [`SlackApi`] backed by a bot token.
pub struct SlackWebApi {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
    bot_token: String,
    http: reqwest::Client,
}

impl SlackWebApi {
    pub fn new(client: Arc<SlackHyperClient>, bot_token: String) -> Self {
        Self {
            client,
            token: SlackApiToken::new(SlackApiTokenValue::from(bot_token.clone())),
            bot_token,
            http: reqwest::Client::new(),
        }
    }

    /// Resolve the bot's own user ID via `auth.test`.
    pub async fn bot_user_id(&self) -> Result<String> {
        let session = self.client.open_session(&self.token);
        let resp = session
            .auth_test()
            .await
            .map_err(|e| SlackError::api("auth.test", e))?;
        Ok(resp.user_id.0)
    }

    /// GET a Web API method and check Slack's `ok` flag.
    async fn web_api_get(&self, method: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .http
            .get(format!("{SLACK_API_BASE}/{method}"))
            .bearer_auth(&self.bot_token)
            .query(query)
            .send()
            .await
            .map_err(|source| SlackError::Transport {
                method: method.to_string(),
                source,
            })?;

        let value: Value = response.json().await.map_err(|source| SlackError::Transport {
            method: method.to_string(),
            source,
        })?;

        if !value.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let code = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            return Err(SlackError::api(method, code));
        }
        Ok(value)
    }

    /// Follow `response_metadata.next_cursor` and collect `key` from every page.
    async fn web_api_list(
        &self,
        method: &str,
        key: &str,
        extra: &[(&str, &str)],
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut query: Vec<(&str, &str)> = vec![("limit", LIST_PAGE_SIZE)];
            query.extend_from_slice(extra);
            if !cursor.is_empty() {
                query.push(("cursor", &cursor));
            }

            let page = self.web_api_get(method, &query).await?;
            if let Some(Value::Array(page_items)) = page.get(key) {
                items.extend(page_items.iter().cloned());
            }

            let next = next_cursor(&page);
            match next {
                Some(next) => cursor = next,
                None => break,
            }
        }
        Ok(items)
    }
}

fn next_cursor(page: &Value) -> Option<String> {
    page.pointer("/response_metadata/next_cursor")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn user_from_json(value: &Value) -> Option<SlackUser> {
    Some(SlackUser {
        id: value.get("id")?.as_str()?.to_string(),
        name: value.get("name")?.as_str()?.to_string(),
        avatar_url: value
            .pointer("/profile/image_192")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn channel_from_json(value: &Value) -> Option<SlackChannel> {
    Some(SlackChannel {
        id: value.get("id")?.as_str()?.to_string(),
        name: value.get("name")?.as_str()?.to_string(),
    })
}

#[async_trait]
impl SlackApi for SlackWebApi {
    async fn post_message(&self, channel: &str, text: &str) -> Result<String> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId::new(channel.to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        )
        .with_unfurl_links(true)
        .with_unfurl_media(true);

        let resp = session
            .chat_post_message(&request)
            .await
            .map_err(|e| SlackError::api("chat.postMessage", e))?;
        Ok(resp.ts.0)
    }

    async fn post_blocks(&self, channel: &str, blocks: &[Value]) -> Result<String> {
        let blocks: Vec<SlackBlock> = serde_json::from_value(Value::Array(blocks.to_vec()))?;
        let session = self.client.open_session(&self.token);
        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId::new(channel.to_string()),
            SlackMessageContent::new().with_blocks(blocks),
        );

        let resp = session
            .chat_post_message(&request)
            .await
            .map_err(|e| SlackError::api("chat.postMessage", e))?;
        Ok(resp.ts.0)
    }

    async fn add_reaction(&self, channel: &str, ts: &str, name: &str) -> Result<()> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiReactionsAddRequest::new(
            SlackChannelId::new(channel.to_string()),
            SlackReactionName(name.to_string()),
            SlackTs(ts.to_string()),
        );
        session
            .reactions_add(&request)
            .await
            .map_err(|e| SlackError::api("reactions.add", e))?;
        Ok(())
    }

    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<Option<Value>> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiConversationsHistoryRequest::new()
            .with_channel(SlackChannelId::new(channel.to_string()))
            .with_oldest(SlackTs(ts.to_string()))
            .with_latest(SlackTs(ts.to_string()))
            .with_inclusive(true)
            .with_limit(1);

        let resp = session
            .conversations_history(&request)
            .await
            .map_err(|e| SlackError::api("conversations.history", e))?;

        resp.messages
            .first()
            .map(serde_json::to_value)
            .transpose()
            .map_err(SlackError::from)
    }

    async fn history_page(
        &self,
        channel: &str,
        oldest: &str,
        latest: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage> {
        let session = self.client.open_session(&self.token);
        let mut request = SlackApiConversationsHistoryRequest::new()
            .with_channel(SlackChannelId::new(channel.to_string()))
            .with_oldest(SlackTs(oldest.to_string()))
            .with_latest(SlackTs(latest.to_string()))
            .with_inclusive(true)
            .with_limit(HISTORY_PAGE_SIZE);
        if let Some(cursor) = cursor {
            request = request.with_cursor(SlackCursorId(cursor.to_string()));
        }

        let resp = session
            .conversations_history(&request)
            .await
            .map_err(|e| SlackError::api("conversations.history", e))?;

        let messages = resp
            .messages
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let next_cursor = resp
            .response_metadata
            .and_then(|meta| meta.next_cursor)
            .map(|c| c.0)
            .filter(|c| !c.is_empty());

        Ok(HistoryPage {
            messages,
            next_cursor,
        })
    }

    async fn list_pins(&self, channel: &str) -> Result<Vec<Value>> {
        let resp = self.web_api_get("pins.list", &[("channel", channel)]).await?;
        Ok(match resp.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        })
    }

    async fn list_users(&self) -> Result<Vec<SlackUser>> {
        let members = self.web_api_list("users.list", "members", &[]).await?;
        Ok(members.iter().filter_map(user_from_json).collect())
    }

    async fn list_channels(&self) -> Result<Vec<SlackChannel>> {
        let channels = self
            .web_api_list(
                "conversations.list",
                "channels",
                &[("types", "public_channel,private_channel")],
            )
            .await?;
        Ok(channels.iter().filter_map(channel_from_json).collect())
    }
}
