//! Slack Mention Handler
//!
//! Turns `app_mention` push events into [`MentionEvent`]s and hands each one
//! to the dispatcher on its own task.
//!
//! Uses a module-level static for handler state because slack-morphism's
//! Socket Mode callbacks require plain function pointers (not closures).

use super::MentionEvent;
use crate::command::{Dispatcher, Services};
use crate::utils::preview;
use slack_morphism::prelude::*;
use std::sync::{Arc, OnceLock};

/// Global handler state, set once by [`super::SlackBot`] before listening.
pub static HANDLER_STATE: OnceLock<Arc<HandlerState>> = OnceLock::new();

pub struct HandlerState {
    pub dispatcher: Arc<Dispatcher>,
    pub services: Services,
    pub bot_user_id: Option<String>,
}

impl HandlerState {
    /// Mentions written by the bot itself are never commands.
    fn is_own_message(&self, user: &str) -> bool {
        self.bot_user_id.as_deref() == Some(user)
    }
}

/// Socket Mode push event callback (function pointer, required by slack-morphism).
pub async fn on_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match event.event {
        SlackEventCallbackBody::AppMention(mention) => handle_mention(&mention),
        _ => {
            tracing::debug!("Slack: unhandled event type");
        }
    }
    Ok(())
}

/// Socket Mode error handler.
pub fn on_error(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::error!("Slack: socket mode error: {}", err);
    HttpStatusCode::OK
}

fn mention_event(mention: &SlackAppMentionEvent) -> Option<MentionEvent> {
    let text = mention.content.text.clone().filter(|t| !t.is_empty())?;
    Some(MentionEvent {
        channel: mention.channel.to_string(),
        user: mention.user.to_string(),
        ts: mention.origin.ts.0.clone(),
        text,
    })
}

fn handle_mention(mention: &SlackAppMentionEvent) {
    let Some(state) = HANDLER_STATE.get().cloned() else {
        tracing::error!("Slack: handler state not initialized");
        return;
    };

    let Some(event) = mention_event(mention) else {
        tracing::debug!("Slack: ignoring mention without text");
        return;
    };

    if state.is_own_message(&event.user) {
        tracing::debug!("Slack: ignoring own mention in {}", event.channel);
        return;
    }

    tracing::debug!(
        "Slack: mention from {} in {}: {}",
        event.user,
        event.channel,
        preview(&event.text, 80)
    );

    tokio::spawn(async move {
        let outcome = state.dispatcher.handle_mention(&event, &state.services).await;
        tracing::debug!("Slack: mention {} finished as {:?}", event.ts, outcome);
    });
}
