//! Slack Bot
//!
//! Connection setup and the Socket Mode listener. Socket Mode needs no
//! public HTTPS endpoint; `app_mention` events arrive over a WebSocket.

use super::handler;
use super::web::SlackWebApi;
use crate::command::{Dispatcher, Services};
use slack_morphism::prelude::*;
use std::sync::Arc;

pub struct SlackBot {
    client: Arc<SlackHyperClient>,
    api: Arc<SlackWebApi>,
    app_token: String,
}

impl SlackBot {
    /// Build the HTTP client. Nothing is sent to Slack yet.
    pub fn new(bot_token: String, app_token: String) -> anyhow::Result<Self> {
        let connector = SlackClientHyperConnector::new()
            .map_err(|e| anyhow::anyhow!("failed to create Slack HTTP connector: {}", e))?;
        let client = Arc::new(SlackClient::new(connector));
        let api = Arc::new(SlackWebApi::new(client.clone(), bot_token));

        Ok(Self {
            client,
            api,
            app_token,
        })
    }

    /// The Web API client, for handlers and archive jobs.
    pub fn api(&self) -> Arc<SlackWebApi> {
        self.api.clone()
    }

    /// The bot's user ID: the configured one, else `auth.test`.
    ///
    /// `None` disables strict mention matching; any leading mention is
    /// then treated as addressed to the bot.
    pub async fn resolve_bot_user_id(&self, configured: Option<String>) -> Option<String> {
        if let Some(id) = configured.filter(|id| !id.is_empty()) {
            return Some(id);
        }
        match self.api.bot_user_id().await {
            Ok(id) => {
                tracing::info!("Slack: bot user ID is {}", id);
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Slack: auth.test failed, accepting any leading mention: {}", e);
                None
            }
        }
    }

    /// Start listening as a background task. Returns a JoinHandle.
    pub fn start(
        self,
        dispatcher: Dispatcher,
        services: Services,
        bot_user_id: Option<String>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "Starting Slack bot via Socket Mode with {} commands",
                dispatcher.registry().specs().len()
            );

            // One Slack listener per process
            let state = handler::HandlerState {
                dispatcher: Arc::new(dispatcher),
                services,
                bot_user_id,
            };
            handler::HANDLER_STATE
                .set(Arc::new(state))
                .unwrap_or_else(|_| {
                    tracing::warn!("Slack: handler state already initialized");
                });

            let socket_mode_callbacks =
                SlackSocketModeListenerCallbacks::new().with_push_events(handler::on_push_event);

            let listener_environment = Arc::new(
                SlackClientEventsListenerEnvironment::new(self.client.clone())
                    .with_error_handler(handler::on_error),
            );

            let socket_mode_listener = SlackClientSocketModeListener::new(
                &SlackClientSocketModeConfig::new(),
                listener_environment,
                socket_mode_callbacks,
            );

            let app_token = SlackApiToken::new(SlackApiTokenValue::from(self.app_token));

            tracing::info!("Slack: connecting via Socket Mode...");
            if let Err(e) = socket_mode_listener.listen_for(&app_token).await {
                tracing::error!("Slack: failed to connect Socket Mode: {}", e);
                return;
            }
            tracing::info!("Slack: Socket Mode connected");

            socket_mode_listener.serve().await;
        })
    }
}
