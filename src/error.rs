//! Error Types
//!
//! Error taxonomy shared by the command pipeline and its collaborators.
//! Application-level code (CLI, startup, config) uses `anyhow` instead.

use thiserror::Error;

/// The mention text could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Commands must start by mentioning me, e.g. `@pinbot help`")]
    BotNotMentioned,

    #[error("I need a command after the mention. Try `help`")]
    MissingCommand,
}

/// The command registry is inconsistent. Raised once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate command registration for `{0}`")]
    Duplicate(String),
}

/// Outcome of a failed handler invocation.
///
/// `User` errors are expected business-rule violations shown to the requester;
/// `Internal` errors are faults whose detail only reaches the logs.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    User(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CommandError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<SlackError> for CommandError {
    fn from(err: SlackError) -> Self {
        Self::Internal(err.into())
    }
}

/// Failure in the local pin/message store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored message payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Failure talking to the Slack Web API.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("Slack API `{method}` failed: {message}")]
    Api { method: String, message: String },

    #[error("Slack API `{method}` transport error: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Slack returned blocks that could not be decoded: {0}")]
    Blocks(#[from] serde_json::Error),
}

impl SlackError {
    pub fn api(method: &str, message: impl ToString) -> Self {
        Self::Api {
            method: method.to_string(),
            message: message.to_string(),
        }
    }
}
