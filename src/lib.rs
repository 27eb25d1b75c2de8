//! pinbot - Slack pin keeper and message leaderboards
//!
//! A Slack bot that answers `@pinbot` mentions: it bookmarks messages as
//! pins, serves random pins back, and ranks members by how often their
//! archived messages match a phrase or pattern.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a default config to ~/.config/pinbot/config.toml
//! pinbot init
//!
//! # Import a workspace export, then run the bot
//! pinbot load ./slack-export
//! pinbot
//! ```

pub mod archive;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod logging;
pub mod permalink;
pub mod slack;
pub mod store;
pub mod utils;

pub use error::{CommandError, ParseError, RegistryError, SlackError, StoreError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
