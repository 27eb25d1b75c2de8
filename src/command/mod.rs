//! Mention Commands
//!
//! Parsing a mention into a command, resolving it against the registry and
//! running the matching handler.

pub mod dispatcher;
pub mod handlers;
pub mod parser;
pub mod registry;

pub use dispatcher::{DispatchOutcome, Dispatcher, Services};
pub use handlers::{CommandContext, Handler, Reply, builtin_registry};
pub use parser::{DefaultSubCommands, ParsedCommand, parse};
pub use registry::{CommandSpec, Registry, Resolved};

/// Behavior switches shared by the parser and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSettings {
    /// Lower-case command and sub-command tokens before matching.
    pub case_fold: bool,
    /// Leaderboard searches ignore case.
    pub case_insensitive_search: bool,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            case_fold: true,
            case_insensitive_search: true,
        }
    }
}
