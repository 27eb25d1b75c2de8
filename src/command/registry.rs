//! Command Registry
//!
//! The immutable table of commands the bot understands, and the two-phase
//! resolution from a parsed mention to one entry.

use super::handlers::Handler;
use super::parser::{DefaultSubCommands, ParsedCommand};
use crate::error::RegistryError;
use std::collections::HashSet;

/// One registered command.
pub struct CommandSpec {
    pub command: &'static str,
    pub sub_command: Option<&'static str>,
    /// Argument names, used for help text and argument-shift recovery.
    pub args: &'static [&'static str],
    pub help: &'static str,
    pub handler: Box<dyn Handler>,
}

impl CommandSpec {
    pub fn new(
        command: &'static str,
        sub_command: Option<&'static str>,
        args: &'static [&'static str],
        help: &'static str,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            command,
            sub_command,
            args,
            help,
            handler: Box::new(handler),
        }
    }

    fn declares_args(&self) -> bool {
        !self.args.is_empty()
    }

    /// Usage line as shown in help, e.g. `` `pin add <message_permalink>` ``.
    pub fn usage(&self) -> String {
        let mut usage = self.command.to_string();
        if let Some(sub) = self.sub_command {
            usage.push(' ');
            usage.push_str(sub);
        }
        for arg in self.args {
            usage.push_str(&format!(" <{}>", arg));
        }
        usage
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("usage", &self.usage())
            .finish_non_exhaustive()
    }
}

/// A spec chosen for a mention, with the command as it should be handed to
/// the handler (arguments may have been shifted).
#[derive(Debug)]
pub struct Resolved<'r> {
    pub spec: &'r CommandSpec,
    pub command: ParsedCommand,
}

/// Immutable set of [`CommandSpec`]s.
#[derive(Debug)]
pub struct Registry {
    specs: Vec<CommandSpec>,
}

impl Registry {
    /// Build the registry, rejecting two specs that could never be told apart.
    ///
    /// Specs are keyed by command, sub-command and whether they declare
    /// arguments, so `pin` and `pin <channel>` may coexist.
    pub fn new(specs: Vec<CommandSpec>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert((spec.command, spec.sub_command, spec.declares_args())) {
                return Err(RegistryError::Duplicate(spec.usage()));
            }
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }

    /// Resolve `parsed` to exactly one spec.
    ///
    /// First by exact `(command, sub-command)`, where an absent sub-command
    /// is its own key. Failing that, the sub-command token is retried as the
    /// first argument of a bare command that takes arguments.
    pub fn resolve(
        &self,
        parsed: &ParsedCommand,
        defaults: &DefaultSubCommands,
    ) -> Option<Resolved<'_>> {
        let sub = parsed.effective_sub_command(defaults);
        let exact: Vec<&CommandSpec> = self
            .specs
            .iter()
            .filter(|s| s.command == parsed.command() && s.sub_command == sub)
            .collect();

        match exact.as_slice() {
            [spec] => {
                return Some(Resolved {
                    spec: *spec,
                    command: parsed.clone(),
                });
            }
            [] => {}
            many => {
                let has_args = !parsed.arguments().is_empty();
                let narrowed: Vec<&&CommandSpec> = many
                    .iter()
                    .filter(|s| s.declares_args() == has_args)
                    .collect();
                return match narrowed.as_slice() {
                    [spec] => Some(Resolved {
                        spec: **spec,
                        command: parsed.clone(),
                    }),
                    _ => None,
                };
            }
        }

        self.resolve_shifted(parsed)
    }

    fn resolve_shifted(&self, parsed: &ParsedCommand) -> Option<Resolved<'_>> {
        let takes_args = self
            .specs
            .iter()
            .any(|s| s.command == parsed.command() && s.declares_args());
        if !takes_args {
            return None;
        }

        let shifted = parsed.shift_sub_command()?;
        let mut candidates = self.specs.iter().filter(|s| {
            s.command == shifted.command() && s.sub_command.is_none() && s.declares_args()
        });

        match (candidates.next(), candidates.next()) {
            (Some(spec), None) => Some(Resolved {
                spec,
                command: shifted,
            }),
            _ => None,
        }
    }

    /// One help line per spec, sorted by command then sub-command
    /// (absent first).
    pub fn help_text(&self) -> String {
        let mut specs: Vec<&CommandSpec> = self.specs.iter().collect();
        specs.sort_by(|a, b| {
            (a.command, a.sub_command, a.args).cmp(&(b.command, b.sub_command, b.args))
        });

        specs
            .iter()
            .map(|s| format!("`{}` - {}", s.usage(), s.help))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
