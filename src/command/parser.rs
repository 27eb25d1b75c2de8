//! Mention Parser
//!
//! Turns `<@BOT> command sub-command arg1 arg2 ...` into a [`ParsedCommand`].
//! Tokenization is a plain whitespace split; there is no quoting.

use crate::error::ParseError;
use std::collections::HashMap;

/// A command extracted from one mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    raw_text: String,
    command: String,
    sub_command: Option<String>,
    /// The sub-command token as typed, kept so it can be shifted into
    /// `arguments` without losing its case.
    sub_token: Option<String>,
    arguments: Vec<String>,
}

impl ParsedCommand {
    /// Tokens after the mention, joined by single spaces.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn sub_command(&self) -> Option<&str> {
        self.sub_command.as_deref()
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// The sub-command, falling back to the default registered for this
    /// command when none was typed.
    pub fn effective_sub_command<'a>(&'a self, defaults: &'a DefaultSubCommands) -> Option<&'a str> {
        self.sub_command()
            .or_else(|| defaults.get(&self.command))
    }

    /// Reinterpret the sub-command token as the first argument.
    ///
    /// Returns `None` when there is no sub-command to shift.
    pub fn shift_sub_command(&self) -> Option<Self> {
        let token = self.sub_token.clone()?;
        let mut arguments = Vec::with_capacity(self.arguments.len() + 1);
        arguments.push(token);
        arguments.extend(self.arguments.iter().cloned());

        Some(Self {
            raw_text: self.raw_text.clone(),
            command: self.command.clone(),
            sub_command: None,
            sub_token: None,
            arguments,
        })
    }
}

/// Implied sub-commands for commands typed without one, e.g. `fg` → `round`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSubCommands(HashMap<String, String>);

impl DefaultSubCommands {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self(
            map.into_iter()
                .map(|(cmd, sub)| (cmd.to_lowercase(), sub.to_lowercase()))
                .collect(),
        )
    }

    pub fn get(&self, command: &str) -> Option<&str> {
        self.0.get(command).map(String::as_str)
    }
}

/// Parse `text` as a command addressed to `bot_mention` (`<@U123>`).
///
/// With `bot_mention` unset, any leading user mention is accepted.
/// With `case_fold`, the command and sub-command are lower-cased; arguments
/// always keep their original case.
pub fn parse(
    text: &str,
    bot_mention: Option<&str>,
    case_fold: bool,
) -> Result<ParsedCommand, ParseError> {
    let mut words = text.split_whitespace();

    let first = words.next().ok_or(ParseError::BotNotMentioned)?;
    let mentioned = match bot_mention {
        Some(mention) => first == mention,
        None => first.starts_with("<@") && first.ends_with('>'),
    };
    if !mentioned {
        return Err(ParseError::BotNotMentioned);
    }

    let words: Vec<&str> = words.collect();
    let (command, rest) = words.split_first().ok_or(ParseError::MissingCommand)?;

    let fold = |word: &str| {
        if case_fold {
            word.to_lowercase()
        } else {
            word.to_string()
        }
    };

    let sub_token = rest.first().map(|w| w.to_string());
    let arguments = rest.iter().skip(1).map(|w| w.to_string()).collect();

    Ok(ParsedCommand {
        raw_text: words.join(" "),
        command: fold(*command),
        sub_command: sub_token.as_deref().map(fold),
        sub_token,
        arguments,
    })
}
