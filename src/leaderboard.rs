//! Message Leaderboards
//!
//! Ranked frequency tables over archived message text: how many matching
//! messages each user wrote, or which matched substrings occur most often.
//! Both return `None` when there is nothing to rank, so callers can say
//! "no matches" instead of showing an empty table.

use crate::error::CommandError;
use crate::store::{ArchivedMessage, UNKNOWN_USER};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// Entries shown by the token leaderboard.
pub const TOKEN_LIMIT: usize = 10;

/// Leading argument that passes the rest of the search through as a regex.
pub const RAW_PREFIX: &str = "raw";

/// Build the search pattern from command arguments.
///
/// `raw <regex...>` uses the remaining text verbatim. Anything else is
/// treated as a literal phrase and must match on word boundaries.
pub fn compose_pattern(args: &[String], case_insensitive: bool) -> Result<Regex, CommandError> {
    let source = match args.split_first() {
        Some((first, rest)) if first == RAW_PREFIX => rest.join(" "),
        _ => {
            let phrase = args.join(" ");
            if phrase.is_empty() {
                String::new()
            } else {
                format!(r"\b{}\b", regex::escape(&phrase))
            }
        }
    };

    if source.is_empty() {
        return Err(CommandError::user("Need something to search for"));
    }

    RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| CommandError::user(format!("`{}` is not a valid pattern: {}", source, e)))
}

/// Counts in first-seen order.
#[derive(Default)]
struct Tally {
    index: HashMap<String, usize>,
    counts: Vec<(String, usize)>,
}

impl Tally {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.counts.len());
                self.counts.push((key.to_string(), 1));
            }
        }
    }

    /// Descending by count; ties keep first-seen order.
    fn ranked(mut self) -> Vec<(String, usize)> {
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts
    }
}

/// Count occurrences of each key, most frequent first, ties in first-seen order.
pub fn rank<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut tally = Tally::default();
    for key in keys {
        tally.add(key);
    }
    tally.ranked()
}

/// Number of matching messages per author, most first. Messages by
/// [`UNKNOWN_USER`] never count, so a pattern only they matched is `None`.
pub fn count_by_user(pattern: &Regex, corpus: &[ArchivedMessage]) -> Option<Vec<(String, usize)>> {
    let mut tally = Tally::default();

    for message in corpus
        .iter()
        .filter(|m| m.user_name != UNKNOWN_USER && pattern.is_match(&m.text))
    {
        tally.add(&message.user_name);
    }

    if tally.counts.is_empty() {
        return None;
    }
    Some(tally.ranked())
}

/// The [`TOKEN_LIMIT`] most frequent matched substrings, lower-cased.
/// Every non-overlapping match in every message counts.
pub fn count_by_token(pattern: &Regex, corpus: &[ArchivedMessage]) -> Option<Vec<(String, usize)>> {
    let mut tally = Tally::default();

    for message in corpus {
        for found in pattern.find_iter(&message.text) {
            tally.add(&found.as_str().to_lowercase());
        }
    }

    if tally.counts.is_empty() {
        return None;
    }

    let mut ranked = tally.ranked();
    ranked.truncate(TOKEN_LIMIT);
    Some(ranked)
}

/// Render a leaderboard as numbered chat lines under `title`.
pub fn render(title: &str, entries: &[(String, usize)], unit: &str) -> String {
    let mut out = format!("*{}*", title);
    for (rank, (name, count)) in entries.iter().enumerate() {
        let unit = if *count == 1 {
            unit.trim_end_matches('s')
        } else {
            unit
        };
        out.push_str(&format!("\n{}. {} - {} {}", rank + 1, name, count, unit));
    }
    out
}
