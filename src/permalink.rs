//! Slack Permalinks
//!
//! Parses message permalinks of the form
//! `https://<server>.slack.com/archives/<channel>/p<16 digits>` and rebuilds
//! the message timestamp they encode. Slack wraps links in `<...>` (and may
//! append `|label` or a `?thread_ts=` query), so both are tolerated.

use once_cell::sync::Lazy;
use regex::Regex;

static PERMALINK_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^<?https://([^/\s]+)\.slack\.com/archives/([^/\s|>]+?)/p(\d{16})(?:\D|$)").ok()
});

static TIMESTAMP_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\d{10}\.\d{6}$").ok());

/// Number of digits after the decimal point in a Slack timestamp.
const FRACTION_DIGITS: usize = 6;

/// A parsed message permalink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink {
    raw: String,
    server: String,
    channel: String,
    timestamp: String,
}

impl Permalink {
    /// Parse a permalink out of `text`. Returns `None` when `text` is not a
    /// message permalink; that is a normal outcome, not an error.
    pub fn parse(text: &str) -> Option<Self> {
        let re = PERMALINK_RE.as_ref()?;
        let caps = re.captures(text.trim())?;
        let digits = caps.get(3)?.as_str();
        let split = digits.len() - FRACTION_DIGITS;

        Some(Self {
            raw: text.to_string(),
            server: caps.get(1)?.as_str().to_string(),
            channel: caps.get(2)?.as_str().to_string(),
            timestamp: format!("{}.{}", &digits[..split], &digits[split..]),
        })
    }

    /// The text this permalink was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Message timestamp, `dddddddddd.dddddd`.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The 16-digit segment the timestamp was decoded from.
    pub fn timestamp_digits(&self) -> String {
        self.timestamp.replace('.', "")
    }

    /// Canonical URL without angle brackets, labels or query strings.
    pub fn url(&self) -> String {
        format!(
            "https://{}.slack.com/archives/{}/p{}",
            self.server,
            self.channel,
            self.timestamp_digits()
        )
    }
}

/// Build a permalink for `ts` in `channel` below `base_url`
/// (e.g. `https://team.slack.com/archives`).
pub fn encode(base_url: &str, channel: &str, ts: &str) -> String {
    format!(
        "{}/{}/p{}",
        base_url.trim_end_matches('/'),
        channel,
        ts.replace('.', "")
    )
}

/// Whether `ts` has the `dddddddddd.dddddd` shape of a message timestamp.
pub fn is_valid_timestamp(ts: &str) -> bool {
    TIMESTAMP_RE.as_ref().is_some_and(|re| re.is_match(ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LINK: &str = "https://sttgaming.slack.com/archives/C019Q7SNA5N/p1612345678123456";

    #[test]
    fn test_parse_plain_link() {
        let link = Permalink::parse(LINK).unwrap();
        assert_eq!(link.server(), "sttgaming");
        assert_eq!(link.channel(), "C019Q7SNA5N");
        assert_eq!(link.timestamp(), "1612345678.123456");
        assert_eq!(link.raw(), LINK);
    }

    #[test]
    fn test_parse_wrapped_link() {
        let wrapped = format!("<{}>", LINK);
        let link = Permalink::parse(&wrapped).unwrap();
        assert_eq!(link.channel(), "C019Q7SNA5N");
        assert_eq!(link.url(), LINK);
    }

    #[test]
    fn test_parse_link_with_label_and_thread_query() {
        let labelled = format!("<{}?thread_ts=1612345678.000100|that message>", LINK);
        let link = Permalink::parse(&labelled).unwrap();
        assert_eq!(link.timestamp(), "1612345678.123456");
        assert_eq!(link.url(), LINK);
    }

    #[test]
    fn test_parse_rejects_non_links() {
        assert!(Permalink::parse("hello").is_none());
        assert!(Permalink::parse("").is_none());
        assert!(Permalink::parse("https://example.com/archives/C1/p1612345678123456").is_none());
        // Only 15 digits
        assert!(Permalink::parse("https://a.slack.com/archives/C1/p161234567812345").is_none());
        // 17 digits is not a truncated 16
        assert!(Permalink::parse("https://a.slack.com/archives/C1/p16123456781234567").is_none());
        assert!(Permalink::parse("http://a.slack.com/archives/C1/p1612345678123456").is_none());
    }

    #[test]
    fn test_encode_matches_parse() {
        let url = encode("https://sttgaming.slack.com/archives/", "C019Q7SNA5N", "1612345678.123456");
        assert_eq!(url, LINK);
    }

    #[test]
    fn test_is_valid_timestamp() {
        assert!(is_valid_timestamp("1612345678.123456"));
        assert!(!is_valid_timestamp("161234567.123456"));
        assert!(!is_valid_timestamp("1612345678123456"));
        assert!(!is_valid_timestamp("1612345678.12345"));
    }

    proptest! {
        #[test]
        fn prop_timestamp_round_trips(digits in "[0-9]{16}", channel in "[A-Z0-9]{9,11}") {
            let text = format!("https://team.slack.com/archives/{}/p{}", channel, digits);
            let link = Permalink::parse(&text).unwrap();
            prop_assert_eq!(link.timestamp(), format!("{}.{}", &digits[..10], &digits[10..]));
            prop_assert_eq!(link.timestamp_digits(), digits);
            prop_assert!(is_valid_timestamp(link.timestamp()));
            prop_assert_eq!(link.url(), text);
        }
    }
}
