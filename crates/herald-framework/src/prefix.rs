//! Command prefix matching.
//!
//! A message is an invocation if it starts with a mention of the bot
//! (`<@id>` or `<@!id>`) or with one of the configured prefixes. The mention
//! is tried first, then the prefixes in configuration order; the first match
//! wins, so `"!"` listed before `"!!"` shadows it.

use herald_core::UserId;

/// The result of stripping a prefix from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stripped<'a> {
    /// The prefix as written in the message.
    pub prefix: &'a str,
    /// The invoke text, leading whitespace removed.
    pub invoke: &'a str,
}

/// Recognises command prefixes.
#[derive(Debug, Clone, Default)]
pub struct PrefixMatcher {
    prefixes: Vec<String>,
    mention: bool,
}

impl PrefixMatcher {
    /// Creates a matcher for `prefixes`. Empty prefixes are ignored.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
            mention: true,
        }
    }

    /// Whether a mention of the bot counts as a prefix. Enabled by default.
    pub fn mention(mut self, enabled: bool) -> Self {
        self.mention = enabled;
        self
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Strips the first matching prefix from `content`.
    ///
    /// Returns `None` if no prefix matches or nothing follows the prefix.
    pub fn strip<'a>(&self, content: &'a str, bot_id: UserId) -> Option<Stripped<'a>> {
        let content = content.trim_start();

        let matched = self
            .mention
            .then(|| strip_mention(content, bot_id))
            .flatten()
            .or_else(|| {
                self.prefixes
                    .iter()
                    .find(|prefix| content.starts_with(prefix.as_str()))
                    .map(|prefix| content.split_at(prefix.len()))
            })?;

        let (prefix, rest) = matched;
        let invoke = rest.trim_start();
        if invoke.is_empty() {
            return None;
        }
        Some(Stripped { prefix, invoke })
    }
}

/// Splits a leading `<@id>` or `<@!id>` mention off `content`.
fn strip_mention(content: &str, bot_id: UserId) -> Option<(&str, &str)> {
    let inner = content.strip_prefix("<@")?;
    let inner = inner.strip_prefix('!').unwrap_or(inner);
    let end = inner.find('>')?;
    let id: u64 = inner[..end].parse().ok()?;
    if id != bot_id.get() {
        return None;
    }
    let len = content.len() - inner.len() + end + 1;
    Some(content.split_at(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: UserId = UserId(42);

    #[test]
    fn test_configured_prefixes() {
        let matcher = PrefixMatcher::new(["!", "?"]);
        assert_eq!(
            matcher.strip("!ping", BOT),
            Some(Stripped {
                prefix: "!",
                invoke: "ping"
            })
        );
        assert_eq!(matcher.strip("  ? help me", BOT).unwrap().invoke, "help me");
        assert_eq!(matcher.strip("ping", BOT), None);
        assert_eq!(matcher.strip("!", BOT), None);
        assert_eq!(matcher.strip("!   ", BOT), None);
    }

    #[test]
    fn test_first_match_wins() {
        let matcher = PrefixMatcher::new(["!", "!!"]);
        assert_eq!(matcher.strip("!!ping", BOT).unwrap().invoke, "!ping");

        let matcher = PrefixMatcher::new(["!!", "!"]);
        assert_eq!(matcher.strip("!!ping", BOT).unwrap().invoke, "ping");
    }

    #[test]
    fn test_mentions() {
        let matcher = PrefixMatcher::new(["!"]);
        let stripped = matcher.strip("<@42> ping", BOT).unwrap();
        assert_eq!(stripped.prefix, "<@42>");
        assert_eq!(stripped.invoke, "ping");
        assert_eq!(matcher.strip("<@!42>ping", BOT).unwrap().prefix, "<@!42>");

        assert_eq!(matcher.strip("<@43> ping", BOT), None);
        assert_eq!(matcher.strip("<@42", BOT), None);
        assert_eq!(matcher.strip("<@42>", BOT), None);

        let matcher = matcher.mention(false);
        assert_eq!(matcher.strip("<@42> ping", BOT), None);
    }

    #[test]
    fn test_empty_prefixes_are_ignored() {
        let matcher = PrefixMatcher::new(["", "!"]);
        assert_eq!(matcher.prefixes(), ["!"]);
        assert_eq!(matcher.strip("ping", BOT), None);
    }
}
