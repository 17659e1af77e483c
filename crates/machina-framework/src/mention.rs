//! Mention resolution: does a message address the bot, and what did it say?
//!
//! A message addresses the bot when it starts with one of:
//!
//! - a user mention of the bot, `<@BOTID>` with an optional colon
//! - the bot's name followed by a colon, `machina:`
//! - one of the configured aliases, `!deploy`
//!
//! In channels and private groups, only such a prefix addresses the bot. In
//! every other conversation type the bot is always addressed and a valid
//! prefix is merely stripped.

use regex::Regex;

use machina_core::ChannelType;

use crate::error::MatcherError;

/// Outcome of resolving one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addressing {
    pub addressed: bool,
    /// The text with the addressing prefix removed when it was valid.
    pub text: String,
}

/// Resolves mentions of one bot identity.
#[derive(Debug, Clone)]
pub struct MentionResolver {
    bot_id: String,
    bot_name: String,
    pattern: Regex,
}

impl MentionResolver {
    pub fn new<I, S>(
        bot_id: impl Into<String>,
        bot_name: impl Into<String>,
        aliases: I,
    ) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases: Vec<String> = aliases
            .into_iter()
            .map(|alias| alias.as_ref().trim().to_owned())
            .filter(|alias| !alias.is_empty())
            .map(|alias| regex::escape(&alias))
            .collect();

        let alias_branch = if aliases.is_empty() {
            String::new()
        } else {
            format!("|(?P<alias>{})", aliases.join("|"))
        };
        let source = format!(
            r"(?s)^(?:<@(?P<atuser>\w+)>:?|(?P<username>\w+):{alias_branch})\s*(?P<text>.*)$"
        );
        let pattern = Regex::new(&source).map_err(|source_err| MatcherError::InvalidPattern {
            pattern: source.clone(),
            source: source_err,
        })?;

        Ok(Self {
            bot_id: bot_id.into(),
            bot_name: bot_name.into(),
            pattern,
        })
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Decides whether `text` addresses the bot in a conversation of `channel_type`.
    pub fn resolve(&self, text: &str, channel_type: ChannelType) -> Addressing {
        let stripped = self.pattern.captures(text).and_then(|caps| {
            let names_bot = caps.name("alias").is_some()
                || caps.name("atuser").is_some_and(|m| m.as_str() == self.bot_id)
                || caps
                    .name("username")
                    .is_some_and(|m| m.as_str() == self.bot_name);
            names_bot.then(|| caps.name("text").map_or("", |m| m.as_str()).to_owned())
        });

        match stripped {
            Some(text) => Addressing {
                addressed: true,
                text,
            },
            None => Addressing {
                addressed: !channel_type.requires_mention(),
                text: text.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(aliases: &[&str]) -> MentionResolver {
        MentionResolver::new("BOT123", "machina", aliases.iter().copied()).unwrap()
    }

    #[test]
    fn test_at_mention_in_channel_and_dm() {
        let resolver = resolver(&[]);
        for channel_type in [ChannelType::Channel, ChannelType::Im] {
            assert_eq!(
                resolver.resolve("<@BOT123> deploy staging", channel_type),
                Addressing {
                    addressed: true,
                    text: "deploy staging".into()
                }
            );
        }
        assert_eq!(
            resolver.resolve("<@BOT123>: deploy", ChannelType::Group).text,
            "deploy"
        );
    }

    #[test]
    fn test_plain_text_needs_mention_in_channel_only() {
        let resolver = resolver(&[]);
        assert!(!resolver.resolve("deploy staging", ChannelType::Channel).addressed);
        assert_eq!(
            resolver.resolve("deploy staging", ChannelType::Im),
            Addressing {
                addressed: true,
                text: "deploy staging".into()
            }
        );
    }

    #[test]
    fn test_alias_prefix() {
        let resolver = resolver(&["!"]);
        assert_eq!(
            resolver.resolve("!deploy", ChannelType::Channel),
            Addressing {
                addressed: true,
                text: "deploy".into()
            }
        );
    }

    #[test]
    fn test_regex_metacharacters_in_alias_are_literal() {
        let resolver = resolver(&["a.b"]);
        assert!(resolver.resolve("a.b hi", ChannelType::Channel).addressed);
        assert!(!resolver.resolve("axb hi", ChannelType::Channel).addressed);
    }

    #[test]
    fn test_username_prefix() {
        let resolver = resolver(&[]);
        assert_eq!(
            resolver.resolve("machina: status", ChannelType::Channel).text,
            "status"
        );
    }

    #[test]
    fn test_mention_of_someone_else() {
        let resolver = resolver(&[]);
        assert!(!resolver.resolve("<@U999> hello", ChannelType::Channel).addressed);

        let dm = resolver.resolve("alice: hello", ChannelType::Im);
        assert!(dm.addressed);
        assert_eq!(dm.text, "alice: hello");
    }

    #[test]
    fn test_multiline_text_is_kept() {
        let resolver = resolver(&[]);
        assert_eq!(
            resolver.resolve("<@BOT123> line one\nline two", ChannelType::Channel).text,
            "line one\nline two"
        );
    }

    #[test]
    fn test_mpim_and_app_home_are_direct() {
        let resolver = resolver(&[]);
        assert!(resolver.resolve("hi", ChannelType::Mpim).addressed);
        assert!(resolver.resolve("hi", ChannelType::AppHome).addressed);
    }
}
