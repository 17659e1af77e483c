//! Routing rules.
//!
//! A rule is an immutable value built once at plugin-load time:
//!
//! - [`MatcherConfig`]: a message regex with its flags, matched by search
//!   anywhere in the text
//! - [`IdMatcher`]: an action, block or callback id matcher, matched from the
//!   start of the id
//! - [`RoleRequirement`]: the roles a sender must hold
//!
//! The two regex semantics are deliberately different: a message pattern
//! `deploy` fires on `"please deploy"`, while an id pattern `approve` only
//! fires on ids starting with `approve`.

use std::collections::HashMap;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::MatcherError;

fn compile(pattern: &str, case_sensitive: bool) -> Result<Regex, MatcherError> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|source| MatcherError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })
}

// =============================================================================
// MatcherConfig
// =============================================================================

/// A compiled message rule.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    regex: Regex,
    case_sensitive: bool,
    handle_message_changed: bool,
}

impl MatcherConfig {
    pub fn new(
        pattern: &str,
        case_sensitive: bool,
        handle_message_changed: bool,
    ) -> Result<Self, MatcherError> {
        Ok(Self {
            regex: compile(pattern, case_sensitive)?,
            case_sensitive,
            handle_message_changed,
        })
    }

    /// The pattern source as declared.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Whether edited messages are routed to the handler.
    pub fn handles_message_changed(&self) -> bool {
        self.handle_message_changed
    }

    /// Searches `text` anywhere and returns the named capture groups on a match.
    ///
    /// Groups that did not participate in the match are absent from the map.
    pub fn search(&self, text: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(text)?;
        Some(
            self.regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|m| (name.to_owned(), m.as_str().to_owned()))
                })
                .collect(),
        )
    }
}

// =============================================================================
// Id selectors
// =============================================================================

/// An id rule as declared, before compilation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdSelector {
    #[default]
    Any,
    Literal(String),
    Pattern(String),
}

impl IdSelector {
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn compile(&self) -> Result<IdMatcher, MatcherError> {
        Ok(match self {
            Self::Any => IdMatcher::Any,
            Self::Literal(id) => IdMatcher::Literal(id.clone()),
            Self::Pattern(pattern) => IdMatcher::Pattern(compile(pattern, true)?),
        })
    }
}

/// A compiled id matcher.
#[derive(Debug, Clone)]
pub enum IdMatcher {
    /// Matches every id.
    Any,
    /// Matches one id exactly.
    Literal(String),
    /// Matches ids the pattern matches at position 0.
    Pattern(Regex),
}

impl IdMatcher {
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Literal(expected) => expected == id,
            // leftmost-first: a match at 0, if any, is the one found
            Self::Pattern(regex) => regex.find(id).is_some_and(|m| m.start() == 0),
        }
    }

    /// The part of a registry key contributed by this matcher.
    pub fn discriminant(&self) -> &str {
        match self {
            Self::Any => "*",
            Self::Literal(id) => id,
            Self::Pattern(regex) => regex.as_str(),
        }
    }
}

impl fmt::Display for IdMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminant())
    }
}

// =============================================================================
// RoleRequirement
// =============================================================================

/// Roles a message sender must hold for a handler to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequirement {
    /// At least one of the roles.
    Any(Vec<String>),
    /// Every one of the roles.
    All(Vec<String>),
}

impl RoleRequirement {
    pub fn any<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any(roles.into_iter().map(Into::into).collect())
    }

    pub fn all<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::All(roles.into_iter().map(Into::into).collect())
    }

    pub fn roles(&self) -> &[String] {
        match self {
            Self::Any(roles) | Self::All(roles) => roles,
        }
    }
}

impl fmt::Display for RoleRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any(roles) => write!(f, "any of [{}]", roles.join(", ")),
            Self::All(roles) => write!(f, "all of [{}]", roles.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_pattern_searches_anywhere() {
        let matcher = MatcherConfig::new("deploy", true, false).unwrap();
        assert!(matcher.search("please deploy now").is_some());
        assert!(matcher.search("Deploy").is_none());
    }

    #[test]
    fn test_case_insensitive_flag() {
        let matcher = MatcherConfig::new("deploy", false, false).unwrap();
        assert!(matcher.search("DEPLOY").is_some());
        assert_eq!(matcher.pattern(), "deploy");
    }

    #[test]
    fn test_named_captures() {
        let matcher =
            MatcherConfig::new(r"deploy (?P<env>\w+)(?: to (?P<region>\w+))?", true, false)
                .unwrap();
        let captures = matcher.search("deploy staging").unwrap();
        assert_eq!(captures.get("env").map(String::as_str), Some("staging"));
        assert!(!captures.contains_key("region"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = MatcherConfig::new("(unclosed", true, false).unwrap_err();
        assert!(matches!(err, MatcherError::InvalidPattern { pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_id_pattern_is_anchored_at_start_only() {
        let matcher = IdSelector::Pattern("approve".into()).compile().unwrap();
        assert!(matcher.matches("approve"));
        assert!(matcher.matches("approve_request_7"));
        assert!(!matcher.matches("do_approve"));
    }

    #[test]
    fn test_id_literal_and_any() {
        let literal = IdSelector::Literal("ok".into()).compile().unwrap();
        assert!(literal.matches("ok"));
        assert!(!literal.matches("ok2"));
        assert!(IdMatcher::Any.matches("anything"));
        assert_eq!(IdMatcher::Any.discriminant(), "*");
    }

    #[test]
    fn test_role_requirement_display() {
        assert_eq!(
            RoleRequirement::any(["admin", "ops"]).to_string(),
            "any of [admin, ops]"
        );
    }
}
