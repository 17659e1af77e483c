//! Case-insensitive plugin settings.

use std::collections::BTreeMap;

use serde_json::Value;

/// Setting holding the comma-separated aliases the bot answers to.
pub const ALIASES: &str = "ALIASES";
/// Setting naming the user that satisfies every role requirement.
pub const ROOT_USER: &str = "ROOT_USER";
/// Setting enabling an info log line per handled message.
pub const LOG_HANDLED_MESSAGES: &str = "LOG_HANDLED_MESSAGES";

/// A resolved, case-insensitive settings map.
///
/// Keys are normalised to upper case on insertion and lookup, so `aliases`,
/// `Aliases` and `ALIASES` name the same setting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.to_uppercase(), value.into())
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(&key.to_uppercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| !value.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Reads a flag. Strings `true`, `yes`, `on` and `1` count as set.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(flag) => Some(*flag),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => Some(matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "on" | "1"
            )),
            _ => None,
        }
    }

    /// Reads a list from an array or a comma-separated string. Blank entries are dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        let items: Vec<String> = match self.get(key) {
            Some(Value::String(s)) => s.split(',').map(str::to_owned).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        };
        items
            .into_iter()
            .map(|item| item.trim().to_owned())
            .filter(|item| !item.is_empty())
            .collect()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.get_list(ALIASES)
    }

    pub fn root_user(&self) -> Option<&str> {
        self.get_str(ROOT_USER).filter(|user| !user.is_empty())
    }

    /// The required keys absent from these settings.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|key| !self.contains(key))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: AsRef<str>> FromIterator<(K, Value)> for Settings {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        let mut settings = Self::new();
        for (key, value) in iter {
            settings.insert(key.as_ref(), value);
        }
        settings
    }
}

impl Extend<(String, Value)> for Settings {
    fn extend<T: IntoIterator<Item = (String, Value)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(&key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_case_insensitive() {
        let settings = Settings::new().with("api_token", "xoxb");
        assert_eq!(settings.get_str("API_TOKEN"), Some("xoxb"));
        assert_eq!(settings.get_str("Api_Token"), Some("xoxb"));
    }

    #[test]
    fn test_aliases_drop_blank_entries() {
        let settings = Settings::new().with("aliases", "!, ,bot,");
        assert_eq!(settings.aliases(), vec!["!".to_owned(), "bot".to_owned()]);

        let settings = Settings::new().with("ALIASES", json!(["?", ""]));
        assert_eq!(settings.aliases(), vec!["?".to_owned()]);
    }

    #[test]
    fn test_bool_parsing() {
        let settings = Settings::new()
            .with("a", true)
            .with("b", "yes")
            .with("c", "off")
            .with("d", 0);
        assert_eq!(settings.get_bool("a"), Some(true));
        assert_eq!(settings.get_bool("b"), Some(true));
        assert_eq!(settings.get_bool("c"), Some(false));
        assert_eq!(settings.get_bool("d"), Some(false));
        assert_eq!(settings.get_bool("missing"), None);
    }

    #[test]
    fn test_missing_required_settings() {
        let settings: Settings = [("token", json!("x")), ("empty", Value::Null)]
            .into_iter()
            .collect();
        assert_eq!(
            settings.missing(&["TOKEN", "empty", "channel"]),
            vec!["empty", "channel"]
        );
    }
}
