//! Raw handler options.
//!
//! An [`OptionMap`] is the untyped input every handler's `parse_params`
//! reads. Keys are case-insensitive; values are kept as text and converted by
//! the typed getters, which fall back to a default when the key is absent or
//! empty.

use std::collections::BTreeMap;

use crate::error::ParseError;

/// Case-insensitive key → text map.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionMap {
    values: BTreeMap<String, String>,
}

impl OptionMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces `key`.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Raw text for `key`, `None` if absent or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// True if `key` holds a non-blank value.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates `(key, value)` pairs with lowercased keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Floating-point value.
    pub fn float(&self, key: &str, default: f64) -> Result<f64, ParseError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .ok_or_else(|| ParseError::invalid_value(key, v, "a number")),
        }
    }

    /// Integer value; integral floats such as `4.0` are accepted.
    pub fn int(&self, key: &str, default: i64) -> Result<i64, ParseError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => {
                if let Ok(i) = v.parse::<i64>() {
                    return Ok(i);
                }
                match v.parse::<f64>() {
                    Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
                    _ => Err(ParseError::invalid_value(key, v, "an integer")),
                }
            }
        }
    }

    /// Boolean value: `true/false`, `yes/no`, `on/off`, `1/0`.
    pub fn boolean(&self, key: &str, default: bool) -> Result<bool, ParseError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(ParseError::invalid_value(key, v, "a boolean")),
            },
        }
    }

    /// Text value or `default`.
    pub fn string<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
