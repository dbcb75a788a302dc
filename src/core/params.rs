//! Raw HTTP query parameters
//!
//! A list request arrives as an untyped query string. This module turns it
//! into a [`RawParameters`] map without interpreting any of the keys: every
//! value is kept as the string(s) the client sent.
//!
//! Three shapes are recognised:
//!
//! ```text
//! ?category=road                 -> Single("road")
//! ?tags=red&tags=blue            -> Many(["red", "blue"])
//! ?price[gte]=100&price[lt]=500  -> Nested({"gte": "100", "lt": "500"})
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// A single parameter value as sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// `key=value`
    Single(String),

    /// `key=a&key=b` (repeated key, arrival order kept)
    Many(Vec<String>),

    /// `key[sub]=value` (bracketed sub-keys, e.g. comparison operators)
    Nested(IndexMap<String, String>),
}

impl ParamValue {
    /// Get the value as a single string if it is one
    pub fn as_single(&self) -> Option<&str> {
        match self {
            ParamValue::Single(s) => Some(s),
            _ => None,
        }
    }

    /// Flatten the value into its string values
    ///
    /// A nested map yields nothing: its entries are not plain values.
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(s) => vec![s.as_str()],
            ParamValue::Many(values) => values.iter().map(String::as_str).collect(),
            ParamValue::Nested(_) => Vec::new(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Untyped parameter map of one list request
///
/// Keys keep their first-seen order so that every stage that walks the map
/// produces the same output for the same query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawParameters {
    params: IndexMap<String, ParamValue>,
}

impl RawParameters {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` query string
    ///
    /// Never fails: undecodable bytes are replaced, empty keys are skipped.
    pub fn from_query_str(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            params.push(&key, value.into_owned());
        }
        params
    }

    /// Add one decoded `key=value` pair, following the accumulation rules
    /// of the module documentation
    pub fn push(&mut self, key: &str, value: String) {
        if let Some((field, sub)) = split_bracket_key(key) {
            match self.params.get_mut(field) {
                Some(ParamValue::Nested(map)) => {
                    map.insert(sub.to_string(), value);
                }
                _ => {
                    let mut map = IndexMap::new();
                    map.insert(sub.to_string(), value);
                    self.params.insert(field.to_string(), ParamValue::Nested(map));
                }
            }
            return;
        }

        let key = key.trim();
        if key.is_empty() {
            return;
        }

        match self.params.get_mut(key) {
            Some(slot) => match slot {
                ParamValue::Many(values) => values.push(value),
                ParamValue::Single(existing) => {
                    let first = std::mem::take(existing);
                    *slot = ParamValue::Many(vec![first, value]);
                }
                ParamValue::Nested(_) => *slot = ParamValue::Single(value),
            },
            None => {
                self.params.insert(key.to_string(), ParamValue::Single(value));
            }
        }
    }

    /// Builder-style insertion, mostly useful for internal callers and tests
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Get a parameter value
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Get a parameter as a single string
    ///
    /// When the key was repeated, the last value wins.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.params.get(key)? {
            ParamValue::Single(s) => Some(s),
            ParamValue::Many(values) => values.last().map(String::as_str),
            ParamValue::Nested(_) => None,
        }
    }

    /// Remove a parameter, returning its value
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.params.shift_remove(key)
    }

    /// Iterate parameters in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for RawParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Split `field[sub]` into `("field", "sub")`
fn split_bracket_key(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let inner = key[open + 1..].strip_suffix(']')?;
    let field = key[..open].trim();
    if field.is_empty() || inner.is_empty() || inner.contains(['[', ']']) {
        return None;
    }
    Some((field, inner))
}
