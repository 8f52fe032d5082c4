//! String-keyed tool options carried by a job.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error produced when an option value does not fit a tool's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("Invalid value {value:?} for option '{key}': expected {expected}")]
    Invalid {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Missing required option '{0}'")]
    Missing(String),
}

impl OptionError {
    pub fn invalid(key: &str, value: &str, expected: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }
}

/// Mapping of option keys to string values.
///
/// Decoding accepts strings, numbers and booleans; the latter two are kept in
/// their JSON text form so every value is a string afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>")]
pub struct JobOptions(BTreeMap<String, String>);

impl TryFrom<BTreeMap<String, Value>> for JobOptions {
    type Error = String;

    fn try_from(raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let mut options = BTreeMap::new();
        for (key, value) in raw {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(format!(
                        "option '{}' must be a string, number or boolean, got {}",
                        key,
                        json_kind(&other)
                    ))
                }
            };
            options.insert(key, value);
        }
        Ok(Self(options))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
        _ => "a scalar",
    }
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value as sent upstream.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Trimmed value, treating blank strings as absent.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Value or the given default when absent or blank.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.non_empty(key).unwrap_or(default).to_string()
    }

    /// Parse a value, returning `None` when absent or blank.
    pub fn parse_opt<T>(&self, key: &str) -> Result<Option<T>, OptionError>
    where
        T: FromStr,
    {
        match self.non_empty(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| OptionError::invalid(key, raw, std::any::type_name::<T>())),
        }
    }

    /// Parse a value, falling back to `default` when absent or blank.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, OptionError>
    where
        T: FromStr,
    {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }

    /// Value that must be present.
    pub fn require(&self, key: &str) -> Result<&str, OptionError> {
        self.non_empty(key)
            .ok_or_else(|| OptionError::Missing(key.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for JobOptions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for JobOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_stringified() {
        let options: JobOptions =
            serde_json::from_str(r#"{"angle": 90, "text": "DRAFT", "bold": true}"#).unwrap();

        assert_eq!(options.get("angle"), Some("90"));
        assert_eq!(options.get("text"), Some("DRAFT"));
        assert_eq!(options.get("bold"), Some("true"));
    }

    #[test]
    fn test_nested_values_rejected() {
        assert!(serde_json::from_str::<JobOptions>(r#"{"pages": [1, 2]}"#).is_err());
        assert!(serde_json::from_str::<JobOptions>(r#"{"x": null}"#).is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_default() {
        let options: JobOptions = [("angle", "  "), ("fontSize", "42")].into_iter().collect();

        assert_eq!(options.get_or("angle", "90"), "90");
        assert_eq!(options.parse_or::<u32>("fontSize", 80).unwrap(), 42);
        assert_eq!(options.parse_or::<u32>("missing", 80).unwrap(), 80);
    }

    #[test]
    fn test_parse_reports_key_and_value() {
        let options: JobOptions = [("width", "wide")].into_iter().collect();
        let err = options.parse_opt::<u32>("width").unwrap_err();

        match err {
            OptionError::Invalid { key, value, .. } => {
                assert_eq!(key, "width");
                assert_eq!(value, "wide");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_require() {
        let options: JobOptions = [("header", "Title")].into_iter().collect();
        assert_eq!(options.require("header").unwrap(), "Title");
        assert_eq!(
            options.require("footer").unwrap_err(),
            OptionError::Missing("footer".into())
        );
    }
}
