// Stage option handling
//
// Every filter and flow control declares a default option map. User options
// from the task configuration are merged over it once, when the pipeline is
// built. Unknown keys and values whose type disagrees with the default are
// configuration errors; individual stages add stricter checks on top.

use crate::error::SpellError;
use serde_yaml::{Mapping, Number, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Options {
    plugin: String,
    values: BTreeMap<String, Value>,
}

impl Options {
    /// Merge `user` over `defaults`, validating keys and value types
    pub fn configure(
        plugin: &str,
        defaults: Vec<(&str, Value)>,
        user: &Mapping,
    ) -> Result<Self, SpellError> {
        let mut values: BTreeMap<String, Value> = defaults
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        for (key, value) in user {
            let key = key.as_str().ok_or_else(|| {
                SpellError::config(format!("{plugin}: option names must be strings, found {key:?}"))
            })?;
            let default = values.get(key).ok_or_else(|| {
                SpellError::config(format!("'{key}' is not a valid option for '{plugin}'"))
            })?;
            check_type(plugin, key, default, value)?;
            values.insert(key.to_string(), value.clone());
        }

        Ok(Self {
            plugin: plugin.to_string(),
            values,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_str(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or("")
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0)
    }

    pub fn get_float(&self, key: &str) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn get_list(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_sequence)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// List option whose entries must all be strings
    pub fn get_str_list(&self, key: &str) -> Result<Vec<String>, SpellError> {
        self.get_list(key)
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(key, "must be a list of strings"))
            })
            .collect()
    }

    /// Configuration error for a value that passed the type check but is still wrong
    pub fn invalid(&self, key: &str, reason: &str) -> SpellError {
        SpellError::config(format!("{}: option '{}' {}", self.plugin, key, reason))
    }

    /// Check a string option against a closed set of values (case-insensitive)
    pub fn expect_one_of(&self, key: &str, allowed: &[&str]) -> Result<String, SpellError> {
        let value = self.get_str(key).to_lowercase();
        if allowed.iter().any(|a| a.eq_ignore_ascii_case(&value)) {
            Ok(value)
        } else {
            Err(self.invalid(
                key,
                &format!("must be one of {}, found '{}'", allowed.join(", "), value),
            ))
        }
    }
}

fn is_integer(n: &Number) -> bool {
    n.is_i64() || n.is_u64()
}

fn is_integral(n: &Number) -> bool {
    is_integer(n) || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
}

fn check_type(plugin: &str, key: &str, default: &Value, value: &Value) -> Result<(), SpellError> {
    let expected = match default {
        Value::Bool(_) if !value.is_bool() => Some("bool"),
        Value::String(_) if !value.is_string() => Some("str"),
        Value::Number(n) if is_integer(n) => match value {
            Value::Number(v) if is_integral(v) => None,
            _ => Some("int"),
        },
        Value::Number(_) if !value.is_number() => Some("float"),
        Value::Sequence(_) if !value.is_sequence() => Some("list"),
        Value::Mapping(_) if !value.is_mapping() => Some("dict"),
        _ => None,
    };

    match expected {
        Some(kind) => Err(SpellError::config(format!(
            "{plugin}: option '{key}' must be a {kind} type."
        ))),
        None => Ok(()),
    }
}

/// Shorthand for building default option tables
pub fn seq<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Sequence(items.into_iter().map(|s| Value::String(s.into())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<(&'static str, Value)> {
        vec![
            ("flag", Value::Bool(true)),
            ("name", Value::String(String::new())),
            ("count", Value::Number(3.into())),
            ("ratio", Value::Number(0.5.into())),
            ("items", seq(Vec::<String>::new())),
            ("table", Value::Mapping(Mapping::new())),
        ]
    }

    fn user(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults_survive_empty_user_options() {
        let opts = Options::configure("demo", defaults(), &Mapping::new()).unwrap();
        assert!(opts.get_bool("flag"));
        assert_eq!(opts.get_int("count"), 3);
        assert_eq!(opts.get_float("ratio"), 0.5);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Options::configure("demo", defaults(), &user("bogus: 1")).unwrap_err();
        assert!(matches!(err, SpellError::Configuration(_)));
        assert!(err.to_string().contains("'bogus' is not a valid option for 'demo'"));
    }

    #[test]
    fn test_type_mismatches_rejected() {
        for yaml in [
            "flag: yes-please",
            "name: 12",
            "count: 1.5",
            "count: text",
            "ratio: text",
            "items: nope",
            "table: [1]",
        ] {
            let result = Options::configure("demo", defaults(), &user(yaml));
            assert!(result.is_err(), "expected failure for {yaml}");
        }
    }

    #[test]
    fn test_integral_float_and_int_for_float_accepted() {
        let opts = Options::configure("demo", defaults(), &user("count: 4.0\nratio: 2")).unwrap();
        assert_eq!(opts.get_int("count"), 4);
        assert_eq!(opts.get_float("ratio"), 2.0);
    }

    #[test]
    fn test_str_list_requires_strings() {
        let opts = Options::configure("demo", defaults(), &user("items: [a, 2]")).unwrap();
        assert!(opts.get_str_list("items").is_err());
    }

    #[test]
    fn test_expect_one_of() {
        let opts = Options::configure("demo", defaults(), &user("name: NFC")).unwrap();
        assert_eq!(opts.expect_one_of("name", &["nfc", "nfd"]).unwrap(), "nfc");
        assert!(opts.expect_one_of("name", &["nfd"]).is_err());
    }
}
