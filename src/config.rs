//! Hierarchical typed configuration store
//!
//! A `Config` can have a parent configuration to inherit values from.
//! Reads fall through to the parent when the key is absent locally;
//! writes always stay local.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StringList(Vec<String>),
}

impl ConfigValue {
    fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "string",
            ConfigValue::Int(_) => "int64",
            ConfigValue::Float(_) => "float64",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::StringList(_) => "string list",
        }
    }
}

/// Thread-safe container for configuration values, optionally inheriting
/// from a parent configuration. The parent is only ever read.
#[derive(Debug, Default)]
pub struct Config {
    parent: Option<Arc<Config>>,
    kv: RwLock<HashMap<String, ConfigValue>>,
}

impl Config {
    /// Creates an empty configuration with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new configuration inheriting from the given parent.
    pub fn from_parent(parent: Arc<Config>) -> Self {
        Config {
            parent: Some(parent),
            kv: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the parent configuration, if any.
    pub fn parent(&self) -> Option<&Arc<Config>> {
        self.parent.as_ref()
    }

    fn set(&self, key: &str, value: ConfigValue) {
        self.kv.write().insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        let local = self.kv.read().get(key).cloned();
        match local {
            Some(v) => Some(v),
            None => self.parent.as_ref().and_then(|p| p.get(key)),
        }
    }

    pub fn set_string(&self, key: &str, value: &str) {
        self.set(key, ConfigValue::String(value.to_string()));
    }

    pub fn set_int(&self, key: &str, value: i64) {
        self.set(key, ConfigValue::Int(value));
    }

    pub fn set_float(&self, key: &str, value: f64) {
        self.set(key, ConfigValue::Float(value));
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.set(key, ConfigValue::Bool(value));
    }

    pub fn set_string_list(&self, key: &str, value: Vec<String>) {
        self.set(key, ConfigValue::StringList(value));
    }

    fn invalid_type(stored: &ConfigValue, wanted: &'static str, key: &str) -> Error {
        Error::InvalidType {
            stored: stored.type_name().to_string(),
            wanted: wanted.to_string(),
            key: key.to_string(),
        }
    }

    /// Returns the string value stored at `key`, or the default when absent.
    pub fn get_string(&self, key: &str, default: &str) -> Result<String> {
        match self.get(key) {
            None => Ok(default.to_string()),
            Some(ConfigValue::String(s)) => Ok(s),
            Some(other) => Err(Self::invalid_type(&other, "string", key)),
        }
    }

    /// Returns the int64 value stored at `key`, or the default when absent.
    pub fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(ConfigValue::Int(i)) => Ok(i),
            Some(other) => Err(Self::invalid_type(&other, "int64", key)),
        }
    }

    /// Returns the float64 value stored at `key`, or the default when absent.
    pub fn get_float(&self, key: &str, default: f64) -> Result<f64> {
        match self.get(key) {
            None => Ok(default),
            Some(ConfigValue::Float(f)) => Ok(f),
            Some(other) => Err(Self::invalid_type(&other, "float64", key)),
        }
    }

    /// Returns the bool value stored at `key`, or the default when absent.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(ConfigValue::Bool(b)) => Ok(b),
            Some(other) => Err(Self::invalid_type(&other, "bool", key)),
        }
    }

    /// Returns the string list value stored at `key`, or the default when absent.
    pub fn get_string_list(&self, key: &str, default: Vec<String>) -> Result<Vec<String>> {
        match self.get(key) {
            None => Ok(default),
            Some(ConfigValue::StringList(l)) => Ok(l),
            Some(other) => Err(Self::invalid_type(&other, "string list", key)),
        }
    }

    /// Loads the given keys from environment variables, inferring the value
    /// type from its shape: `true`/`false` parse as bool, all-digit strings
    /// as int64, digit strings with a single dot as float64, anything else
    /// as a string. Unset variables are skipped.
    pub fn load_from_env(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            let val = match std::env::var(key) {
                Ok(v) => v,
                Err(_) => continue,
            };

            if is_bool(&val) {
                self.set_bool(key, val.eq_ignore_ascii_case("true"));
            } else if is_int(&val) {
                let n = val
                    .parse::<i64>()
                    .map_err(|e| Error::InvalidValue(format!("{key}: {e}")))?;
                self.set_int(key, n);
            } else if is_float(&val) {
                let f = val
                    .parse::<f64>()
                    .map_err(|e| Error::InvalidValue(format!("{key}: {e}")))?;
                self.set_float(key, f);
            } else {
                self.set_string(key, &val);
            }
        }

        Ok(())
    }
}

fn is_bool(v: &str) -> bool {
    v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false")
}

fn is_int(v: &str) -> bool {
    !v.is_empty() && v.chars().all(|c| c.is_ascii_digit())
}

fn is_float(v: &str) -> bool {
    let mut dot = false;
    let mut digits = false;
    for c in v.chars() {
        if c.is_ascii_digit() {
            digits = true;
        } else if c == '.' && !dot {
            dot = true;
        } else {
            return false;
        }
    }
    dot && digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let conf = Config::new();
        conf.set_string("a", "foo");
        conf.set_int("b", 42);
        conf.set_float("c", 3.14);
        conf.set_bool("d", true);
        conf.set_string_list("e", vec!["x".into(), "y".into()]);

        assert_eq!(conf.get_string("a", "").unwrap(), "foo");
        assert_eq!(conf.get_int("b", 0).unwrap(), 42);
        assert_eq!(conf.get_float("c", 0.0).unwrap(), 3.14);
        assert!(conf.get_bool("d", false).unwrap());
        assert_eq!(
            conf.get_string_list("e", vec![]).unwrap(),
            vec!["x".to_string(), "y".to_string()]
        );
    }

    #[test]
    fn test_defaults() {
        let conf = Config::new();
        assert_eq!(conf.get_string("missing", "dflt").unwrap(), "dflt");
        assert_eq!(conf.get_int("missing", 7).unwrap(), 7);
    }

    #[test]
    fn test_invalid_type() {
        let conf = Config::new();
        conf.set_int("a", 1);

        let err = conf.get_string("a", "").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidType {
                stored: "int64".into(),
                wanted: "string".into(),
                key: "a".into(),
            }
        );
    }

    #[test]
    fn test_parent_inheritance() {
        let global = Arc::new(Config::new());
        global.set_int("a", 1);

        let session = Config::from_parent(global.clone());
        assert_eq!(session.get_int("a", 0).unwrap(), 1);

        session.set_int("a", 2);
        assert_eq!(session.get_int("a", 0).unwrap(), 2);
        assert_eq!(global.get_int("a", 0).unwrap(), 1);
    }

    #[test]
    fn test_load_from_env() {
        let conf = Config::new();
        std::env::set_var("QUARRY_TEST_BOOL", "true");
        std::env::set_var("QUARRY_TEST_INT", "123");
        std::env::set_var("QUARRY_TEST_FLOAT", "1.5");
        std::env::set_var("QUARRY_TEST_STR", "hello world");

        conf.load_from_env(&[
            "QUARRY_TEST_BOOL",
            "QUARRY_TEST_INT",
            "QUARRY_TEST_FLOAT",
            "QUARRY_TEST_STR",
            "QUARRY_TEST_UNSET",
        ])
        .unwrap();

        assert!(conf.get_bool("QUARRY_TEST_BOOL", false).unwrap());
        assert_eq!(conf.get_int("QUARRY_TEST_INT", 0).unwrap(), 123);
        assert_eq!(conf.get_float("QUARRY_TEST_FLOAT", 0.0).unwrap(), 1.5);
        assert_eq!(
            conf.get_string("QUARRY_TEST_STR", "").unwrap(),
            "hello world"
        );
        assert_eq!(conf.get_string("QUARRY_TEST_UNSET", "none").unwrap(), "none");
    }
}
