//! Typed configuration values and per-subject schemas (Design Notes §9).
//!
//! Configuration is exposed over the external interface as flat
//! string-keyed maps (so it can round-trip through the RPC edge and
//! scenario documents unchanged), but every subject (session options,
//! WLAN range model, mobility, a service, a radio model) declares a
//! schema of expected keys and [`wire::ConfigOptionType`]s up front so
//! that a typo or a type mismatch is caught at the point of configuration
//! rather than silently ignored at the point of use.

use crate::error::{ModelError, ModelResult};
use crate::wire::ConfigOptionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Uint(u64),
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl ConfigValue {
    pub fn option_type(&self) -> ConfigOptionType {
        match self {
            ConfigValue::Uint(_) => ConfigOptionType::Uint64,
            ConfigValue::Int(_) => ConfigOptionType::Int64,
            ConfigValue::Float(_) => ConfigOptionType::Float,
            ConfigValue::String(_) => ConfigOptionType::String,
            ConfigValue::Bool(_) => ConfigOptionType::Bool,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ConfigValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Uint(v) => Some(*v as f64),
            ConfigValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(v) => Some(v),
            _ => None,
        }
    }

    fn matches_type(&self, expected: ConfigOptionType) -> bool {
        use ConfigOptionType::*;
        match (self, expected) {
            (ConfigValue::Uint(_), Uint8 | Uint16 | Uint32 | Uint64) => true,
            (ConfigValue::Int(_), Int8 | Int16 | Int32 | Int64) => true,
            (ConfigValue::Float(_), Float) => true,
            (ConfigValue::String(_), String) => true,
            (ConfigValue::Bool(_), Bool) => true,
            _ => false,
        }
    }
}

/// A named, typed, defaulted configuration key within a subject's schema.
#[derive(Clone, Debug)]
pub struct ConfigKeySpec {
    pub key: &'static str,
    pub option_type: ConfigOptionType,
    pub default: ConfigValue,
}

/// The set of keys a configuration subject (session, WLAN, mobility,
/// service, radio model) accepts, with defaults.
#[derive(Clone, Debug, Default)]
pub struct ConfigSchema {
    subject: String,
    keys: Vec<ConfigKeySpec>,
}

impl ConfigSchema {
    pub fn new(subject: impl Into<String>, keys: Vec<ConfigKeySpec>) -> Self {
        Self {
            subject: subject.into(),
            keys,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn defaults(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        for spec in &self.keys {
            map.values.insert(spec.key.to_string(), spec.default.clone());
        }
        map
    }

    fn spec_for(&self, key: &str) -> Option<&ConfigKeySpec> {
        self.keys.iter().find(|s| s.key == key)
    }

    /// Validate and apply a single key/value pair, returning an error if
    /// the key is unknown or the value's type does not match the schema.
    pub fn validate(&self, key: &str, value: &ConfigValue) -> ModelResult<()> {
        let spec = self
            .spec_for(key)
            .ok_or_else(|| ModelError::UnknownConfigKey(self.subject.clone(), key.to_string()))?;
        if !value.matches_type(spec.option_type) {
            return Err(ModelError::ConfigTypeMismatch(key.to_string(), spec.option_type));
        }
        Ok(())
    }
}

/// A flat, ordered string-keyed configuration map, as exposed over the
/// external interface and persisted in scenario documents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMap {
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.values.insert(key.into(), value);
    }

    /// Apply `overrides` on top of `self`'s defaults after validating each
    /// key/value against `schema`.
    pub fn apply_validated(&mut self, schema: &ConfigSchema, overrides: &ConfigMap) -> ModelResult<()> {
        for (key, value) in &overrides.values {
            schema.validate(key, value)?;
            self.values.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wlan_schema() -> ConfigSchema {
        ConfigSchema::new(
            "wlan",
            vec![
                ConfigKeySpec {
                    key: "range",
                    option_type: ConfigOptionType::Uint32,
                    default: ConfigValue::Uint(275),
                },
                ConfigKeySpec {
                    key: "bandwidth",
                    option_type: ConfigOptionType::Uint64,
                    default: ConfigValue::Uint(54_000_000),
                },
            ],
        )
    }

    #[test]
    fn defaults_populate_every_key() {
        let schema = wlan_schema();
        let defaults = schema.defaults();
        assert_eq!(defaults.get("range").unwrap().as_u64(), Some(275));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let schema = wlan_schema();
        let err = schema.validate("bogus", &ConfigValue::Uint(1)).unwrap_err();
        assert!(matches!(err, ModelError::UnknownConfigKey(_, _)));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let schema = wlan_schema();
        let err = schema.validate("range", &ConfigValue::Bool(true)).unwrap_err();
        assert!(matches!(err, ModelError::ConfigTypeMismatch(_, _)));
    }

    #[test]
    fn apply_validated_merges_over_defaults() {
        let schema = wlan_schema();
        let mut map = schema.defaults();
        let mut overrides = ConfigMap::new();
        overrides.set("range", ConfigValue::Uint(500));
        map.apply_validated(&schema, &overrides).unwrap();
        assert_eq!(map.get("range").unwrap().as_u64(), Some(500));
        assert_eq!(map.get("bandwidth").unwrap().as_u64(), Some(54_000_000));
    }
}
