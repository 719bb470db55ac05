// Driver Configurations
// Typed connection parameters for network (pgsql/mysql) and file-based (sqlite) databases

pub mod network;
pub mod sqlite;

pub use network::{NetworkDriverConfig, ALLOWED_DRIVERS};
pub use sqlite::FileDriverConfig;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Default prefix prepended to capitalized row types when resolving models
pub const DEFAULT_MODEL_NAMESPACE: &str = "models::";

/// Configuration errors, always raised before the engine is touched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Please set DB {0}")]
    MissingField(&'static str),

    #[error("Driver '{driver}' is not allowed. Allowed drivers: {allowed}")]
    DriverNotAllowed { driver: String, allowed: String },

    #[error("DB parameter not exists: {0}")]
    UnknownParameter(String),

    #[error("Invalid value for DB parameter {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid JSON parameters: {0}")]
    InvalidJson(String),
}

/// Settings shared by every driver variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    pub namespace: String,
    pub frozen: bool,
    pub fail_if_model_missing: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_MODEL_NAMESPACE.to_string(),
            frozen: false,
            fail_if_model_missing: true,
        }
    }
}

impl DriverSettings {
    /// Apply a bulk parameter if it belongs to the shared settings.
    /// Returns `Ok(false)` when the key is not a shared setting.
    pub(crate) fn apply(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        match key {
            "namespace" => self.namespace = value.to_string(),
            "frozen" => self.frozen = parse_flag(key, value)?,
            "fail_if_missing" => self.fail_if_model_missing = parse_flag(key, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse a flat JSON object of string values into bulk parameters
pub(crate) fn params_from_json(json: &str) -> Result<HashMap<String, String>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::InvalidJson(e.to_string()))
}

/// Exported connection parameters, in canonical key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    entries: Vec<(&'static str, Option<String>)>,
}

impl ConnectionParams {
    pub(crate) fn insert(&mut self, key: &'static str, value: Option<String>) {
        self.entries.push((key, value));
    }

    /// Value for `key`; `None` if the key is absent or its value unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| *name == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, value)| (*name, value.as_deref()))
    }
}

impl Serialize for ConnectionParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Connection configuration for one database variant
pub trait DriverConfig: std::fmt::Debug {
    fn settings(&self) -> &DriverSettings;

    fn settings_mut(&mut self) -> &mut DriverSettings;

    /// Driver name, empty when unset
    fn name(&self) -> &str;

    /// All relevant fields keyed by canonical names, `driver` first
    fn export(&self) -> ConnectionParams;

    /// Driver-specific DSN; fails naming the first missing required field
    fn connection_string(&self) -> Result<String, ConfigError>;

    fn namespace(&self) -> &str {
        &self.settings().namespace
    }

    fn frozen(&self) -> bool {
        self.settings().frozen
    }

    fn fail_if_model_missing(&self) -> bool {
        self.settings().fail_if_model_missing
    }

    fn set_namespace(&mut self, namespace: impl Into<String>) -> &mut Self
    where
        Self: Sized,
    {
        self.settings_mut().namespace = namespace.into();
        self
    }

    fn set_frozen(&mut self, frozen: bool) -> &mut Self
    where
        Self: Sized,
    {
        self.settings_mut().frozen = frozen;
        self
    }

    fn set_fail_if_model_missing(&mut self, value: bool) -> &mut Self
    where
        Self: Sized,
    {
        self.settings_mut().fail_if_model_missing = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = DriverSettings::default();
        assert_eq!(settings.namespace, DEFAULT_MODEL_NAMESPACE);
        assert!(!settings.frozen);
        assert!(settings.fail_if_model_missing);
    }

    #[test]
    fn test_settings_apply() {
        let mut settings = DriverSettings::default();
        assert!(settings.apply("frozen", "1").unwrap());
        assert!(settings.apply("fail_if_missing", "false").unwrap());
        assert!(!settings.apply("host", "localhost").unwrap());
        assert!(settings.frozen);
        assert!(!settings.fail_if_model_missing);

        let err = settings.apply("frozen", "maybe").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_params_serialize_in_order() {
        let mut params = ConnectionParams::default();
        params.insert("driver", Some("sqlite".to_string()));
        params.insert("path", None);

        assert_eq!(
            serde_json::to_string(&params).unwrap(),
            r#"{"driver":"sqlite","path":null}"#
        );
        assert!(params.contains_key("path"));
        assert_eq!(params.get("path"), None);
    }
}
