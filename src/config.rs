use serde_json::{Map, Value as JsonValue};

use crate::connection::Connection;
use crate::error::{RedisFacadeError, Result};
use crate::types::DriverKind;

pub(crate) const DRIVER_KEY: &str = "driver";
pub(crate) const NAME_KEY: &str = "name";
pub(crate) const LOG_KEY: &str = "log";

/// Options for a [`Connection`].
///
/// Recognised keys are `driver`, `name` and `log`; every other key is handed to the
/// driver constructor untouched. Missing recognised keys are filled with defaults when
/// the options are built, and the options are never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    values: Map<String, JsonValue>,
}

impl ConnectionOptions {
    /// Options with every default applied.
    #[must_use]
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    /// Merge a raw configuration mapping with the defaults.
    #[must_use]
    pub fn from_map(mut values: Map<String, JsonValue>) -> Self {
        values
            .entry(DRIVER_KEY)
            .or_insert_with(|| JsonValue::from(DriverKind::default().alias()));
        values
            .entry(NAME_KEY)
            .or_insert_with(|| JsonValue::from(""));
        values.entry(LOG_KEY).or_insert(JsonValue::Bool(false));
        Self { values }
    }

    /// Parse options from a JSON object.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::ConfigError` if the text is not a JSON object.
    pub fn from_json(text: &str) -> Result<Self> {
        match serde_json::from_str::<JsonValue>(text)? {
            JsonValue::Object(values) => Ok(Self::from_map(values)),
            other => Err(RedisFacadeError::ConfigError(format!(
                "expected a JSON object, got `{other}`"
            ))),
        }
    }

    #[must_use]
    pub fn builder() -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::new()
    }

    /// Driver identifier: a reserved alias or a type name under the driver namespace.
    #[must_use]
    pub fn driver(&self) -> String {
        match self.values.get(DRIVER_KEY) {
            Some(JsonValue::String(identifier)) => identifier.clone(),
            Some(JsonValue::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// Logical connection name used by the default logger.
    #[must_use]
    pub fn name(&self) -> &str {
        self.values
            .get(NAME_KEY)
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }

    /// Whether query logging starts enabled.
    ///
    /// `log` may be a boolean or any log-config value; null, `false`, zero, empty strings
    /// and empty objects leave logging off.
    #[must_use]
    pub fn log_enabled(&self) -> bool {
        match self.values.get(LOG_KEY) {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::Bool(flag)) => *flag,
            Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(JsonValue::String(s)) => !s.is_empty() && s != "0" && s != "false",
            Some(JsonValue::Array(items)) => !items.is_empty(),
            Some(JsonValue::Object(map)) => !map.is_empty(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.values
    }

    /// The keys meant for the driver constructor.
    #[must_use]
    pub fn driver_config(&self) -> DriverConfig {
        let values = self
            .values
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), DRIVER_KEY | NAME_KEY | LOG_KEY))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        DriverConfig { values }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for [`ConnectionOptions`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptionsBuilder {
    values: Map<String, JsonValue>,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn driver(mut self, identifier: impl Into<String>) -> Self {
        self.values
            .insert(DRIVER_KEY.to_string(), JsonValue::String(identifier.into()));
        self
    }

    #[must_use]
    pub fn driver_kind(self, kind: DriverKind) -> Self {
        self.driver(kind.alias())
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.values
            .insert(NAME_KEY.to_string(), JsonValue::String(name.into()));
        self
    }

    #[must_use]
    pub fn log(mut self, enabled: bool) -> Self {
        self.values
            .insert(LOG_KEY.to_string(), JsonValue::Bool(enabled));
        self
    }

    /// Any other key; it reaches the driver constructor unchanged.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        ConnectionOptions::from_map(self.values)
    }

    /// Build a [`Connection`]. The driver is resolved on first use.
    #[must_use]
    pub fn build(self) -> Connection {
        Connection::new(self.finish())
    }
}

/// Pass-through configuration handed to a driver constructor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverConfig {
    values: Map<String, JsonValue>,
}

impl DriverConfig {
    #[must_use]
    pub fn new(values: Map<String, JsonValue>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// String option; numbers are accepted and rendered as text.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::ConfigError` for arrays, objects or booleans.
    pub fn string(&self, key: &str) -> Result<Option<String>> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s.clone())),
            Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(invalid(key, "a string", other)),
        }
    }

    /// Unsigned integer option; numeric strings are accepted.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::ConfigError` if the value is not a non-negative integer.
    pub fn u64(&self, key: &str) -> Result<Option<u64>> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, "a non-negative integer", &JsonValue::Number(n.clone()))),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(key, "a non-negative integer", &JsonValue::String(s.clone()))),
            Some(other) => Err(invalid(key, "a non-negative integer", other)),
        }
    }

    /// Floating point option; numeric strings are accepted.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::ConfigError` if the value is not numeric.
    pub fn f64(&self, key: &str) -> Result<Option<f64>> {
        match self.values.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Number(n)) => Ok(n.as_f64()),
            Some(JsonValue::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid(key, "a number", &JsonValue::String(s.clone()))),
            Some(other) => Err(invalid(key, "a number", other)),
        }
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.values
    }
}

fn invalid(key: &str, expected: &str, found: &JsonValue) -> RedisFacadeError {
    RedisFacadeError::ConfigError(format!("option `{key}` must be {expected}, got `{found}`"))
}
