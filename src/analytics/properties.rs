use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::analytics::error::{invalid_argument, AnalyticsResult};

/// A single typed event property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    String(String),
    Boolean(bool),
    Long(i64),
    Double(f64),
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Long(_) => "long",
            PropertyValue::Double(_) => "double",
            PropertyValue::DateTime(_) => "dateTime",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// `false` for NaN and infinite doubles, `true` for every other value.
    pub fn is_finite(&self) -> bool {
        match self {
            PropertyValue::Double(value) => value.is_finite(),
            _ => true,
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PropertyValue::String(value) => serializer.serialize_str(value),
            PropertyValue::Boolean(value) => serializer.serialize_bool(*value),
            PropertyValue::Long(value) => serializer.serialize_i64(*value),
            PropertyValue::Double(value) => serializer.serialize_f64(*value),
            PropertyValue::DateTime(value) => {
                serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Long(i64::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::DateTime(value)
    }
}

/// Typed properties attached to a single event.
///
/// Entries are keyed by name and iterate in key order. A missing value (`None`) or an empty
/// name can only enter through the loosely typed constructors ([`EventProperties::set_optional`],
/// [`EventProperties::from_json`]); such entries are kept as-is and rejected at validation time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventProperties {
    entries: BTreeMap<String, Option<PropertyValue>>,
}

impl EventProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> &mut Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set(key, PropertyValue::String(value.into()))
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.set(key, PropertyValue::Boolean(value))
    }

    pub fn set_long(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.set(key, PropertyValue::Long(value))
    }

    pub fn set_double(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.set(key, PropertyValue::Double(value))
    }

    pub fn set_date(&mut self, key: impl Into<String>, value: DateTime<Utc>) -> &mut Self {
        self.set(key, PropertyValue::DateTime(value))
    }

    pub fn set_optional(
        &mut self,
        key: impl Into<String>,
        value: Option<PropertyValue>,
    ) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key).and_then(Option::as_ref)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key).flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&PropertyValue>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_ref()))
    }

    /// Promotes a string-only map to typed string properties.
    pub fn from_string_map(properties: BTreeMap<String, String>) -> Self {
        let entries = properties
            .into_iter()
            .map(|(key, value)| (key, Some(PropertyValue::String(value))))
            .collect();
        Self { entries }
    }

    /// Builds properties from a JSON object. `null` members become missing values; integers map
    /// to longs and other numbers to doubles. Arrays and nested objects are not supported.
    pub fn from_json(value: &Value) -> AnalyticsResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid_argument("event properties must be a JSON object"))?;

        let mut properties = Self::new();
        for (key, member) in object {
            let converted = match member {
                Value::Null => None,
                Value::Bool(flag) => Some(PropertyValue::Boolean(*flag)),
                Value::String(text) => Some(PropertyValue::String(text.clone())),
                Value::Number(number) => match number.as_i64() {
                    Some(long) => Some(PropertyValue::Long(long)),
                    None => number.as_f64().map(PropertyValue::Double),
                },
                Value::Array(_) | Value::Object(_) => {
                    return Err(invalid_argument(format!(
                        "event property `{key}` has an unsupported type"
                    )));
                }
            };
            properties.set_optional(key.clone(), converted);
        }
        Ok(properties)
    }
}

impl<K, V> FromIterator<(K, V)> for EventProperties
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (key, value) in iter {
            properties.set(key, value);
        }
        properties
    }
}
