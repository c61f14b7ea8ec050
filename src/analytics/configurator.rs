use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::analytics::constants::USER_ID_PREFIX;
use crate::analytics::error::{invalid_argument, AnalyticsResult};
use crate::analytics::properties::PropertyValue;

/// Per-target defaults merged into every event sent through the target or its descendants.
#[derive(Debug, Default)]
pub struct PropertyConfigurator {
    state: RwLock<ConfiguratorState>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ConfiguratorState {
    pub(crate) event_properties: BTreeMap<String, PropertyValue>,
    pub(crate) app_name: Option<String>,
    pub(crate) app_version: Option<String>,
    pub(crate) app_locale: Option<String>,
    pub(crate) user_id: Option<String>,
    pub(crate) collect_device_id: bool,
}

impl PropertyConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a default event property. Empty keys and non-finite doubles are rejected.
    pub fn set_event_property(
        &self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> AnalyticsResult<()> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() {
            return Err(invalid_argument("default property key must not be empty"));
        }
        if !value.is_finite() {
            return Err(invalid_argument(format!(
                "default property `{key}` must be a finite {}",
                value.type_name()
            )));
        }
        self.state
            .write()
            .unwrap()
            .event_properties
            .insert(key, value);
        Ok(())
    }

    pub fn set_string(&self, key: impl Into<String>, value: impl Into<String>) -> AnalyticsResult<()> {
        self.set_event_property(key, PropertyValue::String(value.into()))
    }

    pub fn set_bool(&self, key: impl Into<String>, value: bool) -> AnalyticsResult<()> {
        self.set_event_property(key, PropertyValue::Boolean(value))
    }

    pub fn set_long(&self, key: impl Into<String>, value: i64) -> AnalyticsResult<()> {
        self.set_event_property(key, PropertyValue::Long(value))
    }

    pub fn set_double(&self, key: impl Into<String>, value: f64) -> AnalyticsResult<()> {
        self.set_event_property(key, PropertyValue::Double(value))
    }

    pub fn set_date(&self, key: impl Into<String>, value: DateTime<Utc>) -> AnalyticsResult<()> {
        self.set_event_property(key, PropertyValue::DateTime(value))
    }

    pub fn remove_event_property(&self, key: &str) -> Option<PropertyValue> {
        self.state.write().unwrap().event_properties.remove(key)
    }

    pub fn event_property(&self, key: &str) -> Option<PropertyValue> {
        self.state.read().unwrap().event_properties.get(key).cloned()
    }

    pub fn event_properties(&self) -> BTreeMap<String, PropertyValue> {
        self.state.read().unwrap().event_properties.clone()
    }

    /// Overrides the application name reported by this target and the descendants that do not
    /// set their own. `None` falls back to the nearest ancestor value again.
    pub fn set_app_name(&self, name: Option<String>) {
        self.state.write().unwrap().app_name = name;
    }

    pub fn set_app_version(&self, version: Option<String>) {
        self.state.write().unwrap().app_version = version;
    }

    pub fn set_app_locale(&self, locale: Option<String>) {
        self.state.write().unwrap().app_locale = locale;
    }

    /// Sets the user id attached to events. Ids without a prefix are stored as `c:<id>`; the
    /// only accepted explicit prefix is `c:`.
    pub fn set_user_id(&self, user_id: Option<&str>) -> AnalyticsResult<()> {
        let normalized = user_id.map(normalize_user_id).transpose()?;
        self.state.write().unwrap().user_id = normalized;
        Ok(())
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.read().unwrap().user_id.clone()
    }

    /// Opts this target, and every descendant, into sending the install id as device id.
    pub fn collect_device_id(&self) {
        self.state.write().unwrap().collect_device_id = true;
    }

    pub fn is_collecting_device_id(&self) -> bool {
        self.state.read().unwrap().collect_device_id
    }

    pub(crate) fn snapshot(&self) -> ConfiguratorState {
        self.state.read().unwrap().clone()
    }
}

fn normalize_user_id(user_id: &str) -> AnalyticsResult<String> {
    if user_id.is_empty() {
        return Err(invalid_argument("user id must not be empty"));
    }
    match user_id.split_once(':') {
        None => Ok(format!("{USER_ID_PREFIX}:{user_id}")),
        Some((prefix, rest)) if prefix == USER_ID_PREFIX && !rest.is_empty() => {
            Ok(user_id.to_owned())
        }
        Some((prefix, _)) => Err(invalid_argument(format!(
            "user id prefix `{prefix}:` is not supported, use `{USER_ID_PREFIX}:` or no prefix"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_removes_defaults() {
        let configurator = PropertyConfigurator::new();
        configurator.set_string("channel", "beta").unwrap();
        configurator.set_long("build", 42).unwrap();

        assert_eq!(
            configurator.event_property("channel"),
            Some(PropertyValue::String("beta".into()))
        );
        assert_eq!(
            configurator.remove_event_property("build"),
            Some(PropertyValue::Long(42))
        );
        assert_eq!(configurator.event_properties().len(), 1);
    }

    #[test]
    fn rejects_empty_keys_and_non_finite_values() {
        let configurator = PropertyConfigurator::new();
        assert!(configurator.set_bool("", true).is_err());
        let err = configurator.set_double("ratio", f64::NAN).unwrap_err();
        assert_eq!(err.code_str(), "analytics/invalid-argument");
        assert!(err.message().contains("finite double"));
        assert!(configurator.event_properties().is_empty());
    }

    #[test]
    fn user_ids_are_prefixed() {
        let configurator = PropertyConfigurator::new();

        configurator.set_user_id(Some("alice")).unwrap();
        assert_eq!(configurator.user_id().as_deref(), Some("c:alice"));

        configurator.set_user_id(Some("c:bob")).unwrap();
        assert_eq!(configurator.user_id().as_deref(), Some("c:bob"));

        assert!(configurator.set_user_id(Some("x:carol")).is_err());
        assert!(configurator.set_user_id(Some("c:")).is_err());
        assert!(configurator.set_user_id(Some("")).is_err());
        assert_eq!(configurator.user_id().as_deref(), Some("c:bob"));

        configurator.set_user_id(None).unwrap();
        assert_eq!(configurator.user_id(), None);
    }

    #[test]
    fn snapshot_captures_app_overrides() {
        let configurator = PropertyConfigurator::new();
        configurator.set_app_version(Some("2.0".into()));
        configurator.set_app_locale(Some("fr-FR".into()));
        assert!(!configurator.is_collecting_device_id());
        configurator.collect_device_id();
        assert!(configurator.is_collecting_device_id());

        let state = configurator.snapshot();
        assert_eq!(state.app_version.as_deref(), Some("2.0"));
        assert_eq!(state.app_locale.as_deref(), Some("fr-FR"));
        assert_eq!(state.app_name, None);
        assert!(state.collect_device_id);
    }
}
