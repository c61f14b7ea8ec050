//! Event validation rules.
//!
//! Every check here is pure: rejected events return an error and partially invalid property sets
//! are pruned. Nothing is logged or dispatched from this module.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::analytics::constants::{
    COMMON_SCHEMA_VERSION, EVENT_NAME_MAX_LENGTH, EVENT_NAME_MIN_LENGTH, MAX_EVENT_SIZE_BYTES,
    RESERVED_PROPERTY_KEYS,
};
use crate::analytics::error::{
    empty_name, internal_error, invalid_name_pattern, null_property, payload_too_large,
    AnalyticsResult,
};
use crate::analytics::properties::{EventProperties, PropertyValue};

/// An event that passed validation, carrying its possibly pruned property set.
///
/// Validated events are inspection results only. They are sent through the track operations
/// of a [`TransmissionTarget`](crate::analytics::TransmissionTarget), which validate against
/// the target's own secret configuration; there is no public way to send one directly.
///
/// ```compile_fail
/// use appcenter_analytics_rs::analytics::dispatch;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedEvent {
    name: String,
    properties: BTreeMap<String, PropertyValue>,
    discarded_keys: Vec<String>,
}

impl ValidatedEvent {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// Keys removed during validation (non-finite doubles, reserved keys), in key order.
    pub fn discarded_keys(&self) -> &[String] {
        &self.discarded_keys
    }

    pub(crate) fn into_parts(self) -> (String, BTreeMap<String, PropertyValue>) {
        (self.name, self.properties)
    }
}

#[derive(Serialize)]
struct SizeEnvelope<'a> {
    ver: &'a str,
    name: &'a str,
    time: String,
    data: &'a BTreeMap<String, PropertyValue>,
}

/// Validates an event name and its properties.
///
/// Rules run in order and stop at the first failure:
/// 1. the name must not be empty;
/// 2. property names must not be empty and values must be present;
/// 3. NaN and infinite doubles are discarded;
/// 4. with a secret configured, the name must match the event name pattern, the reserved
///    `baseData`/`baseDataType` keys are discarded, and the JSON-encoded event must fit in
///    [`MAX_EVENT_SIZE_BYTES`].
pub fn validate(
    event_name: &str,
    properties: Option<&EventProperties>,
    secret_configured: bool,
) -> AnalyticsResult<ValidatedEvent> {
    if event_name.is_empty() {
        return Err(empty_name("Event name must not be empty"));
    }

    let mut kept = BTreeMap::new();
    let mut discarded_keys = Vec::new();
    if let Some(properties) = properties {
        for (key, value) in properties.iter() {
            if key.is_empty() {
                return Err(null_property(format!(
                    "Event `{event_name}` has a property with an empty name"
                )));
            }
            let Some(value) = value else {
                return Err(null_property(format!(
                    "Event `{event_name}` has no value for property `{key}`"
                )));
            };
            kept.insert(key.to_owned(), value.clone());
        }
    }

    kept.retain(|key, value| {
        let finite = value.is_finite();
        if !finite {
            discarded_keys.push(key.clone());
        }
        finite
    });

    if secret_configured {
        if !is_valid_event_name(event_name) {
            return Err(invalid_name_pattern(format!(
                "Event name `{event_name}` must match [a-zA-Z0-9]((\\.(?!(\\.|$)))|[_a-zA-Z0-9]){{3,99}}"
            )));
        }

        for reserved in RESERVED_PROPERTY_KEYS {
            if kept.remove(reserved).is_some() {
                discarded_keys.push(reserved.to_string());
            }
        }

        let size = encoded_size(event_name, &kept)?;
        if size > MAX_EVENT_SIZE_BYTES {
            return Err(payload_too_large(format!(
                "Event `{event_name}` is {size} bytes once encoded, above the {MAX_EVENT_SIZE_BYTES} byte limit"
            )));
        }
    }

    discarded_keys.sort();
    Ok(ValidatedEvent {
        name: event_name.to_owned(),
        properties: kept,
        discarded_keys,
    })
}

/// Returns `true` when `name` matches `^[a-zA-Z0-9]((\.(?!(\.|$)))|[_a-zA-Z0-9]){3,99}$`.
pub fn is_valid_event_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if !(EVENT_NAME_MIN_LENGTH..=EVENT_NAME_MAX_LENGTH).contains(&bytes.len()) {
        return false;
    }
    if !bytes[0].is_ascii_alphanumeric() {
        return false;
    }

    bytes.iter().enumerate().skip(1).all(|(index, byte)| match byte {
        b'.' => !matches!(bytes.get(index + 1), None | Some(b'.')),
        b'_' => true,
        other => other.is_ascii_alphanumeric(),
    })
}

/// Size in bytes of the event once encoded as JSON.
///
/// The timestamp is rendered with nanosecond precision so the result does not depend on the
/// current clock reading.
pub fn encoded_size(
    event_name: &str,
    properties: &BTreeMap<String, PropertyValue>,
) -> AnalyticsResult<usize> {
    let envelope = SizeEnvelope {
        ver: COMMON_SCHEMA_VERSION,
        name: event_name,
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        data: properties,
    };
    serde_json::to_vec(&envelope)
        .map(|encoded| encoded.len())
        .map_err(|err| internal_error(format!("failed to encode event `{event_name}`: {err}")))
}
