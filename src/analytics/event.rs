use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::properties::PropertyValue;

/// The event handed to the transport once a target resolved its configuration and every
/// authentication provider ran.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichedEvent {
    pub ver: String,
    pub name: String,
    pub time: DateTime<Utc>,
    #[serde(rename = "iKey")]
    pub instrumentation_key: String,
    #[serde(skip)]
    pub target_token: String,
    pub ext: EventExtensions,
    pub data: BTreeMap<String, PropertyValue>,
    /// Authentication tickets keyed by ticket key hash. Sent as request headers, never in the body.
    #[serde(skip)]
    pub tickets: BTreeMap<String, String>,
}

impl EnrichedEvent {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.data.get(key)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventExtensions {
    #[serde(skip_serializing_if = "AppExtension::is_empty")]
    pub app: AppExtension,
    #[serde(skip_serializing_if = "UserExtension::is_empty")]
    pub user: UserExtension,
    #[serde(skip_serializing_if = "DeviceExtension::is_empty")]
    pub device: DeviceExtension,
    #[serde(skip_serializing_if = "ProtocolExtension::is_empty")]
    pub protocol: ProtocolExtension,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AppExtension {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "ver", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl AppExtension {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.version.is_none() && self.locale.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserExtension {
    #[serde(rename = "localId", skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
}

impl UserExtension {
    fn is_empty(&self) -> bool {
        self.local_id.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeviceExtension {
    #[serde(rename = "localId", skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
}

impl DeviceExtension {
    fn is_empty(&self) -> bool {
        self.local_id.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolExtension {
    #[serde(rename = "ticketKeys", skip_serializing_if = "Vec::is_empty")]
    pub ticket_keys: Vec<String>,
}

impl ProtocolExtension {
    fn is_empty(&self) -> bool {
        self.ticket_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn serializes_common_schema_shape_without_credentials() {
        let event = EnrichedEvent {
            ver: "3.0".into(),
            name: "app.launch".into(),
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            instrumentation_key: "o:tenant".into(),
            target_token: "tenant-secret".into(),
            ext: EventExtensions {
                app: AppExtension {
                    version: Some("1.2.3".into()),
                    ..Default::default()
                },
                protocol: ProtocolExtension {
                    ticket_keys: vec!["hash".into()],
                },
                ..Default::default()
            },
            data: BTreeMap::from([("cold".to_string(), PropertyValue::Boolean(true))]),
            tickets: BTreeMap::from([("hash".to_string(), "p:token".to_string())]),
        };

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "ver": "3.0",
                "name": "app.launch",
                "time": "2024-01-02T03:04:05Z",
                "iKey": "o:tenant",
                "ext": {
                    "app": { "ver": "1.2.3" },
                    "protocol": { "ticketKeys": ["hash"] }
                },
                "data": { "cold": true }
            })
        );
    }
}
