pub const ANALYTICS_LOGGER_NAME: &str = "AppCenterAnalytics";

/// Largest JSON-encoded event accepted when an app secret is configured (1.9 MiB).
pub const MAX_EVENT_SIZE_BYTES: usize = 1_992_294;

/// Character count bounds of the event name pattern `[a-zA-Z0-9]((\.(?!(\.|$)))|[_a-zA-Z0-9]){3,99}`.
pub const EVENT_NAME_MIN_LENGTH: usize = 4;
pub const EVENT_NAME_MAX_LENGTH: usize = 100;

pub const RESERVED_PROPERTY_KEYS: [&str; 2] = ["baseData", "baseDataType"];

pub const COMMON_SCHEMA_VERSION: &str = "3.0";
pub const INSTRUMENTATION_KEY_PREFIX: &str = "o:";
pub const USER_ID_PREFIX: &str = "c";
pub const DEVICE_ID_PREFIX: &str = "i:";

pub const APP_SECRET_ENV_VAR: &str = "APPCENTER_APP_SECRET";
pub const INSTALL_ID_LENGTH: usize = 32;
