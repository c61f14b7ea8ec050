//! Rust port of the App Center Analytics transmission target core.
//!
//! ```
//! use std::sync::Arc;
//! use appcenter_analytics_rs::analytics::{Analytics, AnalyticsOptions, EventProperties, NoopTransport};
//!
//! let analytics = Analytics::new(AnalyticsOptions::default(), Arc::new(NoopTransport));
//! let target = analytics.transmission_target_for_token("tenant-token");
//! target
//!     .property_configurator()
//!     .set_string("channel", "beta")
//!     .unwrap();
//!
//! let mut properties = EventProperties::new();
//! properties.set_long("items", 3).set_bool("gift", false);
//! target
//!     .transmission_target_for_token("checkout")
//!     .track_event_with_typed_properties("cart.checkout", Some(properties))
//!     .unwrap();
//! ```

pub mod analytics;
pub mod logger;
