//! Transmission targets, event validation and dispatch.
//!
//! Events are tracked through a [`TransmissionTarget`]. Targets form a tree rooted at
//! [`Analytics::transmission_target_for_token`]; each target inherits default properties from its
//! ancestors and can be disabled or paused. Validated events that survive the enablement policy
//! are enriched by every registered [`AuthenticationProvider`] and handed to an
//! [`EventTransport`].

use std::sync::LazyLock;

use crate::logger::Logger;

mod api;
mod auth;
mod configurator;
pub mod constants;
mod dispatcher;
pub mod error;
mod event;
mod properties;
mod target;
mod transport;
mod validation;

pub use api::{Analytics, AnalyticsOptions};
pub use auth::{
    AuthenticationProvider, AuthenticationRegistry, AuthenticationType,
    TicketAuthenticationProvider,
};
pub use configurator::PropertyConfigurator;
pub use event::{
    AppExtension, DeviceExtension, EnrichedEvent, EventExtensions, ProtocolExtension,
    UserExtension,
};
pub use properties::{EventProperties, PropertyValue};
pub use target::TransmissionTarget;
pub use transport::{ChannelTransport, EventTransport, NoopTransport, TransportEnvelope};
pub use validation::{encoded_size, is_valid_event_name, validate, ValidatedEvent};

pub static LOGGER: LazyLock<Logger> =
    LazyLock::new(|| Logger::new(constants::ANALYTICS_LOGGER_NAME));
