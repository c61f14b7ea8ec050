//! Routes validated events from a target to the transport.
//!
//! Events are dropped silently when the target is paused or when the target or one of its
//! ancestors is disabled; callers cannot tell a dropped event from a sent one. The only error
//! surfaced here is a merged event exceeding the size limit.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::analytics::constants::{
    COMMON_SCHEMA_VERSION, DEVICE_ID_PREFIX, MAX_EVENT_SIZE_BYTES, RESERVED_PROPERTY_KEYS,
};
use crate::analytics::error::{payload_too_large, AnalyticsResult};
use crate::analytics::event::{AppExtension, EnrichedEvent, EventExtensions};
use crate::analytics::target::{instrumentation_key, TargetInner, TransmissionTarget};
use crate::analytics::validation::{encoded_size, ValidatedEvent};
use crate::analytics::LOGGER;

/// Reason an event was not handed to the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PolicyDrop {
    /// The target or one of its ancestors is disabled.
    Disabled,
    /// The target itself is paused.
    Paused,
    /// An ancestor was torn down while this target was still referenced.
    Detached,
}

impl fmt::Display for PolicyDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PolicyDrop::Disabled => "target or ancestor disabled",
            PolicyDrop::Paused => "target paused",
            PolicyDrop::Detached => "target detached from its tree",
        };
        f.write_str(label)
    }
}

/// Sends `event` through `target` if the target is allowed to send.
///
/// Policy drops return `Ok(())`. With an app secret configured, reserved keys inherited from
/// property configurators are stripped and the merged event must still fit in
/// [`MAX_EVENT_SIZE_BYTES`]; an oversized event is returned as an error and never enqueued.
pub(crate) fn dispatch(
    target: &TransmissionTarget,
    event: ValidatedEvent,
) -> AnalyticsResult<()> {
    let inner = target.inner();
    let root_to_leaf = match admit(inner) {
        Ok(root_to_leaf) => root_to_leaf,
        Err(reason) => {
            LOGGER.debug(format!(
                "Not sending event `{}` for target `{}`: {reason}",
                event.name(),
                inner.token()
            ));
            return Ok(());
        }
    };

    let enriched = enrich(inner, &root_to_leaf, event)?;
    inner.context.transport.enqueue(inner.token(), enriched);
    Ok(())
}

/// Applies the enablement and pause policy. On success returns the target's lineage ordered
/// from the root down to the target.
pub(crate) fn admit(inner: &Arc<TargetInner>) -> Result<Vec<Arc<TargetInner>>, PolicyDrop> {
    let mut lineage = inner.lineage().ok_or(PolicyDrop::Detached)?;
    if !lineage.iter().all(|node| node.is_enabled()) {
        return Err(PolicyDrop::Disabled);
    }
    if inner.is_paused() {
        return Err(PolicyDrop::Paused);
    }
    lineage.reverse();
    Ok(lineage)
}

/// Merges inherited configuration into the event and runs the authentication providers.
fn enrich(
    inner: &Arc<TargetInner>,
    root_to_leaf: &[Arc<TargetInner>],
    event: ValidatedEvent,
) -> AnalyticsResult<EnrichedEvent> {
    let (name, explicit) = event.into_parts();
    let mut enriched = EnrichedEvent {
        ver: COMMON_SCHEMA_VERSION.to_string(),
        name,
        time: Utc::now(),
        instrumentation_key: instrumentation_key(inner.token()),
        target_token: inner.token().to_owned(),
        ext: EventExtensions::default(),
        data: BTreeMap::new(),
        tickets: BTreeMap::new(),
    };
    apply_configuration(&mut enriched, root_to_leaf, &inner.context.options.install_id);
    enriched.data.extend(explicit);

    if inner.context.options.has_app_secret() {
        enforce_secret_rules(&mut enriched)?;
    }

    inner.context.registry.enrich(&mut enriched);
    Ok(enriched)
}

fn enforce_secret_rules(event: &mut EnrichedEvent) -> AnalyticsResult<()> {
    let stripped: Vec<_> = RESERVED_PROPERTY_KEYS
        .into_iter()
        .filter(|reserved| event.data.remove(*reserved).is_some())
        .collect();
    if !stripped.is_empty() {
        LOGGER.warn(format!(
            "Event `{}` dropped reserved default properties: {}",
            event.name,
            stripped.join(", ")
        ));
    }

    let size = encoded_size(&event.name, &event.data)?;
    if size > MAX_EVENT_SIZE_BYTES {
        return Err(payload_too_large(format!(
            "Event `{}` is {size} bytes once merged with default properties, above the {MAX_EVENT_SIZE_BYTES} byte limit",
            event.name
        )));
    }
    Ok(())
}

fn apply_configuration(
    event: &mut EnrichedEvent,
    root_to_leaf: &[Arc<TargetInner>],
    install_id: &str,
) {
    let mut app = AppExtension::default();
    let mut user_id = None;
    let mut collect_device_id = false;

    for node in root_to_leaf {
        let state = node.configurator().snapshot();
        event.data.extend(state.event_properties);
        if state.app_name.is_some() {
            app.name = state.app_name;
        }
        if state.app_version.is_some() {
            app.version = state.app_version;
        }
        if state.app_locale.is_some() {
            app.locale = state.app_locale;
        }
        if state.user_id.is_some() {
            user_id = state.user_id;
        }
        collect_device_id |= state.collect_device_id;
    }

    event.ext.app = app;
    event.ext.user.local_id = user_id;
    if collect_device_id {
        event.ext.device.local_id = Some(format!("{DEVICE_ID_PREFIX}{install_id}"));
    }
}
