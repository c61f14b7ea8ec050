use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::analytics::api::AnalyticsContext;
use crate::analytics::configurator::PropertyConfigurator;
use crate::analytics::constants::INSTRUMENTATION_KEY_PREFIX;
use crate::analytics::dispatcher;
use crate::analytics::error::AnalyticsResult;
use crate::analytics::properties::EventProperties;
use crate::analytics::validation::validate;
use crate::analytics::LOGGER;

/// A node of the transmission target tree.
///
/// Handles are cheap to clone and compare by identity. A target owns its children; children
/// only keep a weak reference to their parent.
#[derive(Clone)]
pub struct TransmissionTarget {
    inner: Arc<TargetInner>,
}

pub(crate) struct TargetInner {
    token: String,
    parent: Option<Weak<TargetInner>>,
    children: Mutex<HashMap<String, Arc<TargetInner>>>,
    enabled: AtomicBool,
    paused: AtomicBool,
    configurator: PropertyConfigurator,
    pub(crate) context: Arc<AnalyticsContext>,
}

impl TargetInner {
    pub(crate) fn new(
        token: String,
        parent: Option<Weak<TargetInner>>,
        context: Arc<AnalyticsContext>,
    ) -> Self {
        Self {
            token,
            parent,
            children: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            configurator: PropertyConfigurator::new(),
            context,
        }
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub(crate) fn configurator(&self) -> &PropertyConfigurator {
        &self.configurator
    }

    /// This node followed by its ancestors up to the root, or `None` when an ancestor has
    /// already been torn down.
    pub(crate) fn lineage(self: &Arc<Self>) -> Option<Vec<Arc<TargetInner>>> {
        let mut chain = vec![Arc::clone(self)];
        let mut current = Arc::clone(self);
        while let Some(parent) = &current.parent {
            let parent = parent.upgrade()?;
            chain.push(Arc::clone(&parent));
            current = parent;
        }
        Some(chain)
    }
}

impl fmt::Debug for TransmissionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransmissionTarget")
            .field("token", &self.inner.token)
            .field("enabled", &self.is_enabled())
            .field("paused", &self.is_paused())
            .field("children", &self.inner.children.lock().unwrap().len())
            .finish()
    }
}

impl PartialEq for TransmissionTarget {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TransmissionTarget {}

impl TransmissionTarget {
    pub(crate) fn from_inner(inner: Arc<TargetInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<TargetInner> {
        &self.inner
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    /// Instrumentation key derived from the token: `o:` followed by the part before the first `-`.
    pub fn instrumentation_key(&self) -> String {
        instrumentation_key(&self.inner.token)
    }

    pub fn ptr_eq(&self, other: &TransmissionTarget) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn parent(&self) -> Option<TransmissionTarget> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(TransmissionTarget::from_inner)
    }

    pub fn property_configurator(&self) -> &PropertyConfigurator {
        &self.inner.configurator
    }

    /// Returns the child registered under `token`, creating it on first use. Concurrent callers
    /// racing on the same token all receive the same child.
    pub fn transmission_target_for_token(&self, token: &str) -> TransmissionTarget {
        let mut created = false;
        let child = {
            let mut children = self.inner.children.lock().unwrap();
            children
                .entry(token.to_owned())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(TargetInner::new(
                        token.to_owned(),
                        Some(Arc::downgrade(&self.inner)),
                        Arc::clone(&self.inner.context),
                    ))
                })
                .clone()
        };
        if created {
            LOGGER.verbose(format!(
                "Created transmission target `{token}` under `{}`",
                self.inner.token
            ));
        }
        TransmissionTarget::from_inner(child)
    }

    /// Sets the local enabled flag. Descendants keep their own flag but stop sending while any
    /// ancestor is disabled.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Local enabled flag only. See [`TransmissionTarget::is_effectively_enabled`].
    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    /// `true` when this target and every ancestor up to the root are enabled.
    pub fn is_effectively_enabled(&self) -> bool {
        self.inner
            .lineage()
            .is_some_and(|chain| chain.iter().all(|node| node.is_enabled()))
    }

    /// Stops this target from sending. Descendants are not affected.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    pub fn track_event(&self, name: &str) -> AnalyticsResult<()> {
        self.track_event_with_typed_properties(name, None)
    }

    pub fn track_event_with_properties(
        &self,
        name: &str,
        properties: BTreeMap<String, String>,
    ) -> AnalyticsResult<()> {
        self.track_event_with_typed_properties(
            name,
            Some(EventProperties::from_string_map(properties)),
        )
    }

    /// Validates and sends an event.
    ///
    /// Only validation failures are returned, including a merged event that grows past the size
    /// limit once default properties are applied. Events dropped because this target is paused or
    /// because it or an ancestor is disabled still return `Ok(())`.
    pub fn track_event_with_typed_properties(
        &self,
        name: &str,
        properties: Option<EventProperties>,
    ) -> AnalyticsResult<()> {
        let secret_configured = self.inner.context.options.has_app_secret();
        let result = validate(name, properties.as_ref(), secret_configured).and_then(|event| {
            if !event.discarded_keys().is_empty() {
                LOGGER.warn(format!(
                    "Event `{name}` dropped invalid or reserved properties: {}",
                    event.discarded_keys().join(", ")
                ));
            }
            dispatcher::dispatch(self, event)
        });

        if let Err(err) = &result {
            LOGGER.error(format!("Rejected event for target `{}`: {err}", self.token()));
        }
        result
    }
}

pub(crate) fn instrumentation_key(token: &str) -> String {
    let tenant = token.split('-').next().unwrap_or(token);
    format!("{INSTRUMENTATION_KEY_PREFIX}{tenant}")
}
