use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::analytics::auth::{AuthenticationProvider, AuthenticationRegistry};
use crate::analytics::constants::{APP_SECRET_ENV_VAR, INSTALL_ID_LENGTH};
use crate::analytics::target::{TargetInner, TransmissionTarget};
use crate::analytics::transport::EventTransport;
use crate::analytics::LOGGER;

/// Start-up configuration of the analytics core.
#[derive(Clone, PartialEq, Eq)]
pub struct AnalyticsOptions {
    /// App secret. When present the stricter event validation rules apply.
    pub app_secret: Option<String>,
    /// Identifier of this installation, reported as device id by targets that opt in.
    pub install_id: String,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            app_secret: None,
            install_id: generate_install_id(),
        }
    }
}

impl fmt::Debug for AnalyticsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsOptions")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("install_id", &self.install_id)
            .finish()
    }
}

impl AnalyticsOptions {
    /// Default options with the app secret read from `APPCENTER_APP_SECRET` when set.
    pub fn from_env() -> Self {
        let app_secret = std::env::var(APP_SECRET_ENV_VAR)
            .ok()
            .filter(|secret| !secret.trim().is_empty());
        Self {
            app_secret,
            ..Default::default()
        }
    }

    pub fn with_app_secret(mut self, app_secret: impl Into<String>) -> Self {
        self.app_secret = Some(app_secret.into());
        self
    }

    pub fn has_app_secret(&self) -> bool {
        self.app_secret
            .as_deref()
            .is_some_and(|secret| !secret.trim().is_empty())
    }
}

/// State shared by every target of one [`Analytics`] instance.
pub(crate) struct AnalyticsContext {
    pub(crate) options: AnalyticsOptions,
    pub(crate) registry: Arc<AuthenticationRegistry>,
    pub(crate) transport: Arc<dyn EventTransport>,
}

/// Entry point owning the root transmission targets.
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<AnalyticsInner>,
}

struct AnalyticsInner {
    context: Arc<AnalyticsContext>,
    targets: Mutex<HashMap<String, Arc<TargetInner>>>,
}

impl fmt::Debug for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analytics")
            .field("options", &self.inner.context.options)
            .field("targets", &self.inner.targets.lock().unwrap().len())
            .finish()
    }
}

impl Analytics {
    /// Creates an instance backed by the process-wide authentication registry.
    pub fn new(options: AnalyticsOptions, transport: Arc<dyn EventTransport>) -> Self {
        Self::with_registry(options, transport, AuthenticationRegistry::shared())
    }

    /// Creates an instance backed by `registry`, isolating it from other instances.
    pub fn with_registry(
        options: AnalyticsOptions,
        transport: Arc<dyn EventTransport>,
        registry: Arc<AuthenticationRegistry>,
    ) -> Self {
        let context = AnalyticsContext {
            options,
            registry,
            transport,
        };
        Self {
            inner: Arc::new(AnalyticsInner {
                context: Arc::new(context),
                targets: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn options(&self) -> &AnalyticsOptions {
        &self.inner.context.options
    }

    pub fn authentication_registry(&self) -> Arc<AuthenticationRegistry> {
        Arc::clone(&self.inner.context.registry)
    }

    /// Registers a provider that enriches every event sent by every target. Returns `false` when
    /// the provider was already registered.
    pub fn add_authentication_provider(&self, provider: Arc<dyn AuthenticationProvider>) -> bool {
        let added = self.inner.context.registry.add(provider);
        if !added {
            LOGGER.debug("Authentication provider already registered, ignoring");
        }
        added
    }

    /// Returns the root target for `token`, creating it on first use.
    pub fn transmission_target_for_token(&self, token: &str) -> TransmissionTarget {
        let mut created = false;
        let inner = {
            let mut targets = self.inner.targets.lock().unwrap();
            targets
                .entry(token.to_owned())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(TargetInner::new(
                        token.to_owned(),
                        None,
                        Arc::clone(&self.inner.context),
                    ))
                })
                .clone()
        };
        if created {
            LOGGER.verbose(format!("Created transmission target for token `{token}`"));
        }
        TransmissionTarget::from_inner(inner)
    }
}

fn generate_install_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(char::from)
        .take(INSTALL_ID_LENGTH)
        .collect()
}
