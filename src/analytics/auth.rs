use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, RwLock};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::analytics::error::{invalid_argument, AnalyticsResult};
use crate::analytics::event::EnrichedEvent;

/// Capability that attaches credentials to an outgoing event.
pub trait AuthenticationProvider: Send + Sync {
    fn enrich(&self, event: &mut EnrichedEvent);
}

/// Ordered, append-only set of authentication providers.
///
/// Registering the same `Arc` twice is a no-op: providers are de-duplicated by identity.
#[derive(Default)]
pub struct AuthenticationRegistry {
    providers: Mutex<Vec<Arc<dyn AuthenticationProvider>>>,
}

impl fmt::Debug for AuthenticationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationRegistry")
            .field("providers", &self.len())
            .finish()
    }
}

impl AuthenticationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used when an [`Analytics`](crate::analytics::Analytics) instance is
    /// created without an explicit one.
    pub fn shared() -> Arc<AuthenticationRegistry> {
        static INSTANCE: LazyLock<Arc<AuthenticationRegistry>> =
            LazyLock::new(|| Arc::new(AuthenticationRegistry::new()));
        INSTANCE.clone()
    }

    /// Appends `provider`. Returns `false` when that exact provider is already registered.
    pub fn add(&self, provider: Arc<dyn AuthenticationProvider>) -> bool {
        let mut providers = self.providers.lock().unwrap();
        if providers
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &provider))
        {
            return false;
        }
        providers.push(provider);
        true
    }

    pub fn len(&self) -> usize {
        self.providers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every provider on `event` in registration order.
    pub fn enrich(&self, event: &mut EnrichedEvent) {
        // Snapshot so providers run without the registry lock held.
        let providers = self.providers.lock().unwrap().clone();
        for provider in providers {
            provider.enrich(event);
        }
    }
}

/// Microsoft account ticket flavours understood by the collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthenticationType {
    /// Compact ticket for a first party application.
    MsaCompact,
    /// Delegate ticket for a third party application.
    MsaDelegate,
}

impl AuthenticationType {
    pub fn ticket_prefix(self) -> &'static str {
        match self {
            AuthenticationType::MsaCompact => "p:",
            AuthenticationType::MsaDelegate => "d:",
        }
    }
}

#[derive(Clone, Debug)]
struct TicketToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl TicketToken {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }
}

/// Ticket based provider: tags every event with the SHA-256 of its ticket key and, while a
/// non-expired token is cached, attaches the prefixed token as the matching ticket.
///
/// Acquiring and refreshing the token is left to the application, which pushes it through
/// [`TicketAuthenticationProvider::update_token`].
pub struct TicketAuthenticationProvider {
    auth_type: AuthenticationType,
    ticket_key: String,
    ticket_key_hash: String,
    token: RwLock<Option<TicketToken>>,
}

impl fmt::Debug for TicketAuthenticationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketAuthenticationProvider")
            .field("auth_type", &self.auth_type)
            .field("ticket_key", &self.ticket_key)
            .finish_non_exhaustive()
    }
}

impl TicketAuthenticationProvider {
    pub fn new(auth_type: AuthenticationType, ticket_key: impl Into<String>) -> AnalyticsResult<Self> {
        let ticket_key = ticket_key.into();
        if ticket_key.trim().is_empty() {
            return Err(invalid_argument("ticket key must not be empty"));
        }
        let ticket_key_hash = hash_ticket_key(&ticket_key);
        Ok(Self {
            auth_type,
            ticket_key,
            ticket_key_hash,
            token: RwLock::new(None),
        })
    }

    pub fn auth_type(&self) -> AuthenticationType {
        self.auth_type
    }

    pub fn ticket_key(&self) -> &str {
        &self.ticket_key
    }

    pub fn ticket_key_hash(&self) -> &str {
        &self.ticket_key_hash
    }

    pub fn update_token(&self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        *self.token.write().unwrap() = Some(TicketToken {
            token: token.into(),
            expires_at,
        });
    }

    pub fn clear_token(&self) {
        self.token.write().unwrap().take();
    }

    /// Returns the prefixed ticket when a token is cached and still valid at `now`.
    pub fn ticket_at(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.token.read().unwrap();
        guard
            .as_ref()
            .filter(|token| !token.is_expired(now))
            .map(|token| format!("{}{}", self.auth_type.ticket_prefix(), token.token))
    }
}

impl AuthenticationProvider for TicketAuthenticationProvider {
    fn enrich(&self, event: &mut EnrichedEvent) {
        let hash = self.ticket_key_hash.clone();
        if !event.ext.protocol.ticket_keys.contains(&hash) {
            event.ext.protocol.ticket_keys.push(hash.clone());
        }
        if let Some(ticket) = self.ticket_at(Utc::now()) {
            event.tickets.insert(hash, ticket);
        }
    }
}

fn hash_ticket_key(ticket_key: &str) -> String {
    let digest = Sha256::digest(ticket_key.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
