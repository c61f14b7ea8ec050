use std::collections::BTreeMap;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use appcenter_analytics_rs::analytics::error::AnalyticsErrorCode;
use appcenter_analytics_rs::analytics::{
    Analytics, AnalyticsOptions, AuthenticationProvider, AuthenticationRegistry,
    AuthenticationType, ChannelTransport, EnrichedEvent, EventProperties, EventTransport,
    PropertyValue, TicketAuthenticationProvider, TransportEnvelope,
};

#[derive(Default, Clone)]
struct RecordingTransport {
    events: Arc<Mutex<Vec<(String, EnrichedEvent)>>>,
}

impl EventTransport for RecordingTransport {
    fn enqueue(&self, target_token: &str, event: EnrichedEvent) {
        self.events
            .lock()
            .unwrap()
            .push((target_token.to_string(), event));
    }
}

impl RecordingTransport {
    fn take_events(&self) -> Vec<(String, EnrichedEvent)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

fn analytics_with(options: AnalyticsOptions) -> (Analytics, RecordingTransport) {
    let transport = RecordingTransport::default();
    let analytics = Analytics::with_registry(
        options,
        Arc::new(transport.clone()),
        Arc::new(AuthenticationRegistry::new()),
    );
    (analytics, transport)
}

fn with_secret() -> AnalyticsOptions {
    AnalyticsOptions::default().with_app_secret("app-secret")
}

#[test]
fn three_track_variants_reach_the_transport() {
    let (analytics, transport) = analytics_with(AnalyticsOptions::default());
    let target = analytics.transmission_target_for_token("tenant-token");

    target.track_event("plain").unwrap();
    target
        .track_event_with_properties(
            "strings",
            BTreeMap::from([("screen".to_string(), "home".to_string())]),
        )
        .unwrap();
    let mut typed = EventProperties::new();
    typed.set_long("count", 7);
    target
        .track_event_with_typed_properties("typed", Some(typed))
        .unwrap();

    let events = transport.take_events();
    let names: Vec<_> = events.iter().map(|(_, event)| event.name.as_str()).collect();
    assert_eq!(names, ["plain", "strings", "typed"]);
    assert_eq!(
        events[1].1.property("screen"),
        Some(&PropertyValue::String("home".into()))
    );
    assert_eq!(events[2].1.property("count"), Some(&PropertyValue::Long(7)));
}

#[test]
fn policy_drops_are_indistinguishable_from_sends() {
    let (analytics, transport) = analytics_with(AnalyticsOptions::default());
    let root = analytics.transmission_target_for_token("root");
    let child = root.transmission_target_for_token("child");

    root.set_enabled(false);
    assert!(child.track_event("child.disabled").is_ok());
    root.set_enabled(true);

    child.pause();
    assert!(child.track_event("child.paused").is_ok());
    assert!(root.track_event("root.running").is_ok());

    let events = transport.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "root");
}

#[test]
fn validation_failures_never_reach_the_transport() {
    let (analytics, transport) = analytics_with(with_secret());
    let target = analytics.transmission_target_for_token("root");
    target.set_enabled(false);

    let err = target.track_event("no").unwrap_err();
    assert_eq!(err.code, AnalyticsErrorCode::InvalidNamePattern);
    assert!(err.code.is_validation());

    let mut properties = EventProperties::new();
    properties.set_optional("missing", None);
    let err = target
        .track_event_with_typed_properties("valid.name", Some(properties))
        .unwrap_err();
    assert_eq!(err.code, AnalyticsErrorCode::NullProperty);

    target.set_enabled(true);
    assert!(target.track_event("").is_err());
    assert!(transport.take_events().is_empty());
}

#[test]
fn reserved_keys_are_stripped_before_transport() {
    let (analytics, transport) = analytics_with(with_secret());
    let target = analytics.transmission_target_for_token("root");

    let mut properties = EventProperties::new();
    properties
        .set_string("baseDataType", "custom")
        .set_string("kept", "yes");
    assert!(properties.contains_key("baseDataType"));

    target
        .track_event_with_typed_properties("reserved.keys", Some(properties))
        .unwrap();

    let events = transport.take_events();
    assert!(events[0].1.property("baseDataType").is_none());
    assert!(events[0].1.property("kept").is_some());
}

#[test]
fn payload_size_limit_depends_on_the_secret() {
    let blob = "x".repeat(2 * 1024 * 1024);
    let mut properties = EventProperties::new();
    properties.set_string("blob", blob);

    let (analytics, transport) = analytics_with(with_secret());
    let err = analytics
        .transmission_target_for_token("root")
        .track_event_with_typed_properties("large.upload", Some(properties.clone()))
        .unwrap_err();
    assert_eq!(err.code, AnalyticsErrorCode::PayloadTooLarge);
    assert!(transport.take_events().is_empty());

    let (analytics, transport) = analytics_with(AnalyticsOptions::default());
    analytics
        .transmission_target_for_token("root")
        .track_event_with_typed_properties("large.upload", Some(properties))
        .unwrap();
    assert_eq!(transport.take_events().len(), 1);
}

#[test]
fn default_properties_follow_the_secret_rules() {
    let (analytics, transport) = analytics_with(with_secret());
    let root = analytics.transmission_target_for_token("root");
    let configurator = root.property_configurator();
    configurator.set_string("baseDataType", "custom").unwrap();
    configurator.set_string("kept", "yes").unwrap();

    root.track_event("valid.name").unwrap();
    let events = transport.take_events();
    assert_eq!(events.len(), 1);
    assert!(events[0].1.property("baseDataType").is_none());
    assert!(events[0].1.property("kept").is_some());

    configurator
        .set_string("blob", "x".repeat(2 * 1024 * 1024))
        .unwrap();
    let err = root.track_event("valid.name").unwrap_err();
    assert_eq!(err.code, AnalyticsErrorCode::PayloadTooLarge);
    assert!(transport.take_events().is_empty());
}

#[test]
fn default_properties_are_unrestricted_without_a_secret() {
    let (analytics, transport) = analytics_with(AnalyticsOptions::default());
    let root = analytics.transmission_target_for_token("root");
    let configurator = root.property_configurator();
    configurator.set_string("baseDataType", "custom").unwrap();
    configurator
        .set_string("blob", "x".repeat(2 * 1024 * 1024))
        .unwrap();

    root.track_event("valid.name").unwrap();

    let events = transport.take_events();
    assert!(events[0].1.property("baseDataType").is_some());
    assert!(events[0].1.property("blob").is_some());
}

#[test]
fn non_finite_values_are_dropped_but_event_is_sent() {
    let (analytics, transport) = analytics_with(AnalyticsOptions::default());
    let target = analytics.transmission_target_for_token("root");

    let mut properties = EventProperties::new();
    properties
        .set_double("nan", f64::NAN)
        .set_double("inf", f64::INFINITY)
        .set_double("ok", 1.5);
    target
        .track_event_with_typed_properties("numbers", Some(properties))
        .unwrap();

    let events = transport.take_events();
    let keys: Vec<_> = events[0].1.data.keys().cloned().collect();
    assert_eq!(keys, ["ok"]);
}

#[test]
fn concurrent_child_creation_yields_one_node() {
    let (analytics, _transport) = analytics_with(AnalyticsOptions::default());
    let root = analytics.transmission_target_for_token("root");
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let root = root.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                root.transmission_target_for_token("t")
            })
        })
        .collect();
    let children: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(children[0].ptr_eq(&children[1]));
    assert!(children[0].ptr_eq(&root.transmission_target_for_token("t")));
}

#[test]
fn concurrent_tracking_delivers_every_event() {
    let (analytics, transport) = analytics_with(AnalyticsOptions::default());
    let root = analytics.transmission_target_for_token("root");

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let target = root.transmission_target_for_token(&format!("worker-{worker}"));
            thread::spawn(move || {
                for _ in 0..25 {
                    target.track_event("worker.tick").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(transport.take_events().len(), 100);
}

#[test]
fn authentication_providers_apply_in_order() {
    struct Marker(&'static str);
    impl AuthenticationProvider for Marker {
        fn enrich(&self, event: &mut EnrichedEvent) {
            event.ext.protocol.ticket_keys.push(self.0.to_string());
        }
    }

    let (analytics, transport) = analytics_with(AnalyticsOptions::default());
    analytics.add_authentication_provider(Arc::new(Marker("P1")));
    analytics.add_authentication_provider(Arc::new(Marker("P2")));

    analytics
        .transmission_target_for_token("root")
        .transmission_target_for_token("child")
        .track_event("signed.event")
        .unwrap();

    let events = transport.take_events();
    assert_eq!(events[0].1.ext.protocol.ticket_keys, ["P1", "P2"]);
}

#[test]
fn registries_are_isolated_per_instance() {
    let (first, first_transport) = analytics_with(AnalyticsOptions::default());
    let (second, second_transport) = analytics_with(AnalyticsOptions::default());
    let provider =
        TicketAuthenticationProvider::new(AuthenticationType::MsaCompact, "ticket-key").unwrap();
    provider.update_token("token", None);
    first.add_authentication_provider(Arc::new(provider));

    first.transmission_target_for_token("root").track_event("with.ticket").unwrap();
    second.transmission_target_for_token("root").track_event("without.ticket").unwrap();

    let signed = first_transport.take_events();
    let unsigned = second_transport.take_events();
    assert_eq!(signed[0].1.tickets.values().next().map(String::as_str), Some("p:token"));
    assert!(unsigned[0].1.tickets.is_empty());
    assert!(unsigned[0].1.ext.protocol.ticket_keys.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn channel_transport_hands_events_to_an_async_consumer() {
    let (transport, receiver) = ChannelTransport::unbounded();
    let analytics = Analytics::with_registry(
        AnalyticsOptions::default(),
        Arc::new(transport),
        Arc::new(AuthenticationRegistry::new()),
    );
    let target = analytics.transmission_target_for_token("tenant-abc");
    target.property_configurator().set_bool("beta", true).unwrap();

    target.track_event("async.event").unwrap();

    let TransportEnvelope {
        target_token,
        event,
    } = receiver.recv().await.unwrap();
    assert_eq!(target_token, "tenant-abc");
    assert_eq!(event.instrumentation_key, "o:tenant");
    assert_eq!(event.property("beta"), Some(&PropertyValue::Boolean(true)));
}
