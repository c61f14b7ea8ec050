//! Builds a small transmission target tree, tracks a few events and prints what reaches the
//! transport. Set `APPCENTER_APP_SECRET` to enable the stricter validation rules.

use std::collections::BTreeMap;
use std::sync::Arc;

use appcenter_analytics_rs::analytics::{
    Analytics, AnalyticsOptions, AuthenticationType, ChannelTransport, EventProperties,
    TicketAuthenticationProvider,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (transport, receiver) = ChannelTransport::unbounded();
    let analytics = Analytics::new(AnalyticsOptions::from_env(), Arc::new(transport));

    let provider = Arc::new(TicketAuthenticationProvider::new(
        AuthenticationType::MsaCompact,
        "demo-user",
    )?);
    provider.update_token("demo-token", None);
    analytics.add_authentication_provider(provider);

    let root = analytics.transmission_target_for_token("0123456789abcdef-demo");
    root.property_configurator()
        .set_app_version(Some("1.0.0".into()));
    root.property_configurator().set_string("channel", "beta")?;

    let checkout = root.transmission_target_for_token("checkout");
    checkout
        .property_configurator()
        .set_string("screen", "cart")?;

    root.track_event("app.launch")?;
    checkout.track_event_with_properties(
        "cart.view",
        BTreeMap::from([("items".to_string(), "3".to_string())]),
    )?;

    let mut properties = EventProperties::new();
    properties
        .set_double("total", 42.5)
        .set_bool("gift", true)
        .set_double("discount", f64::NAN);
    checkout.track_event_with_typed_properties("cart.checkout", Some(properties))?;

    checkout.pause();
    checkout.track_event("cart.abandon")?;

    if let Err(err) = root.track_event("") {
        println!("Rejected: {err}");
    }

    // Dropping every handle closes the channel once the queued events are drained.
    drop(checkout);
    drop(root);
    drop(analytics);

    while let Ok(envelope) = receiver.recv().await {
        println!(
            "[{}] {} -> {}",
            envelope.target_token,
            envelope.event.name,
            envelope.event.to_json()?
        );
    }

    Ok(())
}
