//! Event hook: taxonomy registration on attribute creation.
//!
//! The host registry fires [`ATTRIBUTE_ADDED_EVENT`] after creating an
//! attribute; the handler registers the backing hierarchical `pa_{name}`
//! taxonomy when one does not already exist. Fire-and-forget: registration
//! failures are logged and never reported back to the creator.

use super::{taxonomy_name, ATTRIBUTE_ADDED_EVENT};
use crate::api::RegistryApi;
use crate::events::{EventBus, EventPayload};
use std::sync::Arc;

/// Payload field carrying the attribute's name (slug).
pub const FIELD_NAME: &str = "attribute_name";
/// Payload field carrying the attribute's display label.
pub const FIELD_LABEL: &str = "attribute_label";

/// Subscribe the taxonomy-registration handler on the bus.
pub fn attach(bus: &dyn EventBus, api: Arc<dyn RegistryApi>) {
    bus.subscribe(
        ATTRIBUTE_ADDED_EVENT,
        Arc::new(move |payload: &EventPayload| register_attribute_taxonomy(api.as_ref(), payload)),
    );
}

/// Register the taxonomy for a freshly created attribute.
pub(crate) fn register_attribute_taxonomy(api: &dyn RegistryApi, payload: &EventPayload) {
    let name = payload.field_str(FIELD_NAME);
    if name.is_empty() {
        log::warn!("{ATTRIBUTE_ADDED_EVENT} payload for id {} has no name", payload.id);
        return;
    }

    let taxonomy = taxonomy_name(name);
    if api.taxonomy_exists(&taxonomy) {
        return;
    }

    let label = match payload.field_str(FIELD_LABEL) {
        "" => name,
        label => label,
    };

    if let Err(err) = api.register_taxonomy(&taxonomy, label, true) {
        // Best-effort: the attribute itself was created fine.
        log::warn!("failed to register taxonomy {taxonomy}: {err}");
    }
}
