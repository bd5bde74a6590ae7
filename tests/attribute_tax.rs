//! End-to-end tests for the attribute-taxonomy type over the in-memory
//! collaborators: full save/load/update/delete lifecycle, uniqueness
//! enforcement, metadata, and registry failure handling.

use extdata::attribute::AttributeTax;
use extdata::backend::RelationalBackend;
use extdata::entity::Context;
use extdata::error::DataError;
use extdata::store::SaveAction;
use extdata::test_helpers::{attribute_fixture, seed_attribute};
use extdata::value::Value;
use serde_json::json;
use std::sync::atomic::Ordering;

#[test]
fn create_then_load_round_trips_core_data() {
    let fx = attribute_fixture();

    let mut att = fx.attribute_tax.new_attribute();
    att.set_label("Color").unwrap();
    att.set_name("color").unwrap();
    att.set_public(1).unwrap();
    let action = att.save().unwrap();

    let id = match action {
        SaveAction::Created(id) => id,
        other => panic!("expected Created, got {other:?}"),
    };
    assert!(id > 0);
    assert_eq!(att.id(), id);

    let loaded = fx.attribute_tax.instance(id).unwrap();
    assert_eq!(loaded.get_label(Context::View), "Color");
    assert_eq!(loaded.get_name(Context::View), "color");
    assert_eq!(loaded.get_public(Context::View), 1);
    assert_eq!(loaded.get_orderby(Context::View), "menu_order");
    assert_eq!(loaded.get_type(Context::View), "select");
    assert_eq!(loaded.taxonomy_name(), "pa_color");
}

#[test]
fn save_is_idempotent_once_clean() {
    let fx = attribute_fixture();

    let mut att = fx.attribute_tax.new_attribute();
    att.set_label("Size").unwrap();
    att.set_name("size").unwrap();
    att.save().unwrap();
    assert_eq!(fx.api.creates(), 1);

    // A clean entity saves to Unchanged without touching the registry.
    assert_eq!(att.save().unwrap(), SaveAction::Unchanged);
    assert_eq!(fx.api.creates(), 1);
    assert_eq!(fx.api.updates(), 0);

    // Setting the same value again is not a change either.
    att.set_name("size").unwrap();
    assert_eq!(att.save().unwrap(), SaveAction::Unchanged);
    assert_eq!(fx.api.updates(), 0);
}

#[test]
fn update_pushes_changed_columns_through_the_registry() {
    let fx = attribute_fixture();
    let id = seed_attribute(&fx, "Color", "color");

    let mut att = fx.attribute_tax.instance(id).unwrap();
    att.set_label("Colour").unwrap();
    assert_eq!(att.save().unwrap(), SaveAction::Updated);
    assert_eq!(fx.api.updates(), 1);

    let reloaded = fx.attribute_tax.instance(id).unwrap();
    assert_eq!(reloaded.get_label(Context::View), "Colour");
    assert_eq!(reloaded.get_name(Context::View), "color");
}

#[test]
fn duplicate_name_is_rejected_and_leaves_the_entity_transient() {
    let fx = attribute_fixture();
    seed_attribute(&fx, "Color", "color");

    let mut dup = fx.attribute_tax.new_attribute();
    dup.set_label("Colour").unwrap();
    dup.set_name("color").unwrap();
    let err = dup.save().unwrap_err();

    assert!(matches!(err, DataError::NonUnique { ref property, .. } if property == "name"));
    assert_eq!(dup.id(), 0);
    // The change set survives so the caller can fix the name and retry.
    assert!(dup.entity().is_dirty());
    dup.set_name("colour").unwrap();
    assert!(matches!(dup.save().unwrap(), SaveAction::Created(_)));
}

#[test]
fn renaming_onto_a_taken_name_fails_but_keeping_your_own_succeeds() {
    let fx = attribute_fixture();
    seed_attribute(&fx, "Color", "color");
    let id = seed_attribute(&fx, "Size", "size");

    let mut att = fx.attribute_tax.instance(id).unwrap();
    att.set_name("color").unwrap();
    assert!(matches!(att.save(), Err(DataError::NonUnique { .. })));

    // Writing the row's own name back is not a collision.
    let mut same = fx.attribute_tax.instance(id).unwrap();
    same.set_name("size").unwrap();
    same.set_label("Shoe Size").unwrap();
    assert_eq!(same.save().unwrap(), SaveAction::Updated);
}

#[test]
fn metadata_round_trips_and_dies_with_the_attribute() {
    let fx = attribute_fixture();
    let id = seed_attribute(&fx, "Color", "color");

    let mut att = fx.attribute_tax.instance(id).unwrap();
    att.set_meta("swatch", json!("#ff0000"));
    att.set_meta("variants", json!(["red", "blue"]));
    assert_eq!(att.save().unwrap(), SaveAction::Updated);
    // Metadata-only saves never touch the registry.
    assert_eq!(fx.api.updates(), 0);

    let loaded = fx.attribute_tax.instance(id).unwrap();
    assert_eq!(loaded.get_meta("swatch"), Some(&json!("#ff0000")));
    assert_eq!(loaded.get_meta("variants"), Some(&json!(["red", "blue"])));

    let mut doomed = fx.attribute_tax.instance(id).unwrap();
    doomed.delete().unwrap();
    assert_eq!(doomed.id(), 0);
    assert!(fx
        .backend
        .meta_read_all("xt_attribute_taxonomymeta", "attribute_taxonomy_id", id)
        .unwrap()
        .is_empty());
    assert!(matches!(
        fx.attribute_tax.instance(id),
        Err(DataError::NotFound { .. })
    ));
}

#[test]
fn deleting_an_absent_attribute_is_an_error() {
    let fx = attribute_fixture();
    let mut ghost = fx.attribute_tax.new_attribute();
    ghost.set_attribute_id(42);
    assert!(matches!(ghost.delete(), Err(DataError::ExternalApi(_))));
}

#[test]
fn from_label_creates_once_and_resolves_thereafter() {
    let fx = attribute_fixture();

    let att = AttributeTax::from_label(&fx.attribute_tax.factory, "Shoe Size").unwrap();
    assert!(att.id() > 0);
    // The registry derives the slug; the re-read surfaces it.
    assert_eq!(att.get_name(Context::View), "shoe-size");
    assert_eq!(fx.api.creates(), 1);

    let again = AttributeTax::from_label(&fx.attribute_tax.factory, "Shoe Size").unwrap();
    assert_eq!(again.id(), att.id());
    assert_eq!(fx.api.creates(), 1);
}

#[test]
fn lookups_strip_the_taxonomy_namespace() {
    let fx = attribute_fixture();
    let id = seed_attribute(&fx, "Color", "color");

    let store = &fx.attribute_tax.store;
    assert_eq!(store.id_by_name("color").unwrap(), id);
    assert_eq!(store.id_by_name("pa_color").unwrap(), id);
    assert_eq!(store.id_by_name("missing").unwrap(), 0);

    let entity = store.find_by_name("pa_color").unwrap().unwrap();
    assert_eq!(entity.id(), id);
    assert!(store.find_by_name("").unwrap().is_none());
}

#[test]
fn failed_create_leaves_the_entity_retryable() {
    let fx = attribute_fixture();
    fx.api.fail_creates.store(true, Ordering::SeqCst);

    let mut att = fx.attribute_tax.new_attribute();
    att.set_label("Color").unwrap();
    att.set_name("color").unwrap();
    assert!(matches!(att.save(), Err(DataError::ExternalApi(_))));
    assert_eq!(att.id(), 0);

    fx.api.fail_creates.store(false, Ordering::SeqCst);
    assert!(matches!(att.save().unwrap(), SaveAction::Created(_)));
}

#[test]
fn rejected_update_keeps_the_entity_dirty() {
    let fx = attribute_fixture();
    let id = seed_attribute(&fx, "Color", "color");
    fx.api.fail_updates.store(true, Ordering::SeqCst);

    let mut att = fx.attribute_tax.instance(id).unwrap();
    att.set_label("Colour").unwrap();
    assert!(matches!(att.save(), Err(DataError::ExternalApi(_))));
    assert!(att.entity().is_dirty());

    fx.api.fail_updates.store(false, Ordering::SeqCst);
    assert_eq!(att.save().unwrap(), SaveAction::Updated);
    assert!(!att.entity().is_dirty());
}

#[test]
fn registry_payload_uses_the_external_vocabulary() {
    let fx = attribute_fixture();
    let mut att = fx.attribute_tax.new_attribute();
    att.set_label("Color").unwrap();
    att.set_name("color").unwrap();

    let args = fx.attribute_tax.store.reformat(att.entity());
    assert_eq!(args.get("name"), Some(&Value::from("Color")));
    assert_eq!(args.get("slug"), Some(&Value::from("color")));
    assert!(!args.contains_key("label"));
    assert_eq!(args.get("type"), Some(&Value::from("select")));
}

#[test]
fn factory_resolution_covers_every_identifier_shape() {
    let fx = attribute_fixture();
    let id = seed_attribute(&fx, "Color", "color");
    let factory = &fx.attribute_tax.factory;

    assert_eq!(factory.resolve_id(id), Some(id));
    assert_eq!(factory.resolve_id("color"), Some(id));
    assert_eq!(factory.resolve_id("pa_color"), Some(id));
    assert_eq!(factory.resolve_id("Color"), Some(id));
    assert_eq!(factory.resolve_id("nope"), None);

    let att = fx.attribute_tax.get("color").unwrap();
    assert_eq!(att.get_label(Context::View), "Color");
    assert!(fx.attribute_tax.get("nope").is_none());
}
