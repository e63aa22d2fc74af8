use std::sync::Arc;

use viewplan::model::{Cardinality, Entity, EntityGraph, MeasureDef, ValueType};
use viewplan::semantic::{EntityRegistry, RegistryBuilder, SchemaStore, SemanticError};

fn orders() -> Entity {
    Entity::cube("Orders")
        .with_primary_key("id", ValueType::Number)
        .with_measure(MeasureDef::count("count"))
}

fn users() -> Entity {
    Entity::cube("Users")
        .with_dimension("company", ValueType::String)
        .join_on("Orders", Cardinality::OneToMany, "${Users.id} = ${Orders.user_id}")
}

#[test]
fn test_builder_registers_in_order() {
    let registry = RegistryBuilder::new()
        .with_entity(users())
        .unwrap()
        .with_entity(orders())
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(registry.entity_names(), vec!["Users", "Orders"]);
    assert_eq!(registry.lookup("Users").unwrap().dimensions.len(), 1);
}

#[test]
fn test_unknown_entity() {
    let registry = EntityRegistry::from_entities(vec![orders()]).unwrap();
    assert_eq!(
        registry.lookup("Users").unwrap_err(),
        SemanticError::UnknownEntity("Users".into())
    );
    assert!(registry.relationships_of("Users").is_err());
}

#[test]
fn test_unknown_field() {
    let registry = EntityRegistry::from_entities(vec![orders()]).unwrap();
    assert_eq!(
        registry.field("Orders", "total").unwrap_err(),
        SemanticError::UnknownField {
            entity: "Orders".into(),
            field: "total".into()
        }
    );
    assert!(registry.field("Orders", "count").unwrap().is_measure());
}

#[test]
fn test_duplicate_entity_keeps_first() {
    let mut builder = RegistryBuilder::new();
    builder.register(orders()).unwrap();
    let err = builder
        .register(Entity::cube("Orders").with_dimension("status", ValueType::String))
        .unwrap_err();
    assert!(matches!(err, SemanticError::DuplicateEntity(name) if name == "Orders"));

    let registry = builder.build().unwrap();
    assert!(registry.lookup("Orders").unwrap().dimension("status").is_none());
}

#[test]
fn test_from_graph_json() {
    let graph = EntityGraph::from_json(
        r#"{ "entities": [
            { "name": "Orders", "measures": [{ "name": "count", "type": "count" }] },
            { "name": "Users",
              "relationships": [{ "target": "Orders", "cardinality": "one_to_many" }] }
        ] }"#,
    )
    .unwrap();
    let registry = EntityRegistry::from_graph(graph).unwrap();

    let rels = registry.relationships_of("Users").unwrap();
    assert_eq!(rels.len(), 1);
    assert_eq!(rels[0].target, "Orders");
    assert_eq!(rels[0].cardinality, Cardinality::OneToMany);
}

#[test]
fn test_store_publishes_whole_snapshots() {
    let store = SchemaStore::new(EntityRegistry::from_entities(vec![orders(), users()]).unwrap());
    let before = store.snapshot();
    let fingerprint = store.fingerprint();

    let previous = store.publish(EntityRegistry::from_entities(vec![orders()]).unwrap());
    assert!(Arc::ptr_eq(&before, &previous));

    // Holders of the old snapshot still see it unchanged.
    assert!(before.contains("Users"));
    assert!(!store.snapshot().contains("Users"));
    assert_ne!(store.fingerprint(), fingerprint);
}

#[test]
fn test_failed_reload_keeps_current_snapshot() {
    let store = SchemaStore::new(EntityRegistry::from_entities(vec![orders()]).unwrap());
    let fingerprint = store.fingerprint();

    let broken = EntityGraph::new().with_entity(orders()).with_entity(orders());
    assert!(matches!(
        store.reload(broken),
        Err(SemanticError::DuplicateEntity(_))
    ));
    assert_eq!(store.fingerprint(), fingerprint);

    let next = store
        .reload(EntityGraph::new().with_entity(orders()).with_entity(users()))
        .unwrap();
    assert_eq!(next.len(), 2);
    assert_eq!(store.fingerprint(), next.fingerprint());
}
