use std::sync::Arc;

use viewplan::config::{RejectionPolicy, Settings};
use viewplan::model::{AggregationKind, Cardinality, Entity, FilterDef, MeasureDef, ValueType};
use viewplan::semantic::{
    has_fatal, AggregationPlanNode, CompileState, Compiler, DiagnosticKind, EntityRegistry,
    FilterCompiler, Placement, PlanValidator, Severity,
};

fn entities() -> Vec<Entity> {
    vec![
        Entity::cube("Orders")
            .with_dimension("status", ValueType::String)
            .with_measure(MeasureDef::count("count")),
        Entity::cube("Users")
            .with_dimension("company", ValueType::String)
            .join("Orders", Cardinality::OneToMany),
        Entity::view("CustomersWithoutOrders")
            .include("Users.company")
            .with_measure(
                MeasureDef::new("count")
                    .with_sql("${Users.Orders.count}")
                    .with_type(AggregationKind::Number)
                    .with_filter(FilterDef::sql("${Users.Orders.count} = 0")),
            ),
    ]
}

fn compiled_plan(registry: &Arc<EntityRegistry>) -> AggregationPlanNode {
    Compiler::new(Arc::clone(registry))
        .compile_entity("CustomersWithoutOrders")
        .into_plan()
        .unwrap()
}

#[test]
fn test_valid_plan_has_no_diagnostics() {
    let registry = Arc::new(EntityRegistry::from_entities(entities()).unwrap());
    let plan = compiled_plan(&registry);
    assert!(PlanValidator::new(&registry).validate(&plan).is_empty());
}

#[test]
fn test_validation_does_not_modify_plan() {
    let registry = Arc::new(EntityRegistry::from_entities(entities()).unwrap());
    let plan = compiled_plan(&registry);
    let before = plan.clone();
    let _ = PlanValidator::new(&registry).validate(&plan);
    assert_eq!(plan, before);
}

#[test]
fn test_misplaced_filter() {
    let registry = Arc::new(EntityRegistry::from_entities(entities()).unwrap());
    let mut plan = compiled_plan(&registry);

    let mut filter = FilterCompiler::new(&registry)
        .compile(&FilterDef::sql("${Users.company} = 'Acme'"), "CustomersWithoutOrders")
        .unwrap();
    assert_eq!(filter.placement, Placement::Row);
    filter.placement = Placement::Aggregate;
    plan.aggregate_predicates.push(filter);

    let diagnostics = PlanValidator::new(&registry).validate(&plan);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::TypeMismatch);
    assert_eq!(diagnostics[0].path.as_deref(), Some("Users.company"));
}

#[test]
fn test_stale_plan_against_new_snapshot() {
    let old = Arc::new(EntityRegistry::from_entities(entities()).unwrap());
    let plan = compiled_plan(&old);

    let without_orders: Vec<Entity> = entities()
        .into_iter()
        .filter(|e| e.name != "Orders")
        .collect();
    let new = EntityRegistry::from_entities(without_orders).unwrap();

    let diagnostics = PlanValidator::new(&new).validate(&plan);
    assert!(has_fatal(&diagnostics));
    assert!(diagnostics
        .iter()
        .all(|d| d.kind == DiagnosticKind::UnknownEntity));
    // Every stale reference is reported, not only the first.
    let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.path.as_deref()).collect();
    assert!(paths.contains(&"Users.Orders.count"));
}

#[test]
fn test_ambiguous_join_is_advisory() {
    let mut entities = entities();
    entities[1] = Entity::cube("Users")
        .with_dimension("company", ValueType::String)
        .join_on("Orders", Cardinality::OneToMany, "${Users.id} = ${Orders.user_id}")
        .join_on("Orders", Cardinality::OneToMany, "${Users.id} = ${Orders.buyer_id}");
    let registry = Arc::new(EntityRegistry::from_entities(entities).unwrap());

    let outcome = Compiler::new(Arc::clone(&registry)).compile_entity("CustomersWithoutOrders");
    assert_eq!(outcome.state, CompileState::Accepted);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::AmbiguousJoin);
    assert_eq!(outcome.diagnostics[0].severity, Severity::Advisory);

    let mut strict = Settings::default();
    strict.validator.rejection = RejectionPolicy::Any;
    let outcome =
        Compiler::with_settings(registry, strict).compile_entity("CustomersWithoutOrders");
    assert_eq!(outcome.state, CompileState::Rejected);
}

#[test]
fn test_ambiguous_join_reporting_can_be_disabled() {
    let mut entities = entities();
    entities[1] = Entity::cube("Users")
        .with_dimension("company", ValueType::String)
        .join_on("Orders", Cardinality::OneToMany, "a")
        .join_on("Orders", Cardinality::OneToMany, "b");
    let registry = Arc::new(EntityRegistry::from_entities(entities).unwrap());

    let mut settings = Settings::default();
    settings.validator.report_ambiguous_joins = false;
    let outcome =
        Compiler::with_settings(registry, settings).compile_entity("CustomersWithoutOrders");
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn test_include_cycle_rejects_view() {
    let registry = Arc::new(
        EntityRegistry::from_entities(vec![
            Entity::view("A")
                .with_dimension("a", ValueType::String)
                .include("B.b"),
            Entity::view("B")
                .with_dimension("b", ValueType::String)
                .include("A.a"),
        ])
        .unwrap(),
    );

    let outcome = Compiler::new(registry).compile_entity("A");
    assert_eq!(outcome.state, CompileState::Rejected);
    let cycle = outcome
        .diagnostics
        .iter()
        .find(|d| d.kind == DiagnosticKind::CyclicReference)
        .unwrap();
    assert_eq!(cycle.message, "Cyclic reference detected: A -> B -> A");
}
