use std::sync::Arc;

use viewplan::model::{
    AggregationKind, Cardinality, Entity, FilterDef, FilterOp, Literal, MeasureDef, ValueType,
};
use viewplan::semantic::{
    CompileRequest, CompileState, Compiler, DiagnosticKind, EntityRegistry, FilterCompiler,
    FilterOrigin, Placement, SemanticError,
};

fn registry() -> EntityRegistry {
    EntityRegistry::from_entities(vec![
        Entity::cube("Orders")
            .with_dimension("status", ValueType::String)
            .with_dimension("amount", ValueType::Number)
            .with_measure(MeasureDef::count("count"))
            .with_measure(
                MeasureDef::new("completed")
                    .with_type(AggregationKind::Count)
                    .with_filter(FilterDef::equals("status", "completed")),
            ),
        Entity::cube("Users")
            .with_dimension("company", ValueType::String)
            .join("Orders", Cardinality::OneToMany),
        Entity::view("CustomersWithoutOrders").include("Users.company"),
    ])
    .unwrap()
}

#[test]
fn test_measure_operand_is_aggregate() {
    let registry = registry();
    let compiler = FilterCompiler::new(&registry);

    let node = compiler
        .compile(
            &FilterDef::sql("${Users.Orders.count} = 0"),
            "CustomersWithoutOrders",
        )
        .unwrap();
    assert_eq!(node.placement, Placement::Aggregate);
    assert_eq!(node.operator, FilterOp::Equals);
    assert_eq!(node.values, vec![Literal::Number(0.0)]);
    assert_eq!(node.to_string(), "equals(Users.Orders.count, 0)");
}

#[test]
fn test_dimension_operand_is_row() {
    let registry = registry();
    let compiler = FilterCompiler::new(&registry);

    let node = compiler
        .compile(
            &FilterDef::member(
                "Users.company",
                FilterOp::In,
                vec!["Acme".into(), "Initech".into()],
            ),
            "CustomersWithoutOrders",
        )
        .unwrap();
    assert_eq!(node.placement, Placement::Row);
    assert_eq!(node.origin, FilterOrigin::Request);
}

#[test]
fn test_literal_type_mismatch() {
    let registry = registry();
    let compiler = FilterCompiler::new(&registry);

    let err = compiler
        .compile(&FilterDef::sql("${Users.Orders.count} = 'none'"), "CustomersWithoutOrders")
        .unwrap_err();
    assert!(matches!(
        err,
        SemanticError::TypeMismatch { ref path, .. } if path == "Users.Orders.count"
    ));

    let err = compiler
        .compile(&FilterDef::equals("amount", true), "Orders")
        .unwrap_err();
    assert!(matches!(err, SemanticError::TypeMismatch { .. }));
}

#[test]
fn test_unresolvable_operand() {
    let registry = registry();
    let compiler = FilterCompiler::new(&registry);
    assert_eq!(
        compiler
            .compile(&FilterDef::equals("Orders.missing", 1.0), "Orders")
            .unwrap_err(),
        SemanticError::UnknownField {
            entity: "Orders".into(),
            field: "missing".into()
        }
    );
}

#[test]
fn test_plan_routes_filters_by_placement() {
    let compiler = Compiler::new(Arc::new(registry()));
    let request = CompileRequest::new("Orders")
        .with_filter(FilterDef::sql("${CUBE.amount} >= 10"))
        .with_filter(FilterDef::sql("${count} > 5"))
        .with_filter(FilterDef::sql("${status} IS NOT NULL"));

    let outcome = compiler.compile(&request);
    assert_eq!(outcome.state, CompileState::Accepted, "{:?}", outcome.diagnostics);
    let plan = outcome.accepted_plan().unwrap();

    let row: Vec<String> = plan.row_predicates.iter().map(|f| f.to_string()).collect();
    assert_eq!(
        row,
        vec![
            // Declared on the `completed` measure.
            "equals(status, 'completed')",
            "gte(Orders.amount, 10)",
            "is_not_null(status)",
        ]
    );
    let aggregate: Vec<String> = plan
        .aggregate_predicates
        .iter()
        .map(|f| f.to_string())
        .collect();
    assert_eq!(aggregate, vec!["gt(count, 5)"]);
    assert_eq!(
        plan.row_predicates[0].origin,
        FilterOrigin::Measure("completed".into())
    );
}

#[test]
fn test_filters_are_never_merged() {
    let compiler = Compiler::new(Arc::new(registry()));
    let request = CompileRequest::new("Orders")
        .with_filter(FilterDef::sql("${amount} > 10"))
        .with_filter(FilterDef::sql("${amount} > 10"))
        .with_filter(FilterDef::sql("${amount} > 20"));

    let plan = compiler.compile(&request).into_plan().unwrap();
    let on_amount = plan
        .row_predicates
        .iter()
        .filter(|f| f.operand.field_name() == "amount")
        .count();
    assert_eq!(on_amount, 3);
}

#[test]
fn test_bad_request_filter_rejects_plan() {
    let compiler = Compiler::new(Arc::new(registry()));
    let request = CompileRequest::new("Orders").with_filter(FilterDef::sql("${status} > 3"));

    let outcome = compiler.compile(&request);
    assert_eq!(outcome.state, CompileState::Rejected);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::TypeMismatch);
    assert!(outcome.accepted_plan().is_none());
}
