use viewplan::model::{AggregationKind, Cardinality, Entity, MeasureDef, ValueType};
use viewplan::semantic::{EntityRegistry, MeasureCompiler, MeasureNode, SemanticError};

fn registry() -> EntityRegistry {
    EntityRegistry::from_entities(vec![
        Entity::cube("Orders")
            .with_dimension("amount", ValueType::Number)
            .with_dimension("status", ValueType::String)
            .with_measure(MeasureDef::count("count"))
            .with_measure(MeasureDef::new("revenue").with_sql("SUM(${amount})"))
            .with_measure(
                MeasureDef::new("buyers")
                    .with_sql("${user_id}")
                    .with_type(AggregationKind::CountDistinct),
            )
            .with_dimension("user_id", ValueType::Number),
        Entity::cube("Users")
            .with_dimension("company", ValueType::String)
            .join("Orders", Cardinality::OneToMany),
        Entity::view("CustomersWithoutOrders").include("Users.company"),
    ])
    .unwrap()
}

/// One entity whose measures reference each other in a ring of `n`.
fn ring(n: usize) -> EntityRegistry {
    let mut entity = Entity::cube("M");
    for i in 0..n {
        entity = entity.with_measure(
            MeasureDef::new(format!("m{}", i))
                .with_sql(format!("${{m{}}} + 1", (i + 1) % n))
                .with_type(AggregationKind::Number),
        );
    }
    EntityRegistry::from_entities(vec![entity]).unwrap()
}

/// `n` entities `E0 .. En-1`, each joined to the next, whose `m` measures
/// reference the next entity's `m`.
fn entity_ring(n: usize) -> EntityRegistry {
    let entities = (0..n).map(|i| {
        let next = format!("E{}", (i + 1) % n);
        Entity::cube(format!("E{}", i))
            .with_measure(
                MeasureDef::new("m")
                    .with_sql(format!("${{{}.m}}", next))
                    .with_type(AggregationKind::Number),
            )
            .join(next, Cardinality::ManyToOne)
    });
    EntityRegistry::from_entities(entities).unwrap()
}

#[test]
fn test_declared_number_over_nested_measure_is_reused() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);
    let def = MeasureDef::new("count")
        .with_sql("${Users.Orders.count}")
        .with_type(AggregationKind::Number);

    let node = compiler.compile(&def, "CustomersWithoutOrders").unwrap();
    let MeasureNode::Reused { sources, .. } = &node else {
        panic!("expected a reuse node, got {:?}", node);
    };
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].reference.to_string(), "Users → Orders.count");
    assert_eq!(sources[0].upstream.aggregation(), AggregationKind::Count);
    assert_eq!(node.aggregation(), AggregationKind::Number);
}

#[test]
fn test_declared_number_reuses_non_additive_measure() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);
    let def = MeasureDef::new("buyers")
        .with_sql("${Users.Orders.buyers}")
        .with_type(AggregationKind::Number);

    let node = compiler.compile(&def, "CustomersWithoutOrders").unwrap();
    assert!(node.is_reused());
}

#[test]
fn test_undeclared_non_additive_across_fanout_is_mismatch() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);
    let def = MeasureDef::new("buyers").with_sql("${Users.Orders.buyers}");

    let err = compiler.compile(&def, "CustomersWithoutOrders").unwrap_err();
    assert!(matches!(
        err,
        SemanticError::TypeMismatch { ref path, .. } if path == "CustomersWithoutOrders.buyers"
    ));
}

#[test]
fn test_declared_type_is_authoritative() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);
    // Looks like a sum, declared as max.
    let def = MeasureDef::new("largest")
        .with_sql("SUM(${amount})")
        .with_type(AggregationKind::Max);
    let node = compiler.compile(&def, "Orders").unwrap();
    assert_eq!(node.aggregation(), AggregationKind::Max);
}

#[test]
fn test_sum_over_string_is_mismatch() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);

    let inferred = MeasureDef::new("bad").with_sql("SUM(${status})");
    assert!(matches!(
        compiler.compile(&inferred, "Orders"),
        Err(SemanticError::TypeMismatch { .. })
    ));

    let declared = MeasureDef::new("bad_avg")
        .with_sql("${status}")
        .with_type(AggregationKind::Avg);
    assert!(matches!(
        compiler.compile(&declared, "Orders"),
        Err(SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn test_mixing_dimensions_and_measures_is_mismatch() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);

    let mixed = MeasureDef::new("mixed").with_sql("${amount} * ${count}");
    let err = compiler.compile(&mixed, "Orders").unwrap_err();
    assert!(err.to_string().contains("without an enclosing aggregate"));

    let bare = MeasureDef::new("bare").with_sql("${amount} * 2");
    assert!(matches!(
        compiler.compile(&bare, "Orders"),
        Err(SemanticError::TypeMismatch { .. })
    ));
}

#[test]
fn test_union_of_measure_kinds() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);

    let same = MeasureDef::new("double").with_sql("${count} + ${count}");
    assert_eq!(
        compiler.compile(&same, "Orders").unwrap().aggregation(),
        AggregationKind::Count
    );

    let mixed = MeasureDef::new("per_order").with_sql("${revenue} / ${count}");
    assert_eq!(
        compiler.compile(&mixed, "Orders").unwrap().aggregation(),
        AggregationKind::Custom
    );
}

#[test]
fn test_literal_only_expression_is_custom() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);
    let def = MeasureDef::new("one").with_sql("1");
    assert_eq!(
        compiler.compile(&def, "Orders").unwrap().aggregation(),
        AggregationKind::Custom
    );
}

#[test]
fn test_unresolvable_reference_propagates() {
    let registry = registry();
    let mut compiler = MeasureCompiler::new(&registry);
    let def = MeasureDef::new("x")
        .with_sql("${Users.Invoices.total}")
        .with_type(AggregationKind::Number);
    assert_eq!(
        compiler.compile(&def, "CustomersWithoutOrders").unwrap_err(),
        SemanticError::UnknownEntity("Invoices".into())
    );
}

#[test]
fn test_cycles_report_the_complete_path() {
    for n in [2, 3, 5] {
        let registry = ring(n);
        let mut compiler = MeasureCompiler::new(&registry);

        let err = compiler.compile_named("M", "m0").unwrap_err();
        let mut expected: Vec<String> = (0..n).map(|i| format!("M.m{}", i)).collect();
        expected.push("M.m0".to_string());
        assert_eq!(err, SemanticError::CyclicReference(expected), "ring of {}", n);
    }
}

#[test]
fn test_cycles_across_entities_report_the_complete_path() {
    for n in [2, 3, 5] {
        let registry = entity_ring(n);
        let mut compiler = MeasureCompiler::new(&registry);

        let err = compiler.compile_named("E0", "m").unwrap_err();
        let mut expected: Vec<String> = (0..n).map(|i| format!("E{}.m", i)).collect();
        expected.push("E0.m".to_string());
        assert_eq!(err, SemanticError::CyclicReference(expected), "ring of {}", n);
    }
}

#[test]
fn test_cycle_entered_midway_starts_at_entry() {
    let registry = entity_ring(3);
    let mut compiler = MeasureCompiler::new(&registry);
    assert_eq!(
        compiler.compile_named("E1", "m").unwrap_err(),
        SemanticError::CyclicReference(vec![
            "E1.m".into(),
            "E2.m".into(),
            "E0.m".into(),
            "E1.m".into()
        ])
    );
}

#[test]
fn test_self_reference_is_a_cycle() {
    let registry = ring(1);
    let mut compiler = MeasureCompiler::new(&registry);
    assert_eq!(
        compiler.compile_named("M", "m0").unwrap_err(),
        SemanticError::CyclicReference(vec!["M.m0".into(), "M.m0".into()])
    );
}
