//! Measure Compiler - decides between recomputing and reusing a measure.
//!
//! A measure's declared type always wins. `type: number` over references to
//! other measures yields a [`MeasureNode::Reused`] node: the referenced
//! values are consumed as already aggregated scalars and are never
//! aggregated again. Without a declared type the aggregation is inferred
//! from the expression and from the kinds of the measures it references.
//!
//! Referenced measures are compiled recursively, so a reuse node carries the
//! full upstream tree. Measures declared on registered entities are memoized
//! for the lifetime of one compiler; any other definition is compiled fresh
//! on every call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CompilerSettings;
use crate::model::expr_parser::{extract_references, top_level_aggregate};
use crate::model::{AggregationKind, Field, MeasureDef, ValueType};
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::registry::EntityRegistry;
use crate::semantic::resolver::{Reference, ReferenceResolver};

use super::plan::{MeasureNode, ReusedSource};

/// A resolved operand of a measure expression.
enum Operand {
    Dimension {
        reference: Reference,
        value_type: ValueType,
    },
    Measure {
        reference: Reference,
        upstream: Arc<MeasureNode>,
    },
}

impl Operand {
    fn reference(&self) -> &Reference {
        match self {
            Operand::Dimension { reference, .. } | Operand::Measure { reference, .. } => reference,
        }
    }

    fn value_type(&self) -> ValueType {
        match self {
            Operand::Dimension { value_type, .. } => *value_type,
            Operand::Measure { upstream, .. } => upstream.output_type(),
        }
    }
}

/// Compiles measure definitions against one registry snapshot.
pub struct MeasureCompiler<'a> {
    registry: &'a EntityRegistry,
    resolver: ReferenceResolver<'a>,
    /// Compiled registered measures by `Entity.measure`.
    memo: HashMap<String, Arc<MeasureNode>>,
    /// Measures currently being compiled, outermost first.
    visiting: Vec<String>,
}

impl<'a> MeasureCompiler<'a> {
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self::with_settings(registry, &CompilerSettings::default())
    }

    pub fn with_settings(registry: &'a EntityRegistry, settings: &CompilerSettings) -> Self {
        Self {
            registry,
            resolver: ReferenceResolver::with_settings(registry, settings),
            memo: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    /// Compile `measure` in the context of entity `entity`.
    pub fn compile(&mut self, measure: &MeasureDef, entity: &str) -> SemanticResult<MeasureNode> {
        if self.is_registered(measure, entity) {
            return self
                .compile_shared(measure, entity)
                .map(|node| node.as_ref().clone());
        }
        self.compile_uncached(measure, entity)
    }

    /// Compile a measure declared on a registered entity, by name.
    pub fn compile_named(&mut self, entity: &str, measure: &str) -> SemanticResult<MeasureNode> {
        let registry = self.registry;
        let def = registry
            .lookup(entity)?
            .measure(measure)
            .ok_or_else(|| SemanticError::UnknownField {
                entity: entity.to_string(),
                field: measure.to_string(),
            })?;
        self.compile(def, entity)
    }

    /// Is `measure` the definition the registry holds for `entity`?
    fn is_registered(&self, measure: &MeasureDef, entity: &str) -> bool {
        self.registry
            .get(entity)
            .and_then(|e| e.measure(&measure.name))
            .is_some_and(|def| def == measure)
    }

    /// Compile a registered measure, sharing the node with earlier callers.
    fn compile_shared(
        &mut self,
        measure: &MeasureDef,
        entity: &str,
    ) -> SemanticResult<Arc<MeasureNode>> {
        let key = format!("{}.{}", entity, measure.name);
        if let Some(node) = self.memo.get(&key) {
            return Ok(Arc::clone(node));
        }

        if let Some(pos) = self.visiting.iter().position(|k| *k == key) {
            let mut cycle = self.visiting[pos..].to_vec();
            cycle.push(key);
            return Err(SemanticError::CyclicReference(cycle));
        }

        self.visiting.push(key.clone());
        let result = self.compile_uncached(measure, entity);
        self.visiting.pop();

        let node = Arc::new(result?);
        tracing::debug!(
            measure = %key,
            reused = node.is_reused(),
            aggregation = %node.aggregation(),
            "compiled measure"
        );
        self.memo.insert(key, Arc::clone(&node));
        Ok(node)
    }

    fn compile_uncached(
        &mut self,
        measure: &MeasureDef,
        entity: &str,
    ) -> SemanticResult<MeasureNode> {
        let qualified = format!("{}.{}", entity, measure.name);
        let mismatch = |message: String| SemanticError::TypeMismatch {
            path: qualified.clone(),
            message,
        };

        let operands = self.operands(measure, entity)?;
        let top_level = measure.sql.as_deref().and_then(top_level_aggregate);

        let has_measures = operands
            .iter()
            .any(|o| matches!(o, Operand::Measure { .. }));

        let aggregation = match measure.declared {
            Some(AggregationKind::Number) if has_measures => {
                return Ok(reuse_node(measure, entity, operands));
            }
            Some(kind) => {
                check_operand_types(kind, &operands).map_err(mismatch)?;
                kind
            }
            None => infer_aggregation(measure, top_level, &operands).map_err(mismatch)?,
        };

        let operand_type = match operands.as_slice() {
            [single] => Some(single.value_type()),
            _ => None,
        };

        Ok(MeasureNode::Computed {
            name: measure.name.clone(),
            entity: entity.to_string(),
            aggregation,
            output_type: aggregation.output_type(operand_type),
            expression: measure.sql.clone(),
            inputs: operands.into_iter().map(|o| o.reference().clone()).collect(),
            public: measure.public,
        })
    }

    /// Resolve every `${...}` reference of the measure, compiling referenced
    /// measures on the way.
    fn operands(&mut self, measure: &MeasureDef, entity: &str) -> SemanticResult<Vec<Operand>> {
        let Some(sql) = measure.sql.as_deref() else {
            return Ok(Vec::new());
        };

        let registry = self.registry;
        let mut operands = Vec::new();
        for path in extract_references(sql, entity) {
            let reference = self.resolver.resolve(entity, &path)?;
            let target = reference.target_entity().to_string();
            match registry.field(&target, reference.field_name())? {
                Field::Dimension(dim) => operands.push(Operand::Dimension {
                    value_type: dim.value_type,
                    reference,
                }),
                Field::Measure(def) => {
                    let upstream = self.compile_shared(def, &target)?;
                    operands.push(Operand::Measure {
                        reference,
                        upstream,
                    });
                }
            }
        }
        Ok(operands)
    }
}

fn reuse_node(measure: &MeasureDef, entity: &str, operands: Vec<Operand>) -> MeasureNode {
    let sources = operands
        .into_iter()
        .filter_map(|operand| match operand {
            Operand::Measure {
                reference,
                upstream,
            } => Some(ReusedSource {
                reference,
                upstream,
            }),
            Operand::Dimension { .. } => None,
        })
        .collect();

    MeasureNode::Reused {
        name: measure.name.clone(),
        entity: entity.to_string(),
        expression: measure.sql.clone().unwrap_or_default(),
        sources,
        public: measure.public,
    }
}

fn check_operand_types(kind: AggregationKind, operands: &[Operand]) -> Result<(), String> {
    if !kind.requires_numeric_input() {
        return Ok(());
    }
    match operands.iter().find(|o| !o.value_type().is_numeric()) {
        Some(bad) => Err(format!(
            "{} requires numeric input, but '{}' is {}",
            kind,
            bad.reference().path,
            bad.value_type()
        )),
        None => Ok(()),
    }
}

fn infer_aggregation(
    measure: &MeasureDef,
    top_level: Option<AggregationKind>,
    operands: &[Operand],
) -> Result<AggregationKind, String> {
    let mut dimensions = Vec::new();
    let mut measures = Vec::new();
    for operand in operands {
        match operand {
            Operand::Dimension { reference, .. } => dimensions.push(reference.path.as_str()),
            Operand::Measure {
                reference,
                upstream,
            } => measures.push((reference, upstream)),
        }
    }

    // Only additive aggregates combine with additive upstream values.
    if let Some(kind) = top_level {
        let nested = measures
            .iter()
            .find(|(_, upstream)| !(kind.is_additive() && upstream.aggregation().is_additive()));
        if let Some((reference, upstream)) = nested {
            return Err(format!(
                "{} over {} measure '{}' is a nested aggregation; declare type number to reuse it",
                kind,
                upstream.aggregation(),
                reference.path
            ));
        }
        check_operand_types(kind, operands)?;
        return Ok(kind);
    }

    if measure.sql.is_none() {
        return Err("measure has neither sql nor a declared type".to_string());
    }

    if !dimensions.is_empty() {
        return Err(if measures.is_empty() {
            format!(
                "row-level dimension '{}' is not aggregated",
                dimensions.join("', '")
            )
        } else {
            format!(
                "mixes row-level dimension '{}' with aggregated measure '{}' \
                 without an enclosing aggregate",
                dimensions.join("', '"),
                measures[0].0.path
            )
        });
    }

    let mut kinds: Vec<AggregationKind> = Vec::new();
    for (reference, upstream) in &measures {
        let kind = upstream.aggregation();
        if reference.fans_out() && !kind.is_additive() {
            return Err(format!(
                "{} measure '{}' cannot be re-aggregated across a fan-out join; \
                 declare type number to reuse it",
                kind, reference.path
            ));
        }
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }

    Ok(match kinds.as_slice() {
        [single] => *single,
        _ => AggregationKind::Custom,
    })
}
