//! Filter Compiler - places predicates before or after aggregation.
//!
//! A filter whose operand resolves to a measure reads an aggregated value and
//! is placed at the aggregate stage. Anything else filters source rows.
//! Filters are never merged; a plan applies all of them.

use crate::config::CompilerSettings;
use crate::model::expr_parser::{normalize_path, parse_filter, ParsedFilter};
use crate::model::{FilterDef, FilterOp, Literal, ValueType};
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::registry::EntityRegistry;
use crate::semantic::resolver::{Reference, ReferenceResolver};

use super::plan::{FilterNode, FilterOrigin, Placement};

pub struct FilterCompiler<'a> {
    resolver: ReferenceResolver<'a>,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self::with_settings(registry, &CompilerSettings::default())
    }

    pub fn with_settings(registry: &'a EntityRegistry, settings: &CompilerSettings) -> Self {
        Self {
            resolver: ReferenceResolver::with_settings(registry, settings),
        }
    }

    /// Compile `filter` in the context of entity `entity`.
    ///
    /// The node's origin is [`FilterOrigin::Request`]; use
    /// [`FilterNode::with_origin`] for filters declared on a measure.
    pub fn compile(&self, filter: &FilterDef, entity: &str) -> SemanticResult<FilterNode> {
        let parsed = match filter {
            FilterDef::Sql { sql } => parse_filter(sql, entity)
                .map_err(|e| SemanticError::InvalidExpression(e.to_string()))?,
            FilterDef::Member {
                member,
                operator,
                values,
            } => ParsedFilter {
                member: normalize_path(member, entity),
                operator: *operator,
                values: values.clone(),
            },
        };

        let operand = self.resolver.resolve(entity, &parsed.member)?;
        check_operator(&operand, parsed.operator, &parsed.values)?;

        let placement = Placement::for_operand(&operand);
        tracing::trace!(
            member = %parsed.member,
            operator = %parsed.operator,
            %placement,
            "compiled filter"
        );

        Ok(FilterNode {
            operand,
            operator: parsed.operator,
            values: parsed.values,
            placement,
            origin: FilterOrigin::Request,
        })
    }
}

/// Check operator arity, operator applicability, and literal types.
pub(crate) fn check_operator(
    operand: &Reference,
    operator: FilterOp,
    values: &[Literal],
) -> SemanticResult<()> {
    let mismatch = |message: String| SemanticError::TypeMismatch {
        path: operand.path.clone(),
        message,
    };

    let arity_ok = if operator.is_null_check() {
        values.is_empty()
    } else if operator.is_set_membership() {
        !values.is_empty()
    } else {
        values.len() == 1
    };
    if !arity_ok {
        return Err(mismatch(format!(
            "operator {} does not take {} value(s)",
            operator,
            values.len()
        )));
    }

    let Some(value_type) = operand.value_type() else {
        return Ok(());
    };

    if operator.is_comparison() && !value_type.is_ordered() {
        return Err(mismatch(format!(
            "operator {} cannot compare {} values",
            operator, value_type
        )));
    }

    check_literals(value_type, values).map_err(mismatch)
}

fn check_literals(value_type: ValueType, values: &[Literal]) -> Result<(), String> {
    match values.iter().find(|v| !v.matches(value_type)) {
        Some(bad) => Err(format!(
            "{} literal {} does not match field type {}",
            bad.type_name(),
            bad,
            value_type
        )),
        None => Ok(()),
    }
}
