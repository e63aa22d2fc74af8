//! Plan types - output of compilation.
//!
//! An [`AggregationPlanNode`] is what the execution engine receives for one
//! entity: the source fields it must read, the predicates to apply before
//! and after aggregation, and one [`MeasureNode`] per output measure.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::model::{AggregationKind, EntityKind, FilterOp, Literal, ValueType};
use crate::semantic::resolver::Reference;

/// Pipeline stage a filter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Applied to source rows before aggregation (`WHERE`).
    Row,
    /// Applied to aggregated values (`HAVING`).
    Aggregate,
}

impl Placement {
    /// Placement implied by the kind of field a filter reads.
    pub fn for_operand(reference: &Reference) -> Self {
        if reference.is_measure() {
            Placement::Aggregate
        } else {
            Placement::Row
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Row => write!(f, "row"),
            Placement::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// Where a filter came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "source", content = "measure", rename_all = "snake_case")]
pub enum FilterOrigin {
    /// Declared on the named measure.
    Measure(String),
    /// Supplied with the compile request.
    Request,
}

/// A compiled predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterNode {
    pub operand: Reference,
    pub operator: FilterOp,
    pub values: Vec<Literal>,
    pub placement: Placement,
    pub origin: FilterOrigin,
}

impl FilterNode {
    pub fn with_origin(mut self, origin: FilterOrigin) -> Self {
        self.origin = origin;
        self
    }
}

impl fmt::Display for FilterNode {
    /// `equals(Users.Orders.count, 0)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.operator, self.operand.path)?;
        for value in &self.values {
            write!(f, ", {}", value)?;
        }
        write!(f, ")")
    }
}

/// A scalar output column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionNode {
    pub name: String,
    pub value_type: ValueType,
    /// Set when the dimension is re-exported from another entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Reference>,
    pub public: bool,
}

/// A referenced measure consumed as an already aggregated value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReusedSource {
    pub reference: Reference,
    /// The referenced measure, compiled in its own entity.
    pub upstream: Arc<MeasureNode>,
}

/// Compiled form of one output measure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum MeasureNode {
    /// Aggregated from source rows in this plan.
    Computed {
        name: String,
        entity: String,
        aggregation: AggregationKind,
        output_type: ValueType,
        #[serde(skip_serializing_if = "Option::is_none")]
        expression: Option<String>,
        /// Fields read by the expression.
        inputs: Vec<Reference>,
        public: bool,
    },
    /// Scalar taken from upstream measures; never aggregated again.
    Reused {
        name: String,
        entity: String,
        expression: String,
        sources: Vec<ReusedSource>,
        public: bool,
    },
}

impl MeasureNode {
    pub fn name(&self) -> &str {
        match self {
            MeasureNode::Computed { name, .. } | MeasureNode::Reused { name, .. } => name,
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            MeasureNode::Computed { entity, .. } | MeasureNode::Reused { entity, .. } => entity,
        }
    }

    /// `Entity.measure`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.entity(), self.name())
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, MeasureNode::Reused { .. })
    }

    pub fn is_public(&self) -> bool {
        match self {
            MeasureNode::Computed { public, .. } | MeasureNode::Reused { public, .. } => *public,
        }
    }

    /// Aggregation kind as seen by consumers. A reuse node is a `number`.
    pub fn aggregation(&self) -> AggregationKind {
        match self {
            MeasureNode::Computed { aggregation, .. } => *aggregation,
            MeasureNode::Reused { .. } => AggregationKind::Number,
        }
    }

    pub fn output_type(&self) -> ValueType {
        match self {
            MeasureNode::Computed { output_type, .. } => *output_type,
            MeasureNode::Reused { .. } => ValueType::Number,
        }
    }

    /// References read directly by this node.
    pub fn references(&self) -> Vec<&Reference> {
        match self {
            MeasureNode::Computed { inputs, .. } => inputs.iter().collect(),
            MeasureNode::Reused { sources, .. } => sources.iter().map(|s| &s.reference).collect(),
        }
    }

    /// References of this node and of every upstream node below it.
    pub fn all_references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        collect_references(self, &mut out);
        out
    }
}

fn collect_references<'a>(node: &'a MeasureNode, out: &mut Vec<&'a Reference>) {
    match node {
        MeasureNode::Computed { inputs, .. } => out.extend(inputs.iter()),
        MeasureNode::Reused { sources, .. } => {
            for source in sources {
                out.push(&source.reference);
                collect_references(&source.upstream, out);
            }
        }
    }
}

impl fmt::Display for MeasureNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureNode::Computed {
                name,
                aggregation,
                output_type,
                inputs,
                ..
            } => {
                write!(f, "{}: {} -> {}", name, aggregation, output_type)?;
                if !inputs.is_empty() {
                    let inputs: Vec<String> = inputs.iter().map(|r| r.to_string()).collect();
                    write!(f, " over {}", inputs.join(", "))?;
                }
                Ok(())
            }
            MeasureNode::Reused { name, sources, .. } => {
                let sources: Vec<String> = sources
                    .iter()
                    .map(|s| format!("{} [{}]", s.reference, s.upstream.aggregation()))
                    .collect();
                write!(f, "{}: reuse {}", name, sources.join(", "))
            }
        }
    }
}

/// The compiled plan for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationPlanNode {
    pub entity: String,
    pub kind: EntityKind,
    pub public: bool,
    /// Qualified source fields (`Entity.field`) the plan reads, sorted.
    pub required_fields: BTreeSet<String>,
    pub dimensions: Vec<DimensionNode>,
    /// Applied before aggregation, all must hold.
    pub row_predicates: Vec<FilterNode>,
    /// Applied after aggregation, all must hold.
    pub aggregate_predicates: Vec<FilterNode>,
    pub measures: Vec<MeasureNode>,
}

impl AggregationPlanNode {
    pub fn new(entity: impl Into<String>, kind: EntityKind, public: bool) -> Self {
        Self {
            entity: entity.into(),
            kind,
            public,
            required_fields: BTreeSet::new(),
            dimensions: Vec::new(),
            row_predicates: Vec::new(),
            aggregate_predicates: Vec::new(),
            measures: Vec::new(),
        }
    }

    pub fn measure(&self, name: &str) -> Option<&MeasureNode> {
        self.measures.iter().find(|m| m.name() == name)
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionNode> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Route a filter to the predicate list matching its placement.
    pub fn push_filter(&mut self, filter: FilterNode) {
        self.require(&filter.operand);
        match filter.placement {
            Placement::Row => self.row_predicates.push(filter),
            Placement::Aggregate => self.aggregate_predicates.push(filter),
        }
    }

    pub fn push_measure(&mut self, measure: MeasureNode) {
        for reference in measure.references() {
            self.required_fields.insert(reference.qualified_name());
        }
        self.measures.push(measure);
    }

    pub fn push_dimension(&mut self, dimension: DimensionNode) {
        let field = match &dimension.source {
            Some(source) => source.qualified_name(),
            None => format!("{}.{}", self.entity, dimension.name),
        };
        self.required_fields.insert(field);
        self.dimensions.push(dimension);
    }

    fn require(&mut self, reference: &Reference) {
        self.required_fields.insert(reference.qualified_name());
    }

    /// Every predicate, row-level first.
    pub fn predicates(&self) -> impl Iterator<Item = &FilterNode> {
        self.row_predicates.iter().chain(self.aggregate_predicates.iter())
    }

    /// Every reference in the plan, including upstream measure trees.
    pub fn references(&self) -> Vec<&Reference> {
        let mut refs: Vec<&Reference> = self
            .dimensions
            .iter()
            .filter_map(|d| d.source.as_ref())
            .collect();
        for measure in &self.measures {
            collect_references(measure, &mut refs);
        }
        refs.extend(self.predicates().map(|f| &f.operand));
        refs
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable rendering of the plan.
    pub fn explain(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AggregationPlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aggregate {} ({})", self.entity, self.kind)?;
        if !self.public {
            write!(f, " hidden")?;
        }
        writeln!(f)?;

        if !self.required_fields.is_empty() {
            let fields: Vec<&str> = self.required_fields.iter().map(String::as_str).collect();
            writeln!(f, "  read {}", fields.join(", "))?;
        }
        for dim in &self.dimensions {
            write!(f, "  dimension {}: {}", dim.name, dim.value_type)?;
            if let Some(source) = &dim.source {
                write!(f, " from {}", source)?;
            }
            writeln!(f)?;
        }
        for filter in &self.row_predicates {
            writeln!(f, "  where {}", filter)?;
        }
        for measure in &self.measures {
            writeln!(f, "  measure {}", measure)?;
        }
        for filter in &self.aggregate_predicates {
            writeln!(f, "  having {}", filter)?;
        }
        Ok(())
    }
}
