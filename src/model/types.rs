//! Primitive model types: value types, aggregation kinds, cardinalities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type of a dimension or of a measure's output value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Time,
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Number)
    }

    /// Can values of this type be ordered with `<`, `>` and friends?
    pub fn is_ordered(&self) -> bool {
        !matches!(self, ValueType::Boolean)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Time => "time",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a measure turns rows into a value.
///
/// `Number` is the escape hatch: the expression is taken as an already
/// aggregated scalar and is never aggregated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Count,
    CountDistinct,
    Sum,
    #[serde(alias = "average")]
    Avg,
    Min,
    Max,
    /// Custom aggregate expression written out in full by the author.
    Custom,
    Number,
}

impl AggregationKind {
    /// Parse the SQL function name of a top-level aggregate.
    pub fn from_function(name: &str, distinct: bool) -> Option<Self> {
        match (name.to_ascii_lowercase().as_str(), distinct) {
            ("count", true) => Some(AggregationKind::CountDistinct),
            ("count", false) => Some(AggregationKind::Count),
            ("sum", _) => Some(AggregationKind::Sum),
            ("avg" | "average", _) => Some(AggregationKind::Avg),
            ("min", _) => Some(AggregationKind::Min),
            ("max", _) => Some(AggregationKind::Max),
            _ => None,
        }
    }

    /// Partial results of additive kinds can be re-aggregated with the same
    /// kind and still produce the right number.
    pub fn is_additive(&self) -> bool {
        matches!(
            self,
            AggregationKind::Count
                | AggregationKind::Sum
                | AggregationKind::Min
                | AggregationKind::Max
        )
    }

    /// Does this kind require numeric input?
    pub fn requires_numeric_input(&self) -> bool {
        matches!(self, AggregationKind::Sum | AggregationKind::Avg)
    }

    /// Output type given the type of the aggregated operand.
    pub fn output_type(&self, operand: Option<ValueType>) -> ValueType {
        match self {
            AggregationKind::Min | AggregationKind::Max => operand.unwrap_or(ValueType::Number),
            _ => ValueType::Number,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationKind::Count => "count",
            AggregationKind::CountDistinct => "count_distinct",
            AggregationKind::Sum => "sum",
            AggregationKind::Avg => "avg",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
            AggregationKind::Custom => "custom",
            AggregationKind::Number => "number",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cardinality of a relationship, read from the owning entity's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Reverse the cardinality (swap left/right sides).
    pub fn reverse(self) -> Self {
        match self {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }

    /// Returns true if this cardinality can cause row multiplication.
    pub fn causes_fanout(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::OneToOne => write!(f, "1:1"),
            Cardinality::OneToMany => write!(f, "1:N"),
            Cardinality::ManyToOne => write!(f, "N:1"),
            Cardinality::ManyToMany => write!(f, "N:N"),
        }
    }
}

/// Cube (backed by a data source) or view (composed from other entities).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[default]
    Cube,
    View,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Cube => write!(f, "cube"),
            EntityKind::View => write!(f, "view"),
        }
    }
}

/// A join can be traversed both ways; an include only from owner to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    #[default]
    Join,
    Include,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipKind::Join => write!(f, "join"),
            RelationshipKind::Include => write!(f, "include"),
        }
    }
}
