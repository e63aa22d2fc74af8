//! Filter definitions: operators, literals, and the two authoring forms.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::ValueType;

/// Supported filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    /// Ordering comparisons (`<`, `<=`, `>`, `>=`).
    pub fn is_comparison(&self) -> bool {
        matches!(self, FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte)
    }

    pub fn is_set_membership(&self) -> bool {
        matches!(self, FilterOp::In | FilterOp::NotIn)
    }

    pub fn is_null_check(&self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::NotEquals => "not_equals",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
            FilterOp::NotIn => "not_in",
            FilterOp::IsNull => "is_null",
            FilterOp::IsNotNull => "is_not_null",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    String(String),
}

impl Literal {
    /// Does this literal fit a field of the given type?
    ///
    /// Time values are written as strings (ISO-8601 text).
    pub fn matches(&self, ty: ValueType) -> bool {
        matches!(
            (self, ty),
            (Literal::Bool(_), ValueType::Boolean)
                | (Literal::Number(_), ValueType::Number)
                | (Literal::String(_), ValueType::String)
                | (Literal::String(_), ValueType::Time)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "boolean",
            Literal::Number(_) => "number",
            Literal::String(_) => "string",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Number(v as f64)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Number(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

/// A filter as authored.
///
/// ```json
/// { "sql": "${Users.Orders.count} = 0" }
/// { "member": "Users.country", "operator": "in", "values": ["DE", "FR"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterDef {
    Sql {
        sql: String,
    },
    Member {
        member: String,
        operator: FilterOp,
        #[serde(default)]
        values: Vec<Literal>,
    },
}

impl FilterDef {
    pub fn sql(sql: impl Into<String>) -> Self {
        FilterDef::Sql { sql: sql.into() }
    }

    pub fn member(member: impl Into<String>, operator: FilterOp, values: Vec<Literal>) -> Self {
        FilterDef::Member {
            member: member.into(),
            operator,
            values,
        }
    }

    pub fn equals(member: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::member(member, FilterOp::Equals, vec![value.into()])
    }
}
