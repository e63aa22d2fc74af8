//! Scanning of SQL snippets for `${path}` member references.
//!
//! Measure and filter SQL is opaque to this crate except for three things:
//! the embedded member references, the top-level aggregate function (if the
//! whole expression is one call), and the simple `${path} <op> <literal>`
//! filter form.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use super::filter::{FilterOp, Literal};
use super::types::AggregationKind;

/// Pattern for `${Entity.member}` references.
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\}").unwrap()
});

/// Leading function call, e.g. `SUM(` or `count(DISTINCT `.
static AGGREGATE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]+)\s*\(\s*(?i:(distinct)\s+)?").unwrap()
});

/// `${path} <op> <rest>`
static FILTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*\$\{\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\}\s*",
        r"(>=|<=|<>|!=|==|=|>|<|(?i:is\s+not\s+null)|(?i:is\s+null)|(?i:not\s+in)|(?i:in))",
        r"\s*(.*?)\s*$",
    ))
    .unwrap()
});

/// Placeholder for the entity's own table alias; also the self-prefix.
const SELF_ALIASES: [&str; 2] = ["CUBE", "TABLE"];

/// Errors raised while scanning SQL snippets.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("unsupported filter expression '{sql}': {reason}")]
    UnsupportedFilter { sql: String, reason: String },

    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),
}

pub type ExprResult<T> = Result<T, ExprError>;

/// Extract the member paths referenced by `sql`, in first-seen order.
///
/// `${CUBE.x}` is rewritten to `${<entity>.x}`; a bare `${CUBE}` is the
/// table alias and is not a member reference.
pub fn extract_references(sql: &str, entity: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for caps in REFERENCE_PATTERN.captures_iter(sql) {
        let raw = &caps[1];
        if SELF_ALIASES.contains(&raw) {
            continue;
        }
        let path = normalize_path(raw, entity);
        if !refs.contains(&path) {
            refs.push(path);
        }
    }
    refs
}

/// Rewrite a `CUBE.`/`TABLE.` prefix to the entity name.
pub fn normalize_path(path: &str, entity: &str) -> String {
    match path.split_once('.') {
        Some((head, rest)) if SELF_ALIASES.contains(&head) => format!("{}.{}", entity, rest),
        _ => path.to_string(),
    }
}

/// If the whole expression is a single aggregate call, return its kind.
///
/// `SUM(${amount})` is a sum; `SUM(${a}) / COUNT(*)` is not a single call
/// and yields `None`.
pub fn top_level_aggregate(sql: &str) -> Option<AggregationKind> {
    let caps = AGGREGATE_CALL.captures(sql)?;
    let kind = AggregationKind::from_function(&caps[1], caps.get(2).is_some())?;

    let whole = caps.get(0)?;
    let open = sql[..whole.end()].rfind('(')?;
    let close = matching_paren(sql, open)?;
    if sql[close + 1..].trim().is_empty() {
        Some(kind)
    } else {
        None
    }
}

/// Index of the `)` matching the `(` at `open`, skipping quoted text.
fn matching_paren(sql: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, c) in sql.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// A filter parsed from SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFilter {
    pub member: String,
    pub operator: FilterOp,
    pub values: Vec<Literal>,
}

/// Parse `${path} <op> <literal>` filter text.
pub fn parse_filter(sql: &str, entity: &str) -> ExprResult<ParsedFilter> {
    let unsupported = |reason: &str| ExprError::UnsupportedFilter {
        sql: sql.to_string(),
        reason: reason.to_string(),
    };

    let caps = FILTER_PATTERN
        .captures(sql)
        .ok_or_else(|| unsupported("expected `${member} <operator> <value>`"))?;

    let member = normalize_path(&caps[1], entity);
    let op_text = caps[2].to_ascii_lowercase();
    let op_text = op_text.split_whitespace().collect::<Vec<_>>().join(" ");
    let rest = caps[3].trim();

    let operator = match op_text.as_str() {
        "=" | "==" => FilterOp::Equals,
        "!=" | "<>" => FilterOp::NotEquals,
        ">" => FilterOp::Gt,
        ">=" => FilterOp::Gte,
        "<" => FilterOp::Lt,
        "<=" => FilterOp::Lte,
        "in" => FilterOp::In,
        "not in" => FilterOp::NotIn,
        "is null" => FilterOp::IsNull,
        "is not null" => FilterOp::IsNotNull,
        _ => return Err(unsupported("unknown operator")),
    };

    let values = if operator.is_null_check() {
        if !rest.is_empty() {
            return Err(unsupported("unexpected text after null check"));
        }
        Vec::new()
    } else if operator.is_set_membership() {
        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| unsupported("expected a parenthesised value list"))?;
        split_list(inner)
            .into_iter()
            .map(parse_literal)
            .collect::<ExprResult<Vec<_>>>()?
    } else {
        vec![parse_literal(rest)?]
    };

    Ok(ParsedFilter {
        member,
        operator,
        values,
    })
}

/// Split a comma separated list, ignoring commas inside quotes.
fn split_list(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            ',' if !in_quote => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

fn parse_literal(text: &str) -> ExprResult<Literal> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Literal::String(inner.replace("''", "'")));
    }
    match text.to_ascii_lowercase().as_str() {
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        _ => {}
    }
    text.parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| ExprError::InvalidLiteral(text.to_string()))
}
