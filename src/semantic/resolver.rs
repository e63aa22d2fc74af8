//! Reference Resolver - turns a dotted member path into a [`Reference`].
//!
//! `Users.Orders.count`, resolved from the view `CustomersWithoutOrders`,
//! walks view → `Users` (include) → `Orders` (join) and ends at the `count`
//! field of `Orders`. Every hop records the relationship it crossed, so later
//! stages can reason about fan-out and validators can re-check the walk.
//!
//! The resolver never aggregates or evaluates anything; it proves
//! reachability and identifies the field.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CompilerSettings;
use crate::model::{AggregationKind, Cardinality, MemberKind, RelationshipKind, ValueType};

use super::error::{SemanticError, SemanticResult};
use super::registry::EntityRegistry;

/// The relationship crossed to reach a hop's entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HopEdge {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
    /// Cardinality in the direction of travel.
    pub cardinality: Cardinality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Crossed against its declared direction.
    #[serde(default)]
    pub reversed: bool,
}

/// One segment of a resolved path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    pub entity: String,
    /// Set on the terminal hop only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<HopEdge>,
}

/// A resolved, validated member path. One hop per path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Entity the path was resolved from.
    pub start: String,
    /// The dotted path as written.
    pub path: String,
    pub hops: Vec<Hop>,
    /// Kind of the terminal field.
    pub member: MemberKind,
}

impl Reference {
    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Entity owning the terminal field.
    pub fn target_entity(&self) -> &str {
        self.terminal().map(|h| h.entity.as_str()).unwrap_or(&self.start)
    }

    pub fn field_name(&self) -> &str {
        self.terminal()
            .and_then(|h| h.field.as_deref())
            .unwrap_or_default()
    }

    /// `Entity.field` of the terminal hop.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.target_entity(), self.field_name())
    }

    pub fn is_measure(&self) -> bool {
        self.member.is_measure()
    }

    /// Value type of the terminal field, where it is known without
    /// compiling the measure behind it.
    pub fn value_type(&self) -> Option<ValueType> {
        match self.member {
            MemberKind::Dimension { value_type } => Some(value_type),
            MemberKind::Measure {
                declared: Some(AggregationKind::Min | AggregationKind::Max) | None,
            } => None,
            MemberKind::Measure { declared: Some(kind) } => Some(kind.output_type(None)),
        }
    }

    /// Does the path leave the start entity?
    pub fn crosses_entities(&self) -> bool {
        self.target_entity() != self.start
    }

    /// Relationships crossed, in order.
    pub fn edges(&self) -> impl Iterator<Item = &HopEdge> {
        self.hops.iter().filter_map(|h| h.via.as_ref())
    }

    /// Does any crossed relationship multiply rows?
    pub fn fans_out(&self) -> bool {
        self.edges().any(|e| e.cardinality.causes_fanout())
    }

    fn terminal(&self) -> Option<&Hop> {
        self.hops.last()
    }
}

impl fmt::Display for Reference {
    /// `Users → Orders.count`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entities: Vec<&str> = self
            .hops
            .iter()
            .filter(|h| h.field.is_none())
            .map(|h| h.entity.as_str())
            .collect();
        for (i, entity) in entities.iter().enumerate() {
            if i + 1 == entities.len() && *entity == self.target_entity() {
                break;
            }
            write!(f, "{} → ", entity)?;
        }
        write!(f, "{}", self.qualified_name())
    }
}

/// Resolves dotted paths against one registry snapshot.
#[derive(Debug, Clone)]
pub struct ReferenceResolver<'a> {
    registry: &'a EntityRegistry,
    max_path_depth: usize,
    allow_reverse_joins: bool,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self::with_settings(registry, &CompilerSettings::default())
    }

    pub fn with_settings(registry: &'a EntityRegistry, settings: &CompilerSettings) -> Self {
        Self {
            registry,
            max_path_depth: settings.max_path_depth,
            allow_reverse_joins: settings.allow_reverse_joins,
        }
    }

    pub fn registry(&self) -> &'a EntityRegistry {
        self.registry
    }

    /// Resolve `path` starting at entity `start`.
    ///
    /// Non-terminal segments name entities; the first may be `start` itself.
    /// Each other entity segment must exist (`UnknownEntity`) and be
    /// reachable from the previous one through a declared relationship
    /// (`UnreachableEntity`, naming the failing hop). The terminal segment
    /// must be a field of the last entity (`UnknownField`).
    ///
    /// A member a view re-exports resolves through the view's include path,
    /// whose hops follow the view's own.
    pub fn resolve(&self, start: &str, path: &str) -> SemanticResult<Reference> {
        self.resolve_within(start, path, &mut Vec::new())
    }

    /// `through` holds the re-exported members (`View.member`) being
    /// followed, outermost first.
    fn resolve_within(
        &self,
        start: &str,
        path: &str,
        through: &mut Vec<String>,
    ) -> SemanticResult<Reference> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(SemanticError::InvalidExpression(format!(
                "empty segment in member path '{}'",
                path
            )));
        }
        if segments.len() > self.max_path_depth {
            return Err(SemanticError::InvalidExpression(format!(
                "member path '{}' has {} segments, more than the maximum of {}",
                path,
                segments.len(),
                self.max_path_depth
            )));
        }

        let start_entity = self.registry.lookup(start)?;
        let (field_name, entity_segments) = segments
            .split_last()
            .ok_or_else(|| SemanticError::InvalidExpression("empty member path".into()))?;

        let mut hops = Vec::with_capacity(segments.len());
        let mut current = start_entity;

        for (i, segment) in entity_segments.iter().enumerate() {
            if i == 0 && *segment == start {
                hops.push(Hop {
                    entity: start.to_string(),
                    field: None,
                    via: None,
                });
                continue;
            }

            let next = self
                .registry
                .get(segment)
                .ok_or_else(|| SemanticError::UnknownEntity(segment.to_string()))?;

            let edge = self
                .find_edge(&current.name, &next.name)
                .ok_or_else(|| SemanticError::UnreachableEntity {
                    from: current.name.clone(),
                    to: segment.to_string(),
                    hop: i,
                    path: path.to_string(),
                })?;

            hops.push(Hop {
                entity: next.name.clone(),
                field: None,
                via: Some(edge),
            });
            current = next;
        }

        let member = match current.field(field_name) {
            Some(field) => {
                hops.push(Hop {
                    entity: current.name.clone(),
                    field: Some(field.name().to_string()),
                    via: None,
                });
                field.member_kind()
            }
            None => {
                let included = current.included_path(field_name).ok_or_else(|| {
                    SemanticError::UnknownField {
                        entity: current.name.clone(),
                        field: field_name.to_string(),
                    }
                })?;

                let key = format!("{}.{}", current.name, field_name);
                if let Some(pos) = through.iter().position(|k| *k == key) {
                    let mut cycle = through[pos..].to_vec();
                    cycle.push(key);
                    return Err(SemanticError::CyclicReference(cycle));
                }
                through.push(key);
                let inner = self.resolve_within(&current.name, included, through);
                through.pop();

                let inner = inner?;
                hops.extend(inner.hops);
                inner.member
            }
        };

        tracing::trace!(start, path, hops = hops.len(), "resolved member path");

        Ok(Reference {
            start: start.to_string(),
            path: path.to_string(),
            hops,
            member,
        })
    }

    /// First relationship from `from` to `to` in declaration order, falling
    /// back to a join declared by `to` towards `from`.
    fn find_edge(&self, from: &str, to: &str) -> Option<HopEdge> {
        let forward = self
            .registry
            .relationships_of(from)
            .ok()?
            .iter()
            .find(|r| r.target == to);

        if let Some(rel) = forward {
            return Some(HopEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: rel.kind,
                cardinality: rel.cardinality,
                condition: rel.condition.clone(),
                reversed: false,
            });
        }

        if !self.allow_reverse_joins {
            return None;
        }

        self.registry
            .relationships_of(to)
            .ok()?
            .iter()
            .find(|r| r.target == from && r.kind == RelationshipKind::Join)
            .map(|rel| HopEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: rel.kind,
                cardinality: rel.cardinality.reverse(),
                condition: rel.condition.clone(),
                reversed: true,
            })
    }
}
