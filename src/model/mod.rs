//! Entity graph input: cubes, views, fields, relationships and filters.
//!
//! This is the resolved entity graph an external schema loader hands to the
//! compiler. It can be built in code with the builder methods on [`Entity`]
//! or decoded from JSON:
//!
//! ```json
//! { "entities": [
//!     { "name": "Orders", "measures": [{ "name": "count", "type": "count" }] },
//!     { "name": "Users",
//!       "dimensions": [{ "name": "company", "type": "string" }],
//!       "relationships": [{ "target": "Orders", "cardinality": "one_to_many" }] }
//! ] }
//! ```

pub mod entity;
pub mod expr_parser;
pub mod filter;
pub mod types;

pub use entity::{Dimension, Entity, Field, MeasureDef, MemberKind, Relationship};
pub use filter::{FilterDef, FilterOp, Literal};
pub use types::{AggregationKind, Cardinality, EntityKind, RelationshipKind, ValueType};

use serde::{Deserialize, Serialize};

/// Errors decoding an entity graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphInputError {
    #[error("Failed to decode entity graph: {0}")]
    Json(#[from] serde_json::Error),
}

/// The entity graph produced by a schema loader.
///
/// Entity order is significant only for diagnostics; lookups are by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityGraph {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, GraphInputError> {
        Ok(serde_json::from_str(json)?)
    }
}
