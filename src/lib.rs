//! # viewplan
//!
//! Resolves cross-entity member references in semantic-layer views and
//! compiles them into validated aggregation plans.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        EntityGraph (from an external schema parser)      │
//! │        (cubes, views, fields, relationships)             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │      EntityRegistry snapshot (published atomically)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolver + measure/filter compilers]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 AggregationPlanNode                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validator]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Accepted plan, or Rejected + diagnostics          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use viewplan::prelude::*;
//!
//! let registry = EntityRegistry::from_entities(vec![
//!     Entity::cube("Orders").with_measure(MeasureDef::count("count")),
//!     Entity::cube("Users")
//!         .with_dimension("company", ValueType::String)
//!         .join("Orders", Cardinality::OneToMany),
//!     Entity::view("CustomersWithoutOrders")
//!         .include("Users.company")
//!         .with_measure(
//!             MeasureDef::new("count")
//!                 .with_sql("${Users.Orders.count}")
//!                 .with_type(AggregationKind::Number)
//!                 .with_filter(FilterDef::sql("${Users.Orders.count} = 0")),
//!         ),
//! ])
//! .unwrap();
//!
//! let outcome = Compiler::new(Arc::new(registry)).compile_entity("CustomersWithoutOrders");
//! assert_eq!(outcome.state, CompileState::Accepted);
//! ```

pub mod config;
pub mod model;
pub mod semantic;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{RejectionPolicy, Settings};
    pub use crate::model::{
        AggregationKind, Cardinality, Entity, EntityGraph, FilterDef, FilterOp, Literal,
        MeasureDef, Relationship, ValueType,
    };
    pub use crate::semantic::{
        AggregationPlanNode, CompileOutcome, CompileRequest, CompileState, Compiler, Diagnostic,
        DiagnosticKind, EntityRegistry, MeasureNode, Placement, Reference, SchemaStore,
        SemanticError, Severity,
    };
}

pub use semantic::{Compiler, EntityRegistry, SchemaStore, SemanticError, SemanticResult};
