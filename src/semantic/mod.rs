//! Semantic layer - entity registry, reference resolution, and compilation.
//!
//! Entities (cubes and views) are registered into an immutable
//! [`EntityRegistry`] snapshot. Member paths such as `Users.Orders.count`
//! are resolved against it into [`Reference`]s, and whole entities are
//! compiled into validated [`AggregationPlanNode`]s.
//!
//! The phases are kept apart so each can be tested on its own:
//!
//! 1. **Register** - build the snapshot ([`registry`])
//! 2. **Resolve** - walk dotted paths hop by hop ([`resolver`])
//! 3. **Compile** - measures and filters into plan nodes ([`compiler`])
//! 4. **Validate** - batch diagnostics and the accept/reject decision

pub mod compiler;
pub mod error;
pub mod registry;
pub mod resolver;

// Re-export error types
pub use error::{has_fatal, Diagnostic, DiagnosticKind, SemanticError, SemanticResult, Severity};

// Re-export registry types
pub use registry::{EntityRegistry, RegistryBuilder, SchemaStore};

// Re-export resolver types
pub use resolver::{Hop, HopEdge, Reference, ReferenceResolver};

// Re-export compiler types
pub use compiler::{
    AggregationPlanNode, CompileOutcome, CompileRequest, CompileState, Compiler, DimensionNode,
    FilterCompiler, FilterNode, FilterOrigin, MeasureCompiler, MeasureNode, Placement,
    PlanValidator, ReusedSource,
};
