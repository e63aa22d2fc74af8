//! Compilation of entities into aggregation plans.
//!
//! The pipeline has four pieces:
//!
//! 1. **Measure** - recompute or reuse each measure ([`MeasureCompiler`])
//! 2. **Filter** - place each predicate before or after aggregation ([`FilterCompiler`])
//! 3. **Validate** - batch checks over the finished plan ([`PlanValidator`])
//! 4. **Session** - drive the above for one entity ([`Compiler`])

mod filter;
mod measure;
mod plan;
mod session;
mod validate;

pub use filter::FilterCompiler;
pub use measure::MeasureCompiler;
pub use plan::{
    AggregationPlanNode, DimensionNode, FilterNode, FilterOrigin, MeasureNode, Placement,
    ReusedSource,
};
pub use session::{CompileOutcome, CompileRequest, CompileState, Compiler};
pub use validate::PlanValidator;
