//! Compile sessions: one entity in, one validated plan out.
//!
//! A session walks the state machine
//! `Unresolved → Resolving → Compiled → Validated → Accepted | Rejected`.
//! Errors along the way do not stop the session; they are collected as
//! diagnostics so one compile reports every problem of the entity. Only an
//! unknown entity ends a session early, since there is nothing to compile.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::config::{RejectionPolicy, Settings};
use crate::model::{Entity, FilterDef, MeasureDef};
use crate::semantic::error::{Diagnostic, SemanticError, SemanticResult};
use crate::semantic::registry::{EntityRegistry, SchemaStore};
use crate::semantic::resolver::{Reference, ReferenceResolver};

use super::filter::FilterCompiler;
use super::measure::MeasureCompiler;
use super::plan::{AggregationPlanNode, DimensionNode, FilterOrigin, MeasureNode};
use super::validate::PlanValidator;

/// Lifecycle of one compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileState {
    Unresolved,
    Resolving,
    Compiled,
    Validated,
    Accepted,
    Rejected,
}

impl CompileState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CompileState::Accepted | CompileState::Rejected)
    }
}

impl fmt::Display for CompileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompileState::Unresolved => "unresolved",
            CompileState::Resolving => "resolving",
            CompileState::Compiled => "compiled",
            CompileState::Validated => "validated",
            CompileState::Accepted => "accepted",
            CompileState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// What to compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    pub entity: String,
    /// Extra filters applied on top of the entity's own measure filters.
    pub filters: Vec<FilterDef>,
}

impl CompileRequest {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: FilterDef) -> Self {
        self.filters.push(filter);
        self
    }
}

/// Result of a compile session.
#[derive(Debug, Clone, Serialize)]
pub struct CompileOutcome {
    pub state: CompileState,
    /// States passed through, in order, ending with `state`.
    pub history: Vec<CompileState>,
    /// Present once the session reached `Compiled`, accepted or not.
    pub plan: Option<AggregationPlanNode>,
    pub diagnostics: Vec<Diagnostic>,
    /// Fingerprint of the registry snapshot the plan was compiled against.
    pub fingerprint: String,
}

impl CompileOutcome {
    pub fn is_accepted(&self) -> bool {
        self.state == CompileState::Accepted
    }

    pub fn fatal_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_fatal())
    }

    /// The plan, if it was accepted.
    pub fn accepted_plan(&self) -> Option<&AggregationPlanNode> {
        self.plan.as_ref().filter(|_| self.is_accepted())
    }

    /// Take the accepted plan, or the diagnostics explaining the rejection.
    pub fn into_plan(self) -> Result<AggregationPlanNode, Vec<Diagnostic>> {
        match (self.state, self.plan) {
            (CompileState::Accepted, Some(plan)) => Ok(plan),
            _ => Err(self.diagnostics),
        }
    }
}

/// Tracks state transitions for one session.
struct Session {
    history: Vec<CompileState>,
    diagnostics: Vec<Diagnostic>,
}

impl Session {
    fn new() -> Self {
        Self {
            history: vec![CompileState::Unresolved],
            diagnostics: Vec::new(),
        }
    }

    fn state(&self) -> CompileState {
        self.history
            .last()
            .copied()
            .unwrap_or(CompileState::Unresolved)
    }

    fn advance(&mut self, next: CompileState) {
        tracing::trace!(from = %self.state(), to = %next, "compile state transition");
        self.history.push(next);
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    fn report_err(&mut self, err: SemanticError, context: &str) {
        self.report(Diagnostic::from(err).or_path(context));
    }

    fn finish(self, plan: Option<AggregationPlanNode>, fingerprint: &str) -> CompileOutcome {
        CompileOutcome {
            state: self.state(),
            history: self.history,
            plan,
            diagnostics: self.diagnostics,
            fingerprint: fingerprint.to_string(),
        }
    }
}

/// Compiles entities of one registry snapshot into validated plans.
///
/// Holds its snapshot by `Arc`; a schema reload published elsewhere does not
/// affect a compiler that already exists.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<EntityRegistry>,
    settings: Settings,
}

impl Compiler {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self::with_settings(registry, Settings::default())
    }

    pub fn with_settings(registry: Arc<EntityRegistry>, settings: Settings) -> Self {
        Self { registry, settings }
    }

    /// Compiler over the store's current snapshot.
    pub fn from_store(store: &SchemaStore, settings: Settings) -> Self {
        Self::with_settings(store.snapshot(), settings)
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolve a single member path.
    pub fn resolve(&self, start: &str, path: &str) -> SemanticResult<Reference> {
        ReferenceResolver::with_settings(&self.registry, &self.settings.compiler)
            .resolve(start, path)
    }

    /// Compile one measure of a registered entity.
    pub fn compile_measure(&self, entity: &str, measure: &str) -> SemanticResult<MeasureNode> {
        MeasureCompiler::with_settings(&self.registry, &self.settings.compiler)
            .compile_named(entity, measure)
    }

    pub fn compile_entity(&self, entity: &str) -> CompileOutcome {
        self.compile(&CompileRequest::new(entity))
    }

    /// Compile and validate a whole entity.
    #[instrument(skip(self, request), fields(entity = %request.entity))]
    pub fn compile(&self, request: &CompileRequest) -> CompileOutcome {
        let registry = self.registry.as_ref();
        let mut session = Session::new();

        session.advance(CompileState::Resolving);
        let entity = match registry.lookup(&request.entity) {
            Ok(entity) => entity,
            Err(e) => {
                session.report_err(e, &request.entity);
                session.advance(CompileState::Rejected);
                tracing::info!(state = %session.state(), "compile finished");
                return session.finish(None, registry.fingerprint());
            }
        };

        let plan = self.build_plan(entity, request, &mut session);
        session.advance(CompileState::Compiled);

        let validator = PlanValidator::with_settings(
            registry,
            &self.settings.compiler,
            self.settings.validator.clone(),
        );
        for diagnostic in validator.validate(&plan) {
            session.report(diagnostic);
        }
        session.advance(CompileState::Validated);

        let rejected = match self.settings.validator.rejection {
            RejectionPolicy::Fatal => session.diagnostics.iter().any(Diagnostic::is_fatal),
            RejectionPolicy::Any => !session.diagnostics.is_empty(),
        };
        session.advance(if rejected {
            CompileState::Rejected
        } else {
            CompileState::Accepted
        });

        tracing::info!(
            state = %session.state(),
            diagnostics = session.diagnostics.len(),
            "compile finished"
        );
        session.finish(Some(plan), registry.fingerprint())
    }

    fn build_plan(
        &self,
        entity: &Entity,
        request: &CompileRequest,
        session: &mut Session,
    ) -> AggregationPlanNode {
        let registry = self.registry.as_ref();
        let settings = &self.settings.compiler;
        let resolver = ReferenceResolver::with_settings(registry, settings);
        let filters = FilterCompiler::with_settings(registry, settings);
        let mut measures = MeasureCompiler::with_settings(registry, settings);

        let name = entity.name.as_str();
        let mut plan = AggregationPlanNode::new(name, entity.kind, entity.public);

        for dim in &entity.dimensions {
            plan.push_dimension(DimensionNode {
                name: dim.name.clone(),
                value_type: dim.value_type,
                source: None,
                public: dim.public,
            });
        }

        for path in &entity.includes {
            let reference = match resolver.resolve(name, path) {
                Ok(reference) => reference,
                Err(e) => {
                    session.report_err(e, path);
                    continue;
                }
            };
            let member = reference.field_name().to_string();
            match reference.value_type().filter(|_| !reference.is_measure()) {
                Some(value_type) => plan.push_dimension(DimensionNode {
                    name: member,
                    value_type,
                    source: Some(reference),
                    public: true,
                }),
                None => {
                    let def = MeasureDef::new(member).with_sql(format!("${{{}}}", path));
                    match measures.compile(&def, name) {
                        Ok(node) => plan.push_measure(node),
                        Err(e) => session.report_err(e, path),
                    }
                }
            }
        }

        for def in &entity.measures {
            let context = format!("{}.{}", name, def.name);
            match measures.compile(def, name) {
                Ok(node) => plan.push_measure(node),
                Err(e) => session.report_err(e, &context),
            }
            for filter in &def.filters {
                match filters.compile(filter, name) {
                    Ok(node) => {
                        plan.push_filter(node.with_origin(FilterOrigin::Measure(def.name.clone())))
                    }
                    Err(e) => session.report_err(e, &context),
                }
            }
        }

        for filter in &request.filters {
            match filters.compile(filter, name) {
                Ok(node) => plan.push_filter(node),
                Err(e) => session.report_err(e, name),
            }
        }

        plan
    }
}
