//! Plan Validator - whole-plan checks before a plan is accepted.
//!
//! Validation is a batch operation. Every check runs, every problem becomes
//! a [`Diagnostic`], and the plan itself is never modified.

use std::collections::HashSet;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use crate::config::{CompilerSettings, ValidatorSettings};
use crate::model::RelationshipKind;
use crate::semantic::error::{Diagnostic, SemanticError};
use crate::semantic::registry::EntityRegistry;
use crate::semantic::resolver::ReferenceResolver;

use super::filter::check_operator;
use super::plan::{AggregationPlanNode, FilterNode, Placement};

pub struct PlanValidator<'a> {
    registry: &'a EntityRegistry,
    resolver: ReferenceResolver<'a>,
    settings: ValidatorSettings,
}

impl<'a> PlanValidator<'a> {
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self::with_settings(
            registry,
            &CompilerSettings::default(),
            ValidatorSettings::default(),
        )
    }

    pub fn with_settings(
        registry: &'a EntityRegistry,
        compiler: &CompilerSettings,
        settings: ValidatorSettings,
    ) -> Self {
        Self {
            registry,
            resolver: ReferenceResolver::with_settings(registry, compiler),
            settings,
        }
    }

    /// Run every check against `plan` and collect the diagnostics.
    pub fn validate(&self, plan: &AggregationPlanNode) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if !self.registry.contains(&plan.entity) {
            diagnostics.push(SemanticError::UnknownEntity(plan.entity.clone()).into());
        } else if self.settings.check_include_cycles {
            for cycle in self.include_cycles(&plan.entity) {
                diagnostics.push(SemanticError::CyclicReference(cycle).into());
            }
        }

        let mut seen = HashSet::new();
        for reference in plan.references() {
            if !seen.insert(reference) {
                continue;
            }
            if let Err(e) = self.resolver.resolve(&reference.start, &reference.path) {
                diagnostics.push(Diagnostic::from(e).or_path(reference.path.clone()));
            }
        }

        for (filter, listed) in plan
            .row_predicates
            .iter()
            .map(|f| (f, Placement::Row))
            .chain(plan.aggregate_predicates.iter().map(|f| (f, Placement::Aggregate)))
        {
            self.check_filter(filter, listed, &mut diagnostics);
        }

        if self.settings.report_ambiguous_joins {
            self.check_ambiguous_joins(plan, &mut diagnostics);
        }

        tracing::debug!(
            entity = %plan.entity,
            diagnostics = diagnostics.len(),
            "validated plan"
        );
        diagnostics
    }

    fn check_filter(&self, filter: &FilterNode, listed: Placement, out: &mut Vec<Diagnostic>) {
        // Unresolvable operands were reported above.
        let Ok(operand) = self.resolver.resolve(&filter.operand.start, &filter.operand.path) else {
            return;
        };

        let expected = Placement::for_operand(&operand);
        if filter.placement != expected || listed != expected {
            out.push(
                SemanticError::TypeMismatch {
                    path: filter.operand.path.clone(),
                    message: format!(
                        "filter {} is placed at the {} stage, \
                         but its operand requires the {} stage",
                        filter, listed, expected
                    ),
                }
                .into(),
            );
        }

        if let Err(e) = check_operator(&operand, filter.operator, &filter.values) {
            out.push(e.into());
        }
    }

    fn check_ambiguous_joins(&self, plan: &AggregationPlanNode, out: &mut Vec<Diagnostic>) {
        let mut reported = HashSet::new();
        for reference in plan.references() {
            for edge in reference.edges() {
                if edge.kind != RelationshipKind::Join {
                    continue;
                }
                let (owner, target) = if edge.reversed {
                    (&edge.to, &edge.from)
                } else {
                    (&edge.from, &edge.to)
                };
                let ambiguous = self
                    .registry
                    .ambiguous_joins(owner)
                    .into_iter()
                    .find(|(to, _)| to == target);
                if let Some((to, count)) = ambiguous {
                    if reported.insert((owner.clone(), to.clone())) {
                        out.push(
                            SemanticError::AmbiguousJoin {
                                from: owner.clone(),
                                to,
                                count,
                            }
                            .into(),
                        );
                    }
                }
            }
        }
    }

    /// Include cycles among entities reachable from `entity` over include
    /// edges. Each cycle starts and ends with the same entity.
    fn include_cycles(&self, entity: &str) -> Vec<Vec<String>> {
        let graph = self.registry.include_graph();
        let Some(start) = self.registry.include_node(entity) else {
            return Vec::new();
        };

        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(graph, start);
        while let Some(node) = dfs.next(graph) {
            reachable.insert(node);
        }

        tarjan_scc(graph)
            .into_iter()
            .filter(|scc| scc.iter().any(|n| reachable.contains(n)))
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .filter_map(|scc| cycle_path(graph, &scc))
            .collect()
    }
}

/// Order the members of a strongly connected component as a walkable
/// cycle, starting from the alphabetically first entity.
fn cycle_path(graph: &DiGraph<String, ()>, scc: &[NodeIndex]) -> Option<Vec<String>> {
    let members: HashSet<NodeIndex> = scc.iter().copied().collect();
    let start = *scc.iter().min_by_key(|n| &graph[**n])?;

    let mut path = vec![start];
    let mut visited = HashSet::from([start]);
    if !walk_back(graph, &members, start, &mut path, &mut visited) {
        return None;
    }
    Some(path.into_iter().map(|n| graph[n].clone()).collect())
}

fn walk_back(
    graph: &DiGraph<String, ()>,
    members: &HashSet<NodeIndex>,
    start: NodeIndex,
    path: &mut Vec<NodeIndex>,
    visited: &mut HashSet<NodeIndex>,
) -> bool {
    let Some(&current) = path.last() else {
        return false;
    };
    let mut next: Vec<NodeIndex> = graph
        .neighbors(current)
        .filter(|n| members.contains(n))
        .collect();
    next.sort_by(|a, b| graph[*a].cmp(&graph[*b]));

    for node in next {
        if node == start {
            path.push(start);
            return true;
        }
        if visited.insert(node) {
            path.push(node);
            if walk_back(graph, members, start, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}
