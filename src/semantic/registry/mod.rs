//! Entity Registry - every cube and view of one schema version, by name.
//!
//! Registration happens on a [`RegistryBuilder`]; [`RegistryBuilder::build`]
//! produces the immutable [`EntityRegistry`] snapshot that resolution and
//! compilation read from. The registry stores relationships exactly as
//! declared and performs no aggregation logic.

mod hash;
mod store;


pub use hash::fingerprint;
pub use store::SchemaStore;

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::model::{Entity, EntityGraph, Field, Relationship, RelationshipKind};

use super::error::{SemanticError, SemanticResult};

/// Collects entities for one schema version.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    ///
    /// Fails with `DuplicateEntity` if the name is taken and with
    /// `DuplicateField` if the entity declares a field name twice (a view's
    /// re-exported members count as its fields). Every included member path
    /// adds an include relationship to its root entity unless one is
    /// declared.
    pub fn register(&mut self, entity: Entity) -> SemanticResult<()> {
        if self.index.contains_key(&entity.name) {
            return Err(SemanticError::DuplicateEntity(entity.name));
        }
        check_unique_fields(&entity)?;
        let entity = with_implied_includes(entity);

        self.index.insert(entity.name.clone(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    pub fn with_entity(mut self, entity: Entity) -> SemanticResult<Self> {
        self.register(entity)?;
        Ok(self)
    }

    /// Finish construction. Nothing is visible to readers before this.
    pub fn build(self) -> SemanticResult<EntityRegistry> {
        let mut include_graph = DiGraph::new();
        let mut include_nodes = HashMap::new();

        for entity in &self.entities {
            let idx = include_graph.add_node(entity.name.clone());
            include_nodes.insert(entity.name.clone(), idx);
        }

        // Dangling targets are left out here; resolution reports them.
        for entity in &self.entities {
            for rel in &entity.relationships {
                if rel.kind != RelationshipKind::Include {
                    continue;
                }
                if let (Some(from), Some(to)) =
                    (include_nodes.get(&entity.name), include_nodes.get(&rel.target))
                {
                    include_graph.update_edge(*from, *to, ());
                }
            }
        }

        let fingerprint = fingerprint(&self.entities)?;

        tracing::debug!(
            entities = self.entities.len(),
            fingerprint = %fingerprint,
            "entity registry built"
        );

        Ok(EntityRegistry {
            entities: self.entities,
            index: self.index,
            include_graph,
            include_nodes,
            fingerprint,
        })
    }
}

fn with_implied_includes(mut entity: Entity) -> Entity {
    let roots: Vec<String> = entity
        .includes
        .iter()
        .filter_map(|path| path.split_once('.').map(|(root, _)| root.to_string()))
        .collect();

    for root in roots {
        let declared = entity
            .relationships
            .iter()
            .any(|r| r.kind == RelationshipKind::Include && r.target == root);
        if !declared {
            entity.relationships.push(Relationship::include(root));
        }
    }
    entity
}

fn check_unique_fields(entity: &Entity) -> SemanticResult<()> {
    let mut seen = HashSet::new();
    let included = entity
        .includes
        .iter()
        .map(|path| path.rsplit('.').next().unwrap_or(path.as_str()));

    for name in entity.field_names().chain(included) {
        if !seen.insert(name) {
            return Err(SemanticError::DuplicateField {
                entity: entity.name.clone(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Immutable snapshot of all entities of one schema version.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    /// Entities in registration order.
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    /// Include edges only; joins are looked up by traversal.
    include_graph: DiGraph<String, ()>,
    include_nodes: HashMap<String, NodeIndex>,
    fingerprint: String,
}

impl EntityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Register every entity of a graph and build the snapshot.
    pub fn from_graph(graph: EntityGraph) -> SemanticResult<Self> {
        Self::from_entities(graph.entities)
    }

    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> SemanticResult<Self> {
        let mut builder = RegistryBuilder::new();
        for entity in entities {
            builder.register(entity)?;
        }
        builder.build()
    }

    /// Look up an entity by name.
    pub fn lookup(&self, name: &str) -> SemanticResult<&Entity> {
        self.get(name)
            .ok_or_else(|| SemanticError::UnknownEntity(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.index.get(name).map(|idx| &self.entities[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared relationships of an entity, in declaration order.
    pub fn relationships_of(&self, name: &str) -> SemanticResult<&[Relationship]> {
        Ok(&self.lookup(name)?.relationships)
    }

    /// Look up a field on an entity.
    pub fn field(&self, entity: &str, field: &str) -> SemanticResult<Field<'_>> {
        self.lookup(entity)?
            .field(field)
            .ok_or_else(|| SemanticError::UnknownField {
                entity: entity.to_string(),
                field: field.to_string(),
            })
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Content hash of the registered entities.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Directed graph of include edges between registered entities.
    pub fn include_graph(&self) -> &DiGraph<String, ()> {
        &self.include_graph
    }

    pub fn include_node(&self, name: &str) -> Option<NodeIndex> {
        self.include_nodes.get(name).copied()
    }

    /// Targets that `entity` declares more than one distinct join to.
    /// Include relationships never count.
    ///
    /// Returns `(target, number of relationships)` pairs in declaration
    /// order. Repeating an identical declaration is not ambiguous.
    pub fn ambiguous_joins(&self, entity: &str) -> Vec<(String, usize)> {
        let Some(found) = self.get(entity) else {
            return Vec::new();
        };

        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&Relationship>> = HashMap::new();
        for rel in found
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::Join)
        {
            let group = groups.entry(rel.target.as_str()).or_default();
            if group.is_empty() {
                order.push(rel.target.as_str());
            }
            if !group.contains(&rel) {
                group.push(rel);
            }
        }

        order
            .into_iter()
            .filter_map(|target| {
                let count = groups[target].len();
                (count > 1).then(|| (target.to_string(), count))
            })
            .collect()
    }
}
