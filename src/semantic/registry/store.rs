//! Atomic publication of registry snapshots.
//!
//! A schema reload builds a complete new [`EntityRegistry`] off to the side
//! and swaps it in with one pointer store. Compiles that already hold an
//! `Arc` keep running against the snapshot they started with.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::EntityGraph;
use crate::semantic::error::SemanticResult;

use super::EntityRegistry;

/// Holds the currently published registry snapshot.
#[derive(Debug)]
pub struct SchemaStore {
    current: RwLock<Arc<EntityRegistry>>,
}

impl SchemaStore {
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Build a registry from an entity graph and publish it as the first
    /// snapshot.
    pub fn from_graph(graph: EntityGraph) -> SemanticResult<Self> {
        Ok(Self::new(EntityRegistry::from_graph(graph)?))
    }

    /// The current snapshot. Cheap; holds no lock after returning.
    pub fn snapshot(&self) -> Arc<EntityRegistry> {
        Arc::clone(&self.current.read())
    }

    /// Publish a fully built registry, returning the one it replaced.
    pub fn publish(&self, registry: EntityRegistry) -> Arc<EntityRegistry> {
        let next = Arc::new(registry);
        tracing::info!(
            entities = next.len(),
            fingerprint = %next.fingerprint(),
            "publishing registry snapshot"
        );
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Rebuild from a new entity graph and publish it.
    ///
    /// On error the previously published snapshot stays in place.
    pub fn reload(&self, graph: EntityGraph) -> SemanticResult<Arc<EntityRegistry>> {
        let registry = EntityRegistry::from_graph(graph).inspect_err(|e| {
            tracing::warn!(error = %e, "schema reload rejected; keeping current snapshot");
        })?;
        self.publish(registry);
        Ok(self.snapshot())
    }

    pub fn fingerprint(&self) -> String {
        self.current.read().fingerprint().to_string()
    }
}
