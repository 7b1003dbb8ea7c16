//! Context sources and the registry dispatching to them.

use std::sync::Arc;

use devreg_core::{Error, Result};

use super::entity::Entity;
use super::query::Query;

/// Callback receiving query results one entity at a time.
///
/// Returning an error stops the query and propagates the error.
pub type EmitEntity<'a> = dyn FnMut(Entity) -> Result<()> + 'a;

/// A provider of NGSI-LD entities.
///
/// Operations are blocking; async callers run them on a blocking thread.
pub trait ContextSource: Send + Sync {
    /// Whether the entity id belongs to this source.
    fn provides_entities_with_matching_id(&self, entity_id: &str) -> bool;

    fn provides_type(&self, type_name: &str) -> bool;

    fn provides_attribute(&self, attribute_name: &str) -> bool;

    /// Every entity type this source serves.
    fn entity_types(&self) -> Vec<String>;

    fn create_entity(&self, type_name: &str, entity_id: &str, body: &serde_json::Value)
    -> Result<()>;

    fn retrieve_entity(&self, entity_id: &str) -> Result<Entity>;

    /// Stream every entity matching the query through `emit`.
    fn get_entities(&self, query: &Query, emit: &mut EmitEntity<'_>) -> Result<()>;

    fn update_entity_attributes(&self, entity_id: &str, body: &serde_json::Value) -> Result<()>;
}

/// Dispatches protocol operations to registered context sources.
#[derive(Default, Clone)]
pub struct ContextRegistry {
    sources: Vec<Arc<dyn ContextSource>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn ContextSource>) {
        self.sources.push(source);
    }

    fn source_for_id(&self, entity_id: &str) -> Option<&Arc<dyn ContextSource>> {
        self.sources
            .iter()
            .find(|s| s.provides_entities_with_matching_id(entity_id))
    }

    pub fn create_entity(
        &self,
        type_name: &str,
        entity_id: &str,
        body: &serde_json::Value,
    ) -> Result<()> {
        let source = self
            .sources
            .iter()
            .find(|s| s.provides_type(type_name))
            .ok_or_else(|| Error::UnsupportedType(type_name.to_string()))?;
        source.create_entity(type_name, entity_id, body)
    }

    pub fn retrieve_entity(&self, entity_id: &str) -> Result<Entity> {
        self.source_for_id(entity_id)
            .ok_or_else(|| Error::not_found("entity", entity_id))?
            .retrieve_entity(entity_id)
    }

    /// Stream matching entities from every source.
    ///
    /// With types given, each source serves the types it provides. With
    /// only attributes given, each source providing one of them serves all
    /// of its types.
    pub fn query_entities(&self, query: &Query, emit: &mut EmitEntity<'_>) -> Result<()> {
        for source in &self.sources {
            let entity_types: Vec<String> = if query.entity_types().is_empty() {
                if query
                    .attributes()
                    .iter()
                    .any(|a| source.provides_attribute(a))
                {
                    source.entity_types()
                } else {
                    Vec::new()
                }
            } else {
                query
                    .entity_types()
                    .iter()
                    .filter(|t| source.provides_type(t))
                    .cloned()
                    .collect()
            };

            if entity_types.is_empty() {
                continue;
            }
            source.get_entities(&query.with_entity_types(entity_types), emit)?;
        }
        Ok(())
    }

    /// Collect every matching entity.
    pub fn collect_entities(&self, query: &Query) -> Result<Vec<Entity>> {
        let mut entities = Vec::new();
        self.query_entities(query, &mut |entity| {
            entities.push(entity);
            Ok(())
        })?;
        Ok(entities)
    }

    pub fn update_entity_attributes(&self, entity_id: &str, body: &serde_json::Value) -> Result<()> {
        self.source_for_id(entity_id)
            .ok_or_else(|| Error::not_found("entity", entity_id))?
            .update_entity_attributes(entity_id, body)
    }
}
