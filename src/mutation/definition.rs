//! Mutation definitions and the catalog they are registered in.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::arguments::MutationParameter;
use super::model::ModelMutationRequest;
use crate::core::DclError;
use crate::schema::AnalysisSchema;

/// A reusable, schema-aware change. Knows nothing about any particular document.
pub trait MutationDefinition: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<MutationParameter> {
        Vec::new()
    }

    fn is_compatible_with_schema(&self, schema: &AnalysisSchema) -> bool;

    /// Ordered steps; each step is planned against the document produced by the previous one.
    fn define_model_mutation_sequence(&self, schema: &AnalysisSchema) -> Vec<ModelMutationRequest>;
}

/// Реестр определений по идентификатору. Порядок регистрации сохраняется.
#[derive(Default, Clone)]
pub struct MutationDefinitionCatalog {
    definitions: Vec<Arc<dyn MutationDefinition>>,
    by_id: HashMap<String, usize>,
}

impl MutationDefinitionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: Arc<dyn MutationDefinition>) -> Result<(), DclError> {
        let id = definition.id().to_string();
        if self.by_id.contains_key(&id) {
            return Err(DclError::DuplicateMutationDefinition(id));
        }
        debug!(id = %id, "mutation definition registered");
        self.by_id.insert(id, self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn MutationDefinition>> {
        self.by_id.get(id).map(|i| &self.definitions[*i])
    }

    pub fn definitions(&self) -> &[Arc<dyn MutationDefinition>] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl std::fmt::Debug for MutationDefinitionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.definitions.iter().map(|d| d.id())).finish()
    }
}
