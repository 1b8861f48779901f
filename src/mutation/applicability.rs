/*!
# Mutation applicability

Answers "where in this document would each catalog mutation apply?" without applying anything.
Every step of every compatible definition is planned against the same document with empty
arguments; each planned document mutation becomes one `MutationApplicability`.

Insertions before/after a node are reported as `AffectedNode` of their anchor node, like removals
and renames.
*/

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::definition::{MutationDefinition, MutationDefinitionCatalog};
use super::document_mutation::DocumentMutation;
use super::model_planner::ModelToDocumentMutationPlanner;
use super::scope::Scope;
use super::scope_matcher::ScopeLocationMatcher;
use crate::dom::resolution::DocumentWithResolution;
use crate::dom::{NodeId, ValueId};
use crate::schema::AnalysisSchema;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationApplicability {
    AffectedNode(NodeId),
    /// Additive mutation into a scope that has no matching node yet.
    ScopeWithoutAffectedNodes(Scope),
}

pub struct ApplicableMutation {
    pub definition: Arc<dyn MutationDefinition>,
    pub applicability: Vec<MutationApplicability>,
}

pub struct MutationApplicabilityChecker<'a> {
    schema: &'a AnalysisSchema,
    document: &'a DocumentWithResolution,
    value_owners: HashMap<ValueId, NodeId>,
    scopes_by_element: HashMap<NodeId, Scope>,
}

impl<'a> MutationApplicabilityChecker<'a> {
    pub fn new(schema: &'a AnalysisSchema, document: &'a DocumentWithResolution) -> Self {
        let scopes_by_element = ScopeLocationMatcher::new(schema, document)
            .all_scopes()
            .into_iter()
            .filter_map(|scope| scope.innermost().map(|e| (e, scope)))
            .collect();
        Self { schema, document, value_owners: document.document.value_owners(), scopes_by_element }
    }

    /// Definitions with at least one applicability entry, in catalog order.
    pub fn check_applicability(&self, catalog: &MutationDefinitionCatalog) -> Vec<ApplicableMutation> {
        let mut out = Vec::new();
        for definition in catalog.definitions() {
            if !definition.is_compatible_with_schema(self.schema) {
                continue;
            }
            let applicability = self.applicability_of(definition.as_ref());
            debug!(id = definition.id(), entries = applicability.len(), "applicability checked");
            if !applicability.is_empty() {
                out.push(ApplicableMutation { definition: Arc::clone(definition), applicability });
            }
        }
        out
    }

    pub fn applicability_of(&self, definition: &dyn MutationDefinition) -> Vec<MutationApplicability> {
        let planner = ModelToDocumentMutationPlanner::new();
        let mut out = Vec::new();
        for request in definition.define_model_mutation_sequence(self.schema) {
            let plan = planner.plan_model_mutation(self.schema, self.document, &request);
            for mutation in &plan.document_mutations {
                if let Some(entry) = self.convert(mutation) {
                    if !out.contains(&entry) {
                        out.push(entry);
                    }
                }
            }
        }
        out
    }

    fn convert(&self, mutation: &DocumentMutation) -> Option<MutationApplicability> {
        match mutation {
            DocumentMutation::RemoveNode { target }
            | DocumentMutation::ReplaceNode { target, .. }
            | DocumentMutation::InsertNodesBeforeNode { target, .. }
            | DocumentMutation::InsertNodesAfterNode { target, .. }
            | DocumentMutation::RenameCall { target, .. }
            | DocumentMutation::RenamePropertyNode { target, .. } => Some(MutationApplicability::AffectedNode(*target)),
            DocumentMutation::ReplaceValue { target, .. } | DocumentMutation::RenameValueFactory { target, .. } => {
                self.value_owners.get(target).map(|owner| MutationApplicability::AffectedNode(*owner))
            }
            DocumentMutation::AddChildrenToEndOfBlock { target, .. } => self
                .scopes_by_element
                .get(target)
                .map(|scope| MutationApplicability::ScopeWithoutAffectedNodes(scope.clone())),
            DocumentMutation::AppendToDocument { .. } => {
                Some(MutationApplicability::ScopeWithoutAffectedNodes(Scope::top_level()))
            }
        }
    }
}
