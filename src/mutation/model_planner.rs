/*!
# Model-to-document mutation planner

Translates one `ModelMutationRequest` into `DocumentMutation`s for a concrete document:

1. match the request's scope location;
2. for every matched scope look at the content of its innermost element. The top-level scope has
   no element, so property and element edits skip it; only `AddConfiguringBlockIfAbsent` reaches
   the document content there;
3. properties are found by their resolved schema property, never by name.
*/

use tracing::debug;

use super::arguments::{NodesProvider, Provider};
use super::document_mutation::DocumentMutation;
use super::model::{
    IfNotFoundBehavior, ModelMutation, ModelMutationFailureReason, ModelMutationPlan, ModelMutationRequest,
    UnsuccessfulModelMutation,
};
use super::scope::Scope;
use super::scope_matcher::ScopeLocationMatcher;
use crate::dom::new_nodes::NewNode;
use crate::dom::resolution::DocumentWithResolution;
use crate::dom::NodeId;
use crate::schema::AnalysisSchema;

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelToDocumentMutationPlanner;

impl ModelToDocumentMutationPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan_model_mutation(
        &self,
        schema: &AnalysisSchema,
        document: &DocumentWithResolution,
        request: &ModelMutationRequest,
    ) -> ModelMutationPlan {
        let report = request.if_not_found == IfNotFoundBehavior::FailAndReport;
        let mut plan = ModelMutationPlan::default();
        let fail = |plan: &mut ModelMutationPlan, reason| {
            if report {
                plan.unsuccessful.push(UnsuccessfulModelMutation { request: request.clone(), reason });
            }
        };

        let scopes = ScopeLocationMatcher::new(schema, document).match_location(&request.location);
        if scopes.is_empty() {
            fail(&mut plan, ModelMutationFailureReason::ScopeLocationNotMatched);
            return plan;
        }

        match &request.mutation {
            ModelMutation::SetPropertyValue { property, .. } | ModelMutation::UnsetProperty { property } => {
                for element in targeted_elements(&scopes) {
                    for &child in document.document.children(element) {
                        if document.resolution.node(child).property() != Some(*property) {
                            continue;
                        }
                        let Some(node) = document.document.property(child) else {
                            continue;
                        };
                        plan.document_mutations.push(match &request.mutation {
                            ModelMutation::SetPropertyValue { value, .. } => {
                                DocumentMutation::ReplaceValue { target: node.value, value: value.clone() }
                            }
                            _ => DocumentMutation::RemoveNode { target: child },
                        });
                    }
                }
                if plan.document_mutations.is_empty() {
                    fail(&mut plan, ModelMutationFailureReason::TargetPropertyNotFound);
                }
            }
            ModelMutation::AddNewElement { element } => {
                for target in targeted_elements(&scopes) {
                    plan.document_mutations
                        .push(DocumentMutation::AddChildrenToEndOfBlock { target, nodes: element.map(|node| vec![node]) });
                }
            }
            ModelMutation::AddConfiguringBlockIfAbsent { function } => {
                let name = schema.function(*function).name.clone();
                for scope in &scopes {
                    let present = scope_content(document, scope)
                        .iter()
                        .any(|c| document.resolution.node(*c).element().map(|(f, _)| f) == Some(*function));
                    if !present {
                        let block = NewNode::block(name.clone(), Vec::new(), Vec::new());
                        plan.document_mutations.push(add_to_scope(scope, Provider::Constant(vec![block])));
                    }
                }
            }
        }

        debug!(
            mutation = request.mutation.kind(),
            scopes = scopes.len(),
            document_mutations = plan.document_mutations.len(),
            unsuccessful = plan.unsuccessful.len(),
            "model mutation planned"
        );
        plan
    }
}

/// Innermost elements of the matched scopes; the top-level scope owns no element and is skipped.
fn targeted_elements(scopes: &[Scope]) -> impl Iterator<Item = NodeId> + '_ {
    scopes.iter().filter_map(Scope::innermost)
}

fn scope_content<'d>(document: &'d DocumentWithResolution, scope: &Scope) -> &'d [NodeId] {
    match scope.innermost() {
        Some(element) => document.document.children(element),
        None => document.document.content(),
    }
}

fn add_to_scope(scope: &Scope, nodes: NodesProvider) -> DocumentMutation {
    match scope.innermost() {
        Some(target) => DocumentMutation::AddChildrenToEndOfBlock { target, nodes },
        None => DocumentMutation::AppendToDocument { nodes },
    }
}
