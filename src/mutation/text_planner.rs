/*!
# Document-to-text mutation planner

Indexes a list of `DocumentMutation`s by target and feeds them to the text generator as hooks.
Every mutation the generator actually consumes is confirmed; the rest are reported as
`TargetNotFoundOrSuperseded`. When two mutations compete for the same slot (two removals, two
renames of one name) the first one wins. Providers are evaluated only when their target is reached;
an evaluation error makes the mutation unsuccessful with `ArgumentEvaluationFailed`.
*/

use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::arguments::{MutationArgumentContainer, Provider};
use super::document_mutation::{
    DocumentMutation, DocumentMutationFailureReason, DocumentTextMutationPlan, UnsuccessfulDocumentMutation,
};
use super::text_generator::{MutatedDocumentTextGenerator, TextMutationHooks};
use super::text_tree::{ChildTag, TextPreservingTree};
use crate::config::MutationSettings;
use crate::core::DclError;
use crate::dom::new_nodes::{NewNode, NewValue};
use crate::dom::{Document, NodeId, ValueId};

#[derive(Debug, Clone, Default)]
pub struct DocumentTextMutationPlanner {
    settings: MutationSettings,
}

impl DocumentTextMutationPlanner {
    pub fn new(settings: MutationSettings) -> Self {
        Self { settings }
    }

    pub fn plan_document_mutations(
        &self,
        document: &Document,
        mutations: &[DocumentMutation],
        arguments: &MutationArgumentContainer,
    ) -> DocumentTextMutationPlan {
        let tree = TextPreservingTree::build(document);
        let mut hooks = PlannerHooks::new(mutations, arguments);
        let new_text = MutatedDocumentTextGenerator::new(document, &self.settings).generate_text(&tree, &mut hooks);

        let unsuccessful: Vec<UnsuccessfulDocumentMutation> = mutations
            .iter()
            .enumerate()
            .filter(|(index, _)| !hooks.confirmed.contains(index))
            .map(|(index, mutation)| UnsuccessfulDocumentMutation {
                mutation: mutation.clone(),
                reason: match hooks.failed.remove(&index) {
                    Some(error) => DocumentMutationFailureReason::ArgumentEvaluationFailed(error),
                    None => DocumentMutationFailureReason::TargetNotFoundOrSuperseded,
                },
            })
            .collect();
        for failure in &unsuccessful {
            warn!(mutation = failure.mutation.kind(), reason = ?failure.reason, "document mutation not applied");
        }
        debug!(mutations = mutations.len(), unsuccessful = unsuccessful.len(), "document text generated");
        DocumentTextMutationPlan { new_text, unsuccessful }
    }
}

/// Mutation indices per target; the generator asks, the hooks confirm.
struct PlannerHooks<'m> {
    mutations: &'m [DocumentMutation],
    arguments: &'m MutationArgumentContainer,
    removals: HashMap<NodeId, Vec<usize>>,
    before: HashMap<NodeId, Vec<usize>>,
    after: HashMap<NodeId, Vec<usize>>,
    appended: HashMap<Option<NodeId>, Vec<usize>>,
    node_renames: HashMap<NodeId, Vec<usize>>,
    value_renames: HashMap<ValueId, Vec<usize>>,
    value_replacements: HashMap<ValueId, Vec<usize>>,
    confirmed: HashSet<usize>,
    failed: HashMap<usize, DclError>,
}

impl<'m> PlannerHooks<'m> {
    fn new(mutations: &'m [DocumentMutation], arguments: &'m MutationArgumentContainer) -> Self {
        let mut hooks = Self {
            mutations,
            arguments,
            removals: HashMap::new(),
            before: HashMap::new(),
            after: HashMap::new(),
            appended: HashMap::new(),
            node_renames: HashMap::new(),
            value_renames: HashMap::new(),
            value_replacements: HashMap::new(),
            confirmed: HashSet::new(),
            failed: HashMap::new(),
        };
        for (index, mutation) in mutations.iter().enumerate() {
            match mutation {
                DocumentMutation::RemoveNode { target } | DocumentMutation::ReplaceNode { target, .. } => {
                    hooks.removals.entry(*target).or_default().push(index)
                }
                DocumentMutation::InsertNodesBeforeNode { target, .. } => hooks.before.entry(*target).or_default().push(index),
                DocumentMutation::InsertNodesAfterNode { target, .. } => hooks.after.entry(*target).or_default().push(index),
                DocumentMutation::AddChildrenToEndOfBlock { target, .. } => {
                    hooks.appended.entry(Some(*target)).or_default().push(index)
                }
                DocumentMutation::AppendToDocument { .. } => hooks.appended.entry(None).or_default().push(index),
                DocumentMutation::RenameCall { target, .. } | DocumentMutation::RenamePropertyNode { target, .. } => {
                    hooks.node_renames.entry(*target).or_default().push(index)
                }
                DocumentMutation::RenameValueFactory { target, .. } => hooks.value_renames.entry(*target).or_default().push(index),
                DocumentMutation::ReplaceValue { target, .. } => hooks.value_replacements.entry(*target).or_default().push(index),
            }
        }
        hooks
    }

    fn evaluate<T: Clone + Send + Sync + 'static>(&mut self, index: usize, provider: &Provider<T>) -> Option<T> {
        match provider.evaluate(self.arguments) {
            Ok(value) => {
                self.confirmed.insert(index);
                Some(value)
            }
            Err(error) => {
                self.failed.insert(index, error);
                None
            }
        }
    }

    /// Nodes of every insertion mutation in `indices`, in mutation order.
    fn insertions(&mut self, indices: Option<Vec<usize>>) -> Vec<NewNode> {
        let mutations = self.mutations;
        let mut nodes = Vec::new();
        for index in indices.unwrap_or_default() {
            let provider = match &mutations[index] {
                DocumentMutation::InsertNodesBeforeNode { nodes, .. }
                | DocumentMutation::InsertNodesAfterNode { nodes, .. }
                | DocumentMutation::AddChildrenToEndOfBlock { nodes, .. }
                | DocumentMutation::AppendToDocument { nodes } => nodes,
                _ => continue,
            };
            if let Some(new) = self.evaluate(index, provider) {
                nodes.extend(new);
            }
        }
        nodes
    }

    /// First mutation in `indices` whose provider evaluates.
    fn first_evaluated<T: Clone + Send + Sync + 'static>(
        &mut self,
        indices: Option<Vec<usize>>,
        provider_of: impl Fn(&'m DocumentMutation) -> Option<&'m Provider<T>>,
    ) -> Option<T> {
        let mutations = self.mutations;
        indices
            .unwrap_or_default()
            .into_iter()
            .find_map(|index| provider_of(&mutations[index]).and_then(|p| self.evaluate(index, p)))
    }
}

impl TextMutationHooks for PlannerHooks<'_> {
    fn map_name(&mut self, tag: ChildTag, _name: &str) -> Option<String> {
        let indices = match tag {
            ChildTag::CallName(node) => self.node_renames.get(&node).map(|v| {
                v.iter().copied().filter(|i| matches!(self.mutations[*i], DocumentMutation::RenameCall { .. })).collect()
            }),
            ChildTag::PropertyName(node) => self.node_renames.get(&node).map(|v| {
                v.iter().copied().filter(|i| matches!(self.mutations[*i], DocumentMutation::RenamePropertyNode { .. })).collect()
            }),
            ChildTag::ValueFactoryName(value) => self.value_renames.remove(&value),
            _ => None,
        };
        self.first_evaluated(indices, |m| match m {
            DocumentMutation::RenameCall { name, .. }
            | DocumentMutation::RenamePropertyNode { name, .. }
            | DocumentMutation::RenameValueFactory { name, .. } => Some(name),
            _ => None,
        })
    }

    fn replace_value(&mut self, value: ValueId) -> Option<NewValue> {
        let indices = self.value_replacements.remove(&value);
        self.first_evaluated(indices, |m| match m {
            DocumentMutation::ReplaceValue { value, .. } => Some(value),
            _ => None,
        })
    }

    fn remove_node(&mut self, node: NodeId) -> bool {
        // ReplaceNode с ошибкой аргументов не удаляет узел
        let Some(indices) = self.removals.get(&node) else {
            return false;
        };
        let first = indices[0];
        match &self.mutations[first] {
            DocumentMutation::RemoveNode { .. } => {
                self.confirmed.insert(first);
                true
            }
            DocumentMutation::ReplaceNode { replacement, .. } => match replacement.evaluate(self.arguments) {
                Ok(_) => true,
                Err(error) => {
                    self.failed.insert(first, error);
                    false
                }
            },
            _ => false,
        }
    }

    fn replacement_nodes(&mut self, node: NodeId) -> Vec<NewNode> {
        let Some(first) = self.removals.remove(&node).and_then(|v| v.first().copied()) else {
            return Vec::new();
        };
        let mutations = self.mutations;
        match &mutations[first] {
            DocumentMutation::ReplaceNode { replacement, .. } => self.evaluate(first, replacement).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn insert_before(&mut self, node: NodeId) -> Vec<NewNode> {
        let indices = self.before.remove(&node);
        self.insertions(indices)
    }

    fn insert_after(&mut self, node: NodeId) -> Vec<NewNode> {
        let indices = self.after.remove(&node);
        self.insertions(indices)
    }

    fn append_to_block(&mut self, owner: Option<NodeId>) -> Vec<NewNode> {
        let indices = self.appended.remove(&owner);
        self.insertions(indices)
    }
}
