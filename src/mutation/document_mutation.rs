//! Concrete edits addressed to nodes and values of one document.

use super::arguments::{NameProvider, NodeProvider, NodesProvider, ValueProvider};
use crate::core::DclError;
use crate::dom::{NodeId, ValueId};

#[derive(Debug, Clone)]
pub enum DocumentMutation {
    RemoveNode { target: NodeId },
    ReplaceNode { target: NodeId, replacement: NodeProvider },
    InsertNodesBeforeNode { target: NodeId, nodes: NodesProvider },
    InsertNodesAfterNode { target: NodeId, nodes: NodesProvider },
    /// Appends to the element's block; an element without a block gets one.
    AddChildrenToEndOfBlock { target: NodeId, nodes: NodesProvider },
    AppendToDocument { nodes: NodesProvider },
    RenameCall { target: NodeId, name: NameProvider },
    RenamePropertyNode { target: NodeId, name: NameProvider },
    ReplaceValue { target: ValueId, value: ValueProvider },
    RenameValueFactory { target: ValueId, name: NameProvider },
}

/// What a document mutation is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    Node(NodeId),
    Value(ValueId),
    Document,
}

impl DocumentMutation {
    pub fn target(&self) -> MutationTarget {
        match self {
            DocumentMutation::RemoveNode { target }
            | DocumentMutation::ReplaceNode { target, .. }
            | DocumentMutation::InsertNodesBeforeNode { target, .. }
            | DocumentMutation::InsertNodesAfterNode { target, .. }
            | DocumentMutation::AddChildrenToEndOfBlock { target, .. }
            | DocumentMutation::RenameCall { target, .. }
            | DocumentMutation::RenamePropertyNode { target, .. } => MutationTarget::Node(*target),
            DocumentMutation::ReplaceValue { target, .. } | DocumentMutation::RenameValueFactory { target, .. } => {
                MutationTarget::Value(*target)
            }
            DocumentMutation::AppendToDocument { .. } => MutationTarget::Document,
        }
    }

    /// Short kind name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentMutation::RemoveNode { .. } => "remove-node",
            DocumentMutation::ReplaceNode { .. } => "replace-node",
            DocumentMutation::InsertNodesBeforeNode { .. } => "insert-before",
            DocumentMutation::InsertNodesAfterNode { .. } => "insert-after",
            DocumentMutation::AddChildrenToEndOfBlock { .. } => "add-to-block",
            DocumentMutation::AppendToDocument { .. } => "append-to-document",
            DocumentMutation::RenameCall { .. } => "rename-call",
            DocumentMutation::RenamePropertyNode { .. } => "rename-property",
            DocumentMutation::ReplaceValue { .. } => "replace-value",
            DocumentMutation::RenameValueFactory { .. } => "rename-value-factory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentMutationFailureReason {
    /// Никогда не подтверждена генератором: узла нет или его уже удалили/переименовали.
    TargetNotFoundOrSuperseded,
    ArgumentEvaluationFailed(DclError),
}

#[derive(Debug, Clone)]
pub struct UnsuccessfulDocumentMutation {
    pub mutation: DocumentMutation,
    pub reason: DocumentMutationFailureReason,
}

/// New source text plus the mutations that could not be applied.
#[derive(Debug, Clone)]
pub struct DocumentTextMutationPlan {
    pub new_text: String,
    pub unsuccessful: Vec<UnsuccessfulDocumentMutation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::arguments::Provider;

    #[test]
    fn targets_and_kinds() {
        let rename = DocumentMutation::RenameValueFactory { target: ValueId(4), name: Provider::Constant("g".into()) };
        assert_eq!(rename.target(), MutationTarget::Value(ValueId(4)));
        assert_eq!(rename.kind(), "rename-value-factory");
        let append = DocumentMutation::AppendToDocument { nodes: Provider::Constant(Vec::new()) };
        assert_eq!(append.target(), MutationTarget::Document);
        assert_eq!(DocumentMutation::RemoveNode { target: NodeId(1) }.target(), MutationTarget::Node(NodeId(1)));
    }
}
