/*!
# Text-preserving tree

Maps every node and value of a document onto its source range. Concatenating the gaps between
children with the children's own text reproduces the source exactly, so a generator that leaves a
subtree alone copies its bytes verbatim.
*/

use std::ops::Range;

use crate::dom::{Document, DocumentNode, NodeId, ValueId, ValueNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildTag {
    Root,
    /// A statement inside a block or at the top level.
    BlockElement(NodeId),
    CallName(NodeId),
    PropertyName(NodeId),
    Value(ValueId),
    ValueFactoryName(ValueId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTreeNode {
    pub tag: ChildTag,
    pub range: Range<usize>,
    pub children: Vec<TextTreeNode>,
}

impl TextTreeNode {
    fn leaf(tag: ChildTag, range: Range<usize>) -> Self {
        Self { tag, range, children: Vec::new() }
    }
}

impl Drop for TextTreeNode {
    // плоский drop: глубокие блоки не должны исчерпать стек
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextPreservingTree {
    pub root: TextTreeNode,
}

/// Document item whose tree node is not built yet.
enum Pending {
    Statement(NodeId),
    Value(ValueId),
}

/// Node under construction and the items that become its remaining children.
struct Frame {
    node: TextTreeNode,
    pending: std::vec::IntoIter<Pending>,
}

impl Frame {
    fn open(document: &Document, item: Pending) -> Self {
        match item {
            Pending::Statement(id) => {
                let source = document.node_source(id);
                let mut node = TextTreeNode::leaf(ChildTag::BlockElement(id), source.span.range());
                let pending = match document.node(id) {
                    DocumentNode::Property(p) => {
                        node.children.push(TextTreeNode::leaf(ChildTag::PropertyName(id), source.name_span.range()));
                        vec![Pending::Value(p.value)]
                    }
                    DocumentNode::Element(e) => {
                        node.children.push(TextTreeNode::leaf(ChildTag::CallName(id), source.name_span.range()));
                        e.arguments
                            .iter()
                            .map(|v| Pending::Value(*v))
                            .chain(e.content.iter().map(|c| Pending::Statement(*c)))
                            .collect()
                    }
                    DocumentNode::Error(_) => Vec::new(),
                };
                Self { node, pending: pending.into_iter() }
            }
            Pending::Value(id) => {
                let source = document.value_source(id);
                let mut node = TextTreeNode::leaf(ChildTag::Value(id), source.span.range());
                let pending = match document.value(id) {
                    ValueNode::ValueFactory { values, .. } => {
                        node.children.push(TextTreeNode::leaf(ChildTag::ValueFactoryName(id), source.name_span.range()));
                        values.iter().map(|v| Pending::Value(*v)).collect()
                    }
                    _ => Vec::new(),
                };
                Self { node, pending: pending.into_iter() }
            }
        }
    }
}

impl TextPreservingTree {
    /// Builds the tree with an explicit stack of open nodes, so nesting depth is bounded by memory only.
    pub fn build(document: &Document) -> Self {
        let mut root = TextTreeNode::leaf(ChildTag::Root, 0..document.source().len());
        let mut top_level = document.content().iter();
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let next = match stack.last_mut() {
                Some(frame) => frame.pending.next(),
                None => match top_level.next() {
                    Some(id) => Some(Pending::Statement(*id)),
                    None => break,
                },
            };
            match next {
                Some(item) => stack.push(Frame::open(document, item)),
                None => {
                    if let Some(done) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.node.children.push(done.node),
                            None => root.children.push(done.node),
                        }
                    }
                }
            }
        }
        Self { root }
    }
}
