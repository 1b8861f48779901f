//! Declarative document model.
//!
//! Узлы документа живут в арене и адресуются `NodeId`/`ValueId`; идентичность узла стабильна
//! на всё время жизни одного `Document`. Все индексы строятся по идентификатору, а не по
//! структурному равенству.

pub mod new_nodes;
pub mod resolution;

use std::collections::HashMap;
use std::fmt;

use crate::core::position::{LineIndex, PackedSpan};

/// Устойчивый идентификатор узла документа.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Идентификатор значения (литерал, фабрика, ссылка).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    String(String),
    Int(i32),
    Long(i64),
    Boolean(bool),
}

impl fmt::Display for LiteralValue {
    /// Source form of the literal.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("\"")
            }
            LiteralValue::Int(v) => write!(f, "{}", v),
            LiteralValue::Long(v) => write!(f, "{}L", v),
            LiteralValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub name: String,
    pub arguments: Vec<ValueId>,
    pub content: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNode {
    pub name: String,
    pub value: ValueId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentNode {
    Element(ElementNode),
    Property(PropertyNode),
    Error(ErrorNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueNode {
    Literal(LiteralValue),
    ValueFactory { factory_name: String, values: Vec<ValueId> },
    /// Bare name on the right-hand side (`a = b`).
    NamedReference { name: String },
}

/// Braces of an element block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub open: PackedSpan,
    pub close: PackedSpan,
}

/// Where a node or value sits in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceData {
    pub span: PackedSpan,
    /// Span of the name token (element/property/factory/reference name).
    pub name_span: PackedSpan,
    pub block: Option<BlockSpan>,
}

#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    nodes: Vec<DocumentNode>,
    node_sources: Vec<SourceData>,
    values: Vec<ValueNode>,
    value_sources: Vec<SourceData>,
    content: Vec<NodeId>,
}

impl Document {
    pub fn source(&self) -> &str { &self.source }
    pub fn content(&self) -> &[NodeId] { &self.content }
    pub fn node(&self, id: NodeId) -> &DocumentNode { &self.nodes[id.0 as usize] }
    pub fn node_source(&self, id: NodeId) -> &SourceData { &self.node_sources[id.0 as usize] }
    pub fn value(&self, id: ValueId) -> &ValueNode { &self.values[id.0 as usize] }
    pub fn value_source(&self, id: ValueId) -> &SourceData { &self.value_sources[id.0 as usize] }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn value_count(&self) -> usize { self.values.len() }
    pub fn line_index(&self) -> LineIndex { LineIndex::new(&self.source) }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DocumentNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementNode> {
        match self.node(id) {
            DocumentNode::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn property(&self, id: NodeId) -> Option<&PropertyNode> {
        match self.node(id) {
            DocumentNode::Property(p) => Some(p),
            _ => None,
        }
    }

    /// Content of an element; empty for properties and error nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            DocumentNode::Element(e) => &e.content,
            _ => &[],
        }
    }

    /// Source text of a node.
    pub fn node_text(&self, id: NodeId) -> &str {
        &self.source[self.node_source(id).span.range()]
    }

    pub fn value_text(&self, id: ValueId) -> &str {
        &self.source[self.value_source(id).span.range()]
    }

    /// Value -> owning node index over every value in the document, nested factory arguments included.
    pub fn value_owners(&self) -> HashMap<ValueId, NodeId> {
        let mut owners = HashMap::with_capacity(self.values.len());
        for id in preorder(self) {
            let mut stack: Vec<ValueId> = match self.node(id) {
                DocumentNode::Element(e) => e.arguments.clone(),
                DocumentNode::Property(p) => vec![p.value],
                DocumentNode::Error(_) => Vec::new(),
            };
            while let Some(v) = stack.pop() {
                owners.insert(v, id);
                if let ValueNode::ValueFactory { values, .. } = self.value(v) {
                    stack.extend(values.iter().copied());
                }
            }
        }
        owners
    }
}

/// Построитель документа (nested push/pop стеком, как у AST-арены).
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    nodes: Vec<DocumentNode>,
    node_sources: Vec<SourceData>,
    values: Vec<ValueNode>,
    value_sources: Vec<SourceData>,
    content: Vec<NodeId>,
    stack: Vec<NodeId>,
}

impl DocumentBuilder {
    pub fn new() -> Self { Self::default() }

    fn alloc(&mut self, node: DocumentNode, source: SourceData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.node_sources.push(source);
        self.attach(id);
        id
    }

    fn alloc_value(&mut self, value: ValueNode, source: SourceData) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(value);
        self.value_sources.push(source);
        id
    }

    fn attach(&mut self, id: NodeId) {
        match self.stack.last() {
            Some(parent) => {
                if let DocumentNode::Element(e) = &mut self.nodes[parent.0 as usize] {
                    e.content.push(id);
                }
            }
            None => self.content.push(id),
        }
    }

    /// Open an element; the span is completed by `finish_element`.
    pub fn start_element(&mut self, name: impl Into<String>, name_span: PackedSpan) -> NodeId {
        let node = DocumentNode::Element(ElementNode { name: name.into(), arguments: Vec::new(), content: Vec::new() });
        let id = self.alloc(node, SourceData { span: PackedSpan::new(name_span.start, name_span.len), name_span, block: None });
        self.stack.push(id);
        id
    }

    pub fn element_argument(&mut self, value: ValueId) {
        if let Some(&id) = self.stack.last() {
            if let DocumentNode::Element(e) = &mut self.nodes[id.0 as usize] {
                e.arguments.push(value);
            }
        }
    }

    pub fn open_block(&mut self, open: PackedSpan) {
        if let Some(&id) = self.stack.last() {
            self.node_sources[id.0 as usize].block = Some(BlockSpan { open, close: PackedSpan::new(open.end(), 0) });
        }
    }

    pub fn close_block(&mut self, close: PackedSpan) {
        if let Some(&id) = self.stack.last() {
            if let Some(block) = self.node_sources[id.0 as usize].block.as_mut() {
                block.close = close;
            }
        }
    }

    pub fn finish_element(&mut self, end: usize) {
        if let Some(id) = self.stack.pop() {
            let source = &mut self.node_sources[id.0 as usize];
            source.span = PackedSpan::between(source.span.start as usize, end.max(source.span.start as usize));
        }
    }

    pub fn property(&mut self, name: impl Into<String>, name_span: PackedSpan, value: ValueId, span: PackedSpan) -> NodeId {
        self.alloc(DocumentNode::Property(PropertyNode { name: name.into(), value }), SourceData { span, name_span, block: None })
    }

    pub fn error(&mut self, message: impl Into<String>, span: PackedSpan) -> NodeId {
        self.alloc(DocumentNode::Error(ErrorNode { message: message.into() }), SourceData { span, name_span: span, block: None })
    }

    pub fn literal(&mut self, literal: LiteralValue, span: PackedSpan) -> ValueId {
        self.alloc_value(ValueNode::Literal(literal), SourceData { span, name_span: span, block: None })
    }

    pub fn value_factory(&mut self, name: impl Into<String>, name_span: PackedSpan, values: Vec<ValueId>, span: PackedSpan) -> ValueId {
        self.alloc_value(ValueNode::ValueFactory { factory_name: name.into(), values }, SourceData { span, name_span, block: None })
    }

    pub fn named_reference(&mut self, name: impl Into<String>, span: PackedSpan) -> ValueId {
        self.alloc_value(ValueNode::NamedReference { name: name.into() }, SourceData { span, name_span: span, block: None })
    }

    pub fn build(mut self, source: impl Into<String>) -> Document {
        let source = source.into();
        // незакрытые элементы тянутся до конца текста
        while !self.stack.is_empty() {
            self.finish_element(source.len());
        }
        Document {
            source,
            nodes: self.nodes,
            node_sources: self.node_sources,
            values: self.values,
            value_sources: self.value_sources,
            content: self.content,
        }
    }
}

/// Preorder traversal of the whole document (explicit stack).
pub fn preorder(doc: &Document) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(doc.node_count());
    let mut stack: Vec<NodeId> = doc.content().iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        out.push(id);
        // children в обратном порядке для сохранения слева-направо
        stack.extend(doc.children(id).iter().rev().copied());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl { Continue, SkipChildren, Stop }

/// Visitor API (enter/leave). Возвращаем VisitControl из enter.
pub trait Visitor {
    fn enter(&mut self, _id: NodeId, _node: &DocumentNode, _doc: &Document) -> VisitControl { VisitControl::Continue }
    fn leave(&mut self, _id: NodeId, _node: &DocumentNode, _doc: &Document) {}
}

/// Обход документа с visitor. Возвращает true если не прерван.
pub fn walk<V: Visitor>(doc: &Document, visitor: &mut V) -> bool {
    enum Frame { Enter(NodeId), Leave(NodeId) }
    let mut stack: Vec<Frame> = doc.content().iter().rev().map(|id| Frame::Enter(*id)).collect();
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(id) => {
                let node = doc.node(id);
                match visitor.enter(id, node, doc) {
                    VisitControl::Continue => {
                        stack.push(Frame::Leave(id));
                        stack.extend(doc.children(id).iter().rev().map(|c| Frame::Enter(*c)));
                    }
                    VisitControl::SkipChildren => visitor.leave(id, node, doc),
                    VisitControl::Stop => return false,
                }
            }
            Frame::Leave(id) => visitor.leave(id, doc.node(id), doc),
        }
    }
    true
}
