//! Owned node trees used as content for insertions and replacements.

use std::fmt;

use super::{Document, DocumentNode, LiteralValue, NodeId, ValueId, ValueNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewValue {
    Literal(LiteralValue),
    Factory { name: String, arguments: Vec<NewValue> },
    NamedReference(String),
}

impl NewValue {
    pub fn string(value: impl Into<String>) -> Self { NewValue::Literal(LiteralValue::String(value.into())) }
    pub fn int(value: i32) -> Self { NewValue::Literal(LiteralValue::Int(value)) }
    pub fn long(value: i64) -> Self { NewValue::Literal(LiteralValue::Long(value)) }
    pub fn boolean(value: bool) -> Self { NewValue::Literal(LiteralValue::Boolean(value)) }

    pub fn from_document(doc: &Document, id: ValueId) -> Self {
        match doc.value(id) {
            ValueNode::Literal(l) => NewValue::Literal(l.clone()),
            ValueNode::ValueFactory { factory_name, values } => NewValue::Factory {
                name: factory_name.clone(),
                arguments: values.iter().map(|v| NewValue::from_document(doc, *v)).collect(),
            },
            ValueNode::NamedReference { name } => NewValue::NamedReference(name.clone()),
        }
    }
}

impl fmt::Display for NewValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewValue::Literal(l) => write!(f, "{}", l),
            NewValue::Factory { name, arguments } => {
                write!(f, "{}(", name)?;
                write_arguments(f, arguments)?;
                f.write_str(")")
            }
            NewValue::NamedReference(name) => f.write_str(name),
        }
    }
}

fn write_arguments(f: &mut impl fmt::Write, arguments: &[NewValue]) -> fmt::Result {
    for (i, a) in arguments.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewNode {
    Property { name: String, value: NewValue },
    Element { name: String, arguments: Vec<NewValue>, content: Vec<NewNode>, with_block: bool },
}

impl NewNode {
    pub fn property(name: impl Into<String>, value: NewValue) -> Self {
        NewNode::Property { name: name.into(), value }
    }

    /// Call without a block: `name(args)`.
    pub fn call(name: impl Into<String>, arguments: Vec<NewValue>) -> Self {
        NewNode::Element { name: name.into(), arguments, content: Vec::new(), with_block: false }
    }

    /// Element with a block: `name(args) { content }`.
    pub fn block(name: impl Into<String>, arguments: Vec<NewValue>, content: Vec<NewNode>) -> Self {
        NewNode::Element { name: name.into(), arguments, content, with_block: true }
    }

    pub fn name(&self) -> &str {
        match self {
            NewNode::Property { name, .. } | NewNode::Element { name, .. } => name,
        }
    }

    /// Rendering spans more than one line.
    pub fn is_multiline(&self) -> bool {
        matches!(self, NewNode::Element { with_block: true, .. })
    }

    /// Source text; the first line carries no indentation, following lines start with `indent`.
    pub fn render(&self, indent: &str, unit: &str) -> String {
        let mut out = String::new();
        self.render_into(&mut out, indent, unit);
        out
    }

    fn render_into(&self, out: &mut String, indent: &str, unit: &str) {
        match self {
            NewNode::Property { name, value } => {
                out.push_str(name);
                out.push_str(" = ");
                out.push_str(&value.to_string());
            }
            NewNode::Element { name, arguments, content, with_block } => {
                out.push_str(name);
                if !arguments.is_empty() || !with_block {
                    out.push('(');
                    let _ = write_arguments(out, arguments);
                    out.push(')');
                }
                if *with_block {
                    out.push_str(" {");
                    let inner = format!("{}{}", indent, unit);
                    for child in content {
                        out.push('\n');
                        out.push_str(&inner);
                        child.render_into(out, &inner, unit);
                    }
                    out.push('\n');
                    out.push_str(indent);
                    out.push('}');
                }
            }
        }
    }

    /// Owned copy of a document node; error nodes have no counterpart.
    pub fn from_document(doc: &Document, id: NodeId) -> Option<Self> {
        match doc.node(id) {
            DocumentNode::Property(p) => Some(NewNode::property(p.name.clone(), NewValue::from_document(doc, p.value))),
            DocumentNode::Element(e) => Some(NewNode::Element {
                name: e.name.clone(),
                arguments: e.arguments.iter().map(|v| NewValue::from_document(doc, *v)).collect(),
                content: e.content.iter().filter_map(|c| NewNode::from_document(doc, *c)).collect(),
                with_block: doc.node_source(id).block.is_some(),
            }),
            DocumentNode::Error(_) => None,
        }
    }
}
