//! Resolution overlay: semantic meaning of document nodes and values.

use std::collections::HashMap;

use super::{Document, NodeId, ValueId};
use crate::schema::{FunctionId, PropertyId, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeResolution {
    /// `name { }` configuring a nested object.
    ConfiguringElement { function: FunctionId, element_type: TypeId },
    /// `name(args) { }` adding a new object to the receiver.
    ContainerElement { function: FunctionId, element_type: TypeId },
    PropertyAssignment { property: PropertyId, receiver_type: TypeId },
    NotResolved,
}

impl NodeResolution {
    /// Function and type of an element resolution.
    pub fn element(&self) -> Option<(FunctionId, TypeId)> {
        match *self {
            NodeResolution::ConfiguringElement { function, element_type }
            | NodeResolution::ContainerElement { function, element_type } => Some((function, element_type)),
            _ => None,
        }
    }

    pub fn property(&self) -> Option<PropertyId> {
        match *self {
            NodeResolution::PropertyAssignment { property, .. } => Some(property),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueResolution {
    Literal,
    ValueFactory { function: FunctionId },
    NamedReference { property: PropertyId },
    NotResolved,
}

/// Total map: nodes and values without an entry are `NotResolved`.
#[derive(Debug, Clone, Default)]
pub struct DocumentResolution {
    nodes: HashMap<NodeId, NodeResolution>,
    values: HashMap<ValueId, ValueResolution>,
}

impl DocumentResolution {
    pub fn new() -> Self { Self::default() }

    pub fn node(&self, id: NodeId) -> NodeResolution {
        self.nodes.get(&id).copied().unwrap_or(NodeResolution::NotResolved)
    }

    pub fn value(&self, id: ValueId) -> ValueResolution {
        self.values.get(&id).copied().unwrap_or(ValueResolution::NotResolved)
    }

    pub fn set_node(&mut self, id: NodeId, resolution: NodeResolution) {
        self.nodes.insert(id, resolution);
    }

    pub fn set_value(&mut self, id: ValueId, resolution: ValueResolution) {
        self.values.insert(id, resolution);
    }
}

/// A document paired with its resolution overlay.
#[derive(Debug, Clone)]
pub struct DocumentWithResolution {
    pub document: Document,
    pub resolution: DocumentResolution,
}

impl DocumentWithResolution {
    pub fn new(document: Document, resolution: DocumentResolution) -> Self {
        Self { document, resolution }
    }
}
