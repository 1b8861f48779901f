//! Effect log: chronological assignments, container additions and nested-object accesses.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::origin::{OriginId, Site};
use crate::schema::PropertyId;

/// Monotonic position of an effect in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u64);

/// Evaluation generation; non-decreasing along operation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GenerationId(pub u32);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentMethod {
    /// Plain `name = value` statement
    Property,
    /// Value supplied by a schema default effect
    SchemaDefault,
}

/// A property of a concrete receiver origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyReferenceResolution {
    pub receiver: OriginId,
    pub property: PropertyId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub lhs: PropertyReferenceResolution,
    pub rhs: OriginId,
    pub operation_id: OperationId,
    pub generation: GenerationId,
    pub method: AssignmentMethod,
    pub site: Site,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataAdditionRecord {
    pub container: OriginId,
    pub added: OriginId,
    pub operation_id: OperationId,
    pub generation: GenerationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedObjectAccessRecord {
    pub container: OriginId,
    pub accessed: OriginId,
    pub operation_id: OperationId,
    pub generation: GenerationId,
}

/// Explicit effects plus the lower-priority effects derived from schema defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectLog {
    pub assignments: Vec<AssignmentRecord>,
    pub additions: Vec<DataAdditionRecord>,
    pub nested_object_accesses: Vec<NestedObjectAccessRecord>,
    pub assignments_from_defaults: Vec<AssignmentRecord>,
    pub additions_from_defaults: Vec<DataAdditionRecord>,
    pub nested_object_accesses_from_defaults: Vec<NestedObjectAccessRecord>,
}

impl EffectLog {
    pub fn len(&self) -> usize {
        self.assignments.len()
            + self.additions.len()
            + self.nested_object_accesses.len()
            + self.assignments_from_defaults.len()
            + self.additions_from_defaults.len()
            + self.nested_object_accesses_from_defaults.len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Выдаёт операции по порядку; поколение задаётся явно.
#[derive(Debug, Default)]
pub struct EffectLogBuilder {
    next_operation: u64,
    generation: GenerationId,
    log: EffectLog,
}

impl EffectLogBuilder {
    pub fn new(generation: GenerationId) -> Self {
        Self { next_operation: 0, generation, log: EffectLog::default() }
    }

    /// Subsequent effects belong to `generation`.
    pub fn set_generation(&mut self, generation: GenerationId) {
        self.generation = generation;
    }

    fn next(&mut self) -> OperationId {
        let id = OperationId(self.next_operation);
        self.next_operation += 1;
        id
    }

    fn assignment_record(&mut self, lhs: PropertyReferenceResolution, rhs: OriginId, method: AssignmentMethod, site: Site) -> AssignmentRecord {
        AssignmentRecord { lhs, rhs, operation_id: self.next(), generation: self.generation, method, site }
    }

    pub fn assignment(&mut self, lhs: PropertyReferenceResolution, rhs: OriginId, method: AssignmentMethod, site: Site) -> OperationId {
        let record = self.assignment_record(lhs, rhs, method, site);
        let id = record.operation_id;
        self.log.assignments.push(record);
        id
    }

    pub fn default_assignment(&mut self, lhs: PropertyReferenceResolution, rhs: OriginId, site: Site) -> OperationId {
        let record = self.assignment_record(lhs, rhs, AssignmentMethod::SchemaDefault, site);
        let id = record.operation_id;
        self.log.assignments_from_defaults.push(record);
        id
    }

    pub fn addition(&mut self, container: OriginId, added: OriginId) -> OperationId {
        let operation_id = self.next();
        self.log.additions.push(DataAdditionRecord { container, added, operation_id, generation: self.generation });
        operation_id
    }

    pub fn default_addition(&mut self, container: OriginId, added: OriginId) -> OperationId {
        let operation_id = self.next();
        self.log.additions_from_defaults.push(DataAdditionRecord { container, added, operation_id, generation: self.generation });
        operation_id
    }

    pub fn nested_access(&mut self, container: OriginId, accessed: OriginId) -> OperationId {
        let operation_id = self.next();
        self.log.nested_object_accesses.push(NestedObjectAccessRecord { container, accessed, operation_id, generation: self.generation });
        operation_id
    }

    pub fn default_nested_access(&mut self, container: OriginId, accessed: OriginId) -> OperationId {
        let operation_id = self.next();
        self.log
            .nested_object_accesses_from_defaults
            .push(NestedObjectAccessRecord { container, accessed, operation_id, generation: self.generation });
        operation_id
    }

    pub fn build(self) -> EffectLog { self.log }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeId;

    #[test]
    fn operations_are_numbered_across_lists() {
        let mut b = EffectLogBuilder::new(GenerationId(0));
        let lhs = PropertyReferenceResolution { receiver: OriginId(0), property: PropertyId(0) };
        let a = b.default_assignment(lhs, OriginId(1), Site::Node(NodeId(0)));
        let n = b.nested_access(OriginId(0), OriginId(2));
        b.set_generation(GenerationId(1));
        let c = b.assignment(lhs, OriginId(3), AssignmentMethod::Property, Site::Node(NodeId(1)));
        let log = b.build();
        assert!(a < n && n < c);
        assert_eq!(log.len(), 3);
        assert_eq!(log.assignments[0].generation, GenerationId(1));
        assert_eq!(log.assignments_from_defaults[0].method, AssignmentMethod::SchemaDefault);
    }
}
