/*!
# Assignment resolver

Union-find style structure over two kinds of nodes: `Property` (a property of a resolved receiver)
and `PrimitiveValue` (a fully resolved non-property origin). Assigning a bare property reference
links two property nodes; any other right-hand side links to a primitive value. Final values are
computed by following links with path compression.

Поколения: первая запись в поколении выигрывает, запись из более позднего поколения
заменяет предыдущую, запись из более раннего поколения считается нарушением контракта.
*/

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::effects::{AssignmentMethod, GenerationId, PropertyReferenceResolution};
use super::origin::{ObjectOrigin, OriginGraph, OriginId};
use crate::core::DclError;
use crate::schema::AnalysisSchema;

/// `Ok(resolved)` or `Err(unresolved property usage)`.
pub type ResolutionMemo = HashMap<OriginId, Result<OriginId, OriginId>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionNode {
    Property(PropertyReferenceResolution),
    PrimitiveValue(OriginId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionResult {
    Resolved(OriginId),
    /// The property reference that has neither an assignment nor a default.
    UnresolvedPropertyUsage(OriginId),
}

impl From<Result<OriginId, OriginId>> for ResolutionResult {
    fn from(value: Result<OriginId, OriginId>) -> Self {
        match value {
            Ok(id) => ResolutionResult::Resolved(id),
            Err(id) => ResolutionResult::UnresolvedPropertyUsage(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentAdditionResult {
    AssignmentAdded { resolved_lhs: PropertyReferenceResolution, rhs: ResolutionNode },
    Reassignment,
    UnresolvedValueUsedInLhs(OriginId),
    UnresolvedValueUsedInRhs(OriginId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentResolutionResult {
    Assigned { value: OriginId, method: AssignmentMethod },
    /// The chain ends at a property that is never assigned and has no default.
    Unassigned { property: PropertyReferenceResolution },
}

#[derive(Debug, Clone, Copy)]
struct LinkRecord {
    target: ResolutionNode,
    method: AssignmentMethod,
    generation: GenerationId,
}

pub struct AssignmentResolver<'s> {
    schema: &'s AnalysisSchema,
    links: HashMap<PropertyReferenceResolution, LinkRecord>,
    order: Vec<PropertyReferenceResolution>,
}

impl<'s> AssignmentResolver<'s> {
    pub fn new(schema: &'s AnalysisSchema) -> Self {
        Self { schema, links: HashMap::new(), order: Vec::new() }
    }

    /// Resolve an origin against the current links with a fresh memo.
    pub fn resolve_to_object_or_property_reference(&self, graph: &mut OriginGraph, origin: OriginId) -> ResolutionResult {
        let mut memo = ResolutionMemo::new();
        self.resolve_memoized(graph, origin, &mut memo).into()
    }

    /// Resolve through a caller-owned memo; already memoized origins keep their first result.
    pub fn resolve_memoized(&self, graph: &mut OriginGraph, origin: OriginId, memo: &mut ResolutionMemo) -> Result<OriginId, OriginId> {
        graph
            .fold_post_order(origin, memo, |graph, id, deps| self.resolve_node(graph, id, deps))
            .unwrap_or(Err(origin))
    }

    /// One step of the fold: dependencies are already resolved.
    fn resolve_node(&self, graph: &mut OriginGraph, id: OriginId, deps: Vec<Result<OriginId, OriginId>>) -> Result<OriginId, OriginId> {
        let resolved_deps = deps.into_iter().collect::<Result<Vec<_>, _>>()?;
        match graph.get(id).clone() {
            ObjectOrigin::PropertyReference { property, .. } => {
                let key = PropertyReferenceResolution { receiver: resolved_deps[0], property };
                match self.follow(key) {
                    ResolutionNode::PrimitiveValue(value) => Ok(value),
                    ResolutionNode::Property(terminal) => self.default_value(graph, terminal).ok_or(id),
                }
            }
            _ => Ok(graph.with_dependencies(id, &resolved_deps)),
        }
    }

    fn default_value(&self, graph: &mut OriginGraph, terminal: PropertyReferenceResolution) -> Option<OriginId> {
        self.schema.property(terminal.property).has_default_value.then(|| {
            graph.add(ObjectOrigin::PropertyDefaultValue { receiver: terminal.receiver, property: terminal.property })
        })
    }

    /// End of the link chain starting at `key`.
    fn follow(&self, key: PropertyReferenceResolution) -> ResolutionNode {
        let mut current = key;
        let mut seen = HashSet::new();
        loop {
            match self.links.get(&current) {
                Some(LinkRecord { target: ResolutionNode::Property(next), .. }) if seen.insert(current) => current = *next,
                Some(LinkRecord { target: ResolutionNode::PrimitiveValue(value), .. }) => return ResolutionNode::PrimitiveValue(*value),
                _ => return ResolutionNode::Property(current),
            }
        }
    }

    fn chain_contains(&self, start: PropertyReferenceResolution, needle: PropertyReferenceResolution) -> bool {
        let mut current = start;
        let mut seen = HashSet::new();
        while seen.insert(current) {
            if current == needle {
                return true;
            }
            match self.links.get(&current) {
                Some(LinkRecord { target: ResolutionNode::Property(next), .. }) => current = *next,
                _ => return false,
            }
        }
        false
    }

    /// Record `lhs = rhs`. A bare property-reference `rhs` becomes a link to that property.
    pub fn add_assignment(
        &mut self,
        graph: &mut OriginGraph,
        lhs: PropertyReferenceResolution,
        rhs: OriginId,
        method: AssignmentMethod,
        generation: GenerationId,
    ) -> Result<AssignmentAdditionResult, DclError> {
        let mut memo = ResolutionMemo::new();
        self.add_assignment_memoized(graph, lhs, rhs, method, generation, &mut memo)
    }

    pub fn add_assignment_memoized(
        &mut self,
        graph: &mut OriginGraph,
        lhs: PropertyReferenceResolution,
        rhs: OriginId,
        method: AssignmentMethod,
        generation: GenerationId,
        memo: &mut ResolutionMemo,
    ) -> Result<AssignmentAdditionResult, DclError> {
        let receiver = match self.resolve_memoized(graph, lhs.receiver, memo) {
            Ok(r) => r,
            Err(unresolved) => return Ok(AssignmentAdditionResult::UnresolvedValueUsedInLhs(unresolved)),
        };
        let resolved_lhs = PropertyReferenceResolution { receiver, property: lhs.property };

        if let Some(existing) = self.links.get(&resolved_lhs) {
            if existing.generation == generation {
                return Ok(AssignmentAdditionResult::Reassignment);
            }
            if existing.generation > generation {
                return Err(DclError::GenerationOrderViolation {
                    property: graph.describe_property(self.schema, resolved_lhs.receiver, resolved_lhs.property),
                    recorded: existing.generation,
                    incoming: generation,
                });
            }
        }

        let target = match graph.get(rhs).clone() {
            ObjectOrigin::PropertyReference { receiver, property, .. } => {
                let rhs_receiver = match self.resolve_memoized(graph, receiver, memo) {
                    Ok(r) => r,
                    Err(unresolved) => return Ok(AssignmentAdditionResult::UnresolvedValueUsedInRhs(unresolved)),
                };
                let rhs_property = PropertyReferenceResolution { receiver: rhs_receiver, property };
                if self.chain_contains(rhs_property, resolved_lhs) {
                    // цикл: правая часть ссылается обратно на левую
                    return Ok(AssignmentAdditionResult::UnresolvedValueUsedInRhs(rhs));
                }
                ResolutionNode::Property(rhs_property)
            }
            _ => match self.resolve_memoized(graph, rhs, memo) {
                Ok(value) => ResolutionNode::PrimitiveValue(value),
                Err(unresolved) => return Ok(AssignmentAdditionResult::UnresolvedValueUsedInRhs(unresolved)),
            },
        };

        if self.links.insert(resolved_lhs, LinkRecord { target, method, generation }).is_none() {
            self.order.push(resolved_lhs);
        } else {
            debug!(generation = generation.0, "assignment superseded by a later generation");
        }
        Ok(AssignmentAdditionResult::AssignmentAdded { resolved_lhs, rhs: target })
    }

    /// Final value of every assigned property, in first-assignment order.
    pub fn final_assignments(&self, graph: &mut OriginGraph) -> Vec<(PropertyReferenceResolution, AssignmentResolutionResult)> {
        // локальное сжатие путей: свойство -> конец цепочки
        let mut compressed: HashMap<PropertyReferenceResolution, ResolutionNode> = HashMap::new();
        let mut out = Vec::with_capacity(self.order.len());
        for key in &self.order {
            let mut path = Vec::new();
            let mut current = *key;
            let terminal = loop {
                if let Some(done) = compressed.get(&current) {
                    break *done;
                }
                match self.links.get(&current) {
                    Some(LinkRecord { target: ResolutionNode::Property(next), .. }) if !path.contains(&current) => {
                        path.push(current);
                        current = *next;
                    }
                    Some(LinkRecord { target: ResolutionNode::PrimitiveValue(value), .. }) => {
                        break ResolutionNode::PrimitiveValue(*value)
                    }
                    _ => break ResolutionNode::Property(current),
                }
            };
            for visited in path {
                compressed.insert(visited, terminal);
            }

            let method = self.links.get(key).map_or(AssignmentMethod::Property, |l| l.method);
            let result = match terminal {
                ResolutionNode::PrimitiveValue(value) => AssignmentResolutionResult::Assigned { value, method },
                ResolutionNode::Property(property) => match self.default_value(graph, property) {
                    Some(value) => AssignmentResolutionResult::Assigned { value, method },
                    None => AssignmentResolutionResult::Unassigned { property },
                },
            };
            out.push((*key, result));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::origin::Site;
    use crate::dom::{LiteralValue, NodeId, ValueId};
    use crate::schema::{PropertyId, SchemaBuilder, ValueType};

    struct Fixture {
        schema: AnalysisSchema,
        graph: OriginGraph,
        props: Vec<PropertyId>,
        with_default: PropertyId,
    }

    fn fixture(n: usize) -> Fixture {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let props = (0..n).map(|i| b.property(top, format!("p{}", i), ValueType::String)).collect();
        let with_default = b.property_with_default(top, "d", ValueType::String);
        Fixture { schema: b.build(), graph: OriginGraph::new(), props, with_default }
    }

    fn prr(g: &OriginGraph, property: PropertyId) -> PropertyReferenceResolution {
        PropertyReferenceResolution { receiver: g.top_level(), property }
    }

    fn reference(g: &mut OriginGraph, property: PropertyId, site: u32) -> OriginId {
        let receiver = g.top_level();
        g.add(ObjectOrigin::PropertyReference { receiver, property, site: Site::Value(ValueId(site)) })
    }

    fn constant(g: &mut OriginGraph, text: &str) -> OriginId {
        g.add(ObjectOrigin::Constant { literal: LiteralValue::String(text.into()), site: Site::Node(NodeId(0)) })
    }

    #[test]
    fn chain_converges_in_any_insertion_order() {
        let n = 5;
        // p0 = p1, p1 = p2, ..., p3 = p4, p4 = "v"
        let orders: Vec<Vec<usize>> = vec![(0..n).collect(), (0..n).rev().collect(), vec![2, 4, 0, 3, 1]];
        for order in orders {
            let mut f = fixture(n);
            let value = constant(&mut f.graph, "v");
            let schema = &f.schema;
            let mut r = AssignmentResolver::new(schema);
            for i in order {
                let lhs = prr(&f.graph, f.props[i]);
                let rhs = if i + 1 < n { reference(&mut f.graph, f.props[i + 1], i as u32) } else { value };
                let result = r.add_assignment(&mut f.graph, lhs, rhs, AssignmentMethod::Property, GenerationId(0)).unwrap();
                assert!(matches!(result, AssignmentAdditionResult::AssignmentAdded { .. }));
            }
            let finals = r.final_assignments(&mut f.graph);
            assert_eq!(finals.len(), n);
            for (_, result) in finals {
                assert_eq!(result, AssignmentResolutionResult::Assigned { value, method: AssignmentMethod::Property });
            }
        }
    }

    #[test]
    fn second_assignment_in_same_generation_is_reassignment() {
        let mut f = fixture(1);
        let first = constant(&mut f.graph, "a");
        let second = constant(&mut f.graph, "b");
        let lhs = prr(&f.graph, f.props[0]);
        let mut r = AssignmentResolver::new(&f.schema);
        let added = r.add_assignment(&mut f.graph, lhs, first, AssignmentMethod::Property, GenerationId(0)).unwrap();
        assert!(matches!(added, AssignmentAdditionResult::AssignmentAdded { .. }));
        let again = r.add_assignment(&mut f.graph, lhs, second, AssignmentMethod::Property, GenerationId(0)).unwrap();
        assert_eq!(again, AssignmentAdditionResult::Reassignment);
        let finals = r.final_assignments(&mut f.graph);
        assert_eq!(finals[0].1, AssignmentResolutionResult::Assigned { value: first, method: AssignmentMethod::Property });
    }

    #[test]
    fn later_generation_supersedes_and_earlier_is_fatal() {
        let mut f = fixture(1);
        let first = constant(&mut f.graph, "a");
        let second = constant(&mut f.graph, "b");
        let lhs = prr(&f.graph, f.props[0]);
        let mut r = AssignmentResolver::new(&f.schema);
        r.add_assignment(&mut f.graph, lhs, first, AssignmentMethod::SchemaDefault, GenerationId(0)).unwrap();
        r.add_assignment(&mut f.graph, lhs, second, AssignmentMethod::Property, GenerationId(1)).unwrap();
        let finals = r.final_assignments(&mut f.graph);
        assert_eq!(finals[0].1, AssignmentResolutionResult::Assigned { value: second, method: AssignmentMethod::Property });

        let err = r.add_assignment(&mut f.graph, lhs, first, AssignmentMethod::Property, GenerationId(0)).unwrap_err();
        assert!(matches!(err, DclError::GenerationOrderViolation { recorded: GenerationId(1), incoming: GenerationId(0), .. }));
    }

    #[test]
    fn default_value_is_used_for_direct_resolution() {
        let mut f = fixture(1);
        let r = AssignmentResolver::new(&f.schema);
        let use_default = reference(&mut f.graph, f.with_default, 1);
        match r.resolve_to_object_or_property_reference(&mut f.graph, use_default) {
            ResolutionResult::Resolved(id) => {
                assert!(matches!(f.graph.get(id), ObjectOrigin::PropertyDefaultValue { .. }))
            }
            other => panic!("expected default, got {:?}", other),
        }
        let use_plain = reference(&mut f.graph, f.props[0], 2);
        assert_eq!(
            r.resolve_to_object_or_property_reference(&mut f.graph, use_plain),
            ResolutionResult::UnresolvedPropertyUsage(use_plain)
        );
    }

    #[test]
    fn unresolved_rhs_leaves_state_unchanged() {
        let mut f = fixture(2);
        let top = f.graph.top_level();
        let missing = reference(&mut f.graph, f.props[1], 7);
        let call = f.graph.add(ObjectOrigin::FunctionInvocation {
            function: crate::schema::FunctionId(0),
            receiver: Some(top),
            arguments: vec![missing],
            site: Site::Value(ValueId(8)),
        });
        let lhs = prr(&f.graph, f.props[0]);
        let mut r = AssignmentResolver::new(&f.schema);
        let result = r.add_assignment(&mut f.graph, lhs, call, AssignmentMethod::Property, GenerationId(0)).unwrap();
        assert_eq!(result, AssignmentAdditionResult::UnresolvedValueUsedInRhs(missing));
        assert!(r.final_assignments(&mut f.graph).is_empty());
    }

    #[test]
    fn unassigned_chain_end_is_reported_and_cycles_rejected() {
        let mut f = fixture(2);
        let lhs0 = prr(&f.graph, f.props[0]);
        let lhs1 = prr(&f.graph, f.props[1]);
        let to_p1 = reference(&mut f.graph, f.props[1], 1);
        let to_p0 = reference(&mut f.graph, f.props[0], 2);
        let mut r = AssignmentResolver::new(&f.schema);
        r.add_assignment(&mut f.graph, lhs0, to_p1, AssignmentMethod::Property, GenerationId(0)).unwrap();
        let cyclic = r.add_assignment(&mut f.graph, lhs1, to_p0, AssignmentMethod::Property, GenerationId(0)).unwrap();
        assert_eq!(cyclic, AssignmentAdditionResult::UnresolvedValueUsedInRhs(to_p0));
        let finals = r.final_assignments(&mut f.graph);
        assert_eq!(finals, vec![(lhs0, AssignmentResolutionResult::Unassigned { property: lhs1 })]);
    }

    #[test]
    fn chain_ending_at_default_is_assigned_default() {
        let mut f = fixture(1);
        let lhs = prr(&f.graph, f.props[0]);
        let to_default = reference(&mut f.graph, f.with_default, 3);
        let mut r = AssignmentResolver::new(&f.schema);
        r.add_assignment(&mut f.graph, lhs, to_default, AssignmentMethod::Property, GenerationId(0)).unwrap();
        match r.final_assignments(&mut f.graph)[0].1 {
            AssignmentResolutionResult::Assigned { value, .. } => {
                assert!(matches!(f.graph.get(value), ObjectOrigin::PropertyDefaultValue { .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
