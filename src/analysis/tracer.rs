/*!
# Assignment tracer

Replays an effect log through the `AssignmentResolver` in operation order and produces:

- one trace element per log entry (recorded or failed);
- a new effect log in which every origin has its property references collapsed;
- the final assignment of every property.

Resolution of each origin is memoized by origin id and frozen after the first use, so a property
reference observes the value assigned at the time it was used.
*/

use tracing::{debug, info};

use super::assignment_resolver::{
    AssignmentAdditionResult, AssignmentResolutionResult, AssignmentResolver, ResolutionMemo,
};
use super::effects::{
    AssignmentRecord, DataAdditionRecord, EffectLog, NestedObjectAccessRecord, OperationId, PropertyReferenceResolution,
};
use super::origin::{ObjectOrigin, OriginGraph, OriginId};
use crate::core::DclError;
use crate::schema::AnalysisSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFailure {
    Reassignment,
    UnresolvedValueUsedInLhs(OriginId),
    UnresolvedValueUsedInRhs(OriginId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome<R> {
    /// Record with resolved origins.
    Recorded(R),
    /// Original record and the reason it was not applied.
    Failed { record: R, failure: TraceFailure },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceElement {
    Assignment(TraceOutcome<AssignmentRecord>),
    Addition(TraceOutcome<DataAdditionRecord>),
    NestedObjectAccess(TraceOutcome<NestedObjectAccessRecord>),
}

impl TraceElement {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TraceElement::Assignment(TraceOutcome::Failed { .. })
                | TraceElement::Addition(TraceOutcome::Failed { .. })
                | TraceElement::NestedObjectAccess(TraceOutcome::Failed { .. })
        )
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentTrace {
    pub elements: Vec<TraceElement>,
    pub resolved_log: EffectLog,
    pub final_assignments: Vec<(PropertyReferenceResolution, AssignmentResolutionResult)>,
}

impl AssignmentTrace {
    pub fn failures(&self) -> impl Iterator<Item = &TraceElement> {
        self.elements.iter().filter(|e| e.is_failure())
    }
}

/// Entry of the merged log; `from_defaults` keeps the list it came from.
enum Entry<'a> {
    Assignment(&'a AssignmentRecord, bool),
    Addition(&'a DataAdditionRecord, bool),
    Access(&'a NestedObjectAccessRecord, bool),
}

impl Entry<'_> {
    fn operation_id(&self) -> OperationId {
        match self {
            Entry::Assignment(r, _) => r.operation_id,
            Entry::Addition(r, _) => r.operation_id,
            Entry::Access(r, _) => r.operation_id,
        }
    }
}

pub struct AssignmentTracer<'s> {
    schema: &'s AnalysisSchema,
}

impl<'s> AssignmentTracer<'s> {
    pub fn new(schema: &'s AnalysisSchema) -> Self {
        Self { schema }
    }

    pub fn trace(&self, graph: &mut OriginGraph, log: &EffectLog) -> Result<AssignmentTrace, DclError> {
        let mut entries: Vec<Entry<'_>> = Vec::with_capacity(log.len());
        entries.extend(log.assignments_from_defaults.iter().map(|r| Entry::Assignment(r, true)));
        entries.extend(log.additions_from_defaults.iter().map(|r| Entry::Addition(r, true)));
        entries.extend(log.nested_object_accesses_from_defaults.iter().map(|r| Entry::Access(r, true)));
        entries.extend(log.assignments.iter().map(|r| Entry::Assignment(r, false)));
        entries.extend(log.additions.iter().map(|r| Entry::Addition(r, false)));
        entries.extend(log.nested_object_accesses.iter().map(|r| Entry::Access(r, false)));
        // стабильная сортировка: при равных id записи по умолчанию идут первыми
        entries.sort_by_key(|e| e.operation_id());

        let mut resolver = AssignmentResolver::new(self.schema);
        let mut memo = ResolutionMemo::new();
        let mut elements = Vec::with_capacity(entries.len());
        let mut resolved_log = EffectLog::default();

        for entry in entries {
            match entry {
                Entry::Assignment(record, from_defaults) => {
                    let element = self.trace_assignment(&mut resolver, graph, &mut memo, record)?;
                    if let TraceOutcome::Recorded(resolved) = &element {
                        let list = if from_defaults { &mut resolved_log.assignments_from_defaults } else { &mut resolved_log.assignments };
                        list.push(resolved.clone());
                    }
                    elements.push(TraceElement::Assignment(element));
                }
                Entry::Addition(record, from_defaults) => {
                    let outcome = match self.resolve_pair(&resolver, graph, &mut memo, record.container, record.added) {
                        Ok((container, added)) => {
                            let resolved = DataAdditionRecord { container, added, ..record.clone() };
                            let list = if from_defaults { &mut resolved_log.additions_from_defaults } else { &mut resolved_log.additions };
                            list.push(resolved.clone());
                            TraceOutcome::Recorded(resolved)
                        }
                        Err(failure) => TraceOutcome::Failed { record: record.clone(), failure },
                    };
                    elements.push(TraceElement::Addition(outcome));
                }
                Entry::Access(record, from_defaults) => {
                    let outcome = match self.resolve_pair(&resolver, graph, &mut memo, record.container, record.accessed) {
                        Ok((container, accessed)) => {
                            let resolved = NestedObjectAccessRecord { container, accessed, ..record.clone() };
                            let list = if from_defaults {
                                &mut resolved_log.nested_object_accesses_from_defaults
                            } else {
                                &mut resolved_log.nested_object_accesses
                            };
                            list.push(resolved.clone());
                            TraceOutcome::Recorded(resolved)
                        }
                        Err(failure) => TraceOutcome::Failed { record: record.clone(), failure },
                    };
                    elements.push(TraceElement::NestedObjectAccess(outcome));
                }
            }
        }

        let final_assignments = resolver.final_assignments(graph);
        let failed = elements.iter().filter(|e| e.is_failure()).count();
        info!(entries = elements.len(), failed, properties = final_assignments.len(), "assignment trace complete");
        Ok(AssignmentTrace { elements, resolved_log, final_assignments })
    }

    fn trace_assignment(
        &self,
        resolver: &mut AssignmentResolver<'s>,
        graph: &mut OriginGraph,
        memo: &mut ResolutionMemo,
        record: &AssignmentRecord,
    ) -> Result<TraceOutcome<AssignmentRecord>, DclError> {
        // сначала фиксируем разрешение затронутых origin'ов в memo
        if let Err(unresolved) = resolver.resolve_memoized(graph, record.lhs.receiver, memo) {
            return Ok(failed(record, TraceFailure::UnresolvedValueUsedInLhs(unresolved)));
        }
        let forced = match graph.get(record.rhs).clone() {
            // голая ссылка связывает свойства, значение не требуется
            ObjectOrigin::PropertyReference { receiver, .. } => resolver.resolve_memoized(graph, receiver, memo),
            _ => resolver.resolve_memoized(graph, record.rhs, memo),
        };
        if let Err(unresolved) = forced {
            return Ok(failed(record, TraceFailure::UnresolvedValueUsedInRhs(unresolved)));
        }

        let result = resolver.add_assignment_memoized(graph, record.lhs, record.rhs, record.method, record.generation, memo)?;
        Ok(match result {
            AssignmentAdditionResult::AssignmentAdded { resolved_lhs, .. } => {
                let rhs = match resolver.resolve_memoized(graph, record.rhs, memo) {
                    Ok(value) => value,
                    // ссылка на ещё не присвоенное свойство остаётся ссылкой
                    Err(_) => record.rhs,
                };
                TraceOutcome::Recorded(AssignmentRecord { lhs: resolved_lhs, rhs, ..record.clone() })
            }
            AssignmentAdditionResult::Reassignment => {
                debug!(operation = record.operation_id.0, "reassignment ignored");
                failed(record, TraceFailure::Reassignment)
            }
            AssignmentAdditionResult::UnresolvedValueUsedInLhs(o) => failed(record, TraceFailure::UnresolvedValueUsedInLhs(o)),
            AssignmentAdditionResult::UnresolvedValueUsedInRhs(o) => failed(record, TraceFailure::UnresolvedValueUsedInRhs(o)),
        })
    }

    fn resolve_pair(
        &self,
        resolver: &AssignmentResolver<'s>,
        graph: &mut OriginGraph,
        memo: &mut ResolutionMemo,
        container: OriginId,
        object: OriginId,
    ) -> Result<(OriginId, OriginId), TraceFailure> {
        let container = resolver.resolve_memoized(graph, container, memo).map_err(TraceFailure::UnresolvedValueUsedInLhs)?;
        let object = resolver.resolve_memoized(graph, object, memo).map_err(TraceFailure::UnresolvedValueUsedInRhs)?;
        Ok((container, object))
    }
}

fn failed(record: &AssignmentRecord, failure: TraceFailure) -> TraceOutcome<AssignmentRecord> {
    TraceOutcome::Failed { record: record.clone(), failure }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::effects::{AssignmentMethod, EffectLogBuilder, GenerationId};
    use crate::analysis::origin::Site;
    use crate::dom::{LiteralValue, NodeId, ValueId};
    use crate::schema::{SchemaBuilder, ValueType};

    #[test]
    fn reference_observes_value_at_time_of_use() {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let a = b.property(top, "a", ValueType::Int);
        let c = b.property(top, "c", ValueType::Int);
        let schema = b.build();

        let mut g = OriginGraph::new();
        let receiver = g.top_level();
        let one = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(1), site: Site::Value(ValueId(0)) });
        let use_a = g.add(ObjectOrigin::PropertyReference { receiver, property: a, site: Site::Value(ValueId(1)) });
        let wrapped = g.add(ObjectOrigin::FunctionInvocation {
            function: crate::schema::FunctionId(0),
            receiver: None,
            arguments: vec![use_a],
            site: Site::Value(ValueId(2)),
        });

        let mut log = EffectLogBuilder::new(GenerationId(0));
        let lhs_a = PropertyReferenceResolution { receiver, property: a };
        let lhs_c = PropertyReferenceResolution { receiver, property: c };
        log.assignment(lhs_a, one, AssignmentMethod::Property, Site::Node(NodeId(0)));
        log.assignment(lhs_c, wrapped, AssignmentMethod::Property, Site::Node(NodeId(1)));
        let log = log.build();

        let trace = AssignmentTracer::new(&schema).trace(&mut g, &log).unwrap();
        assert_eq!(trace.elements.len(), 2);
        assert_eq!(trace.failures().count(), 0);
        let resolved_c = trace.resolved_log.assignments[1].rhs;
        match g.get(resolved_c) {
            ObjectOrigin::FunctionInvocation { arguments, .. } => assert_eq!(arguments, &vec![one]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn defaults_and_explicit_lists_are_merged_by_operation() {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let lib_type = b.data_type("Library");
        let lib = b.configuring_function(top, "library", lib_type);
        let v = b.property(lib_type, "version", ValueType::String);
        let schema = b.build();

        let mut g = OriginGraph::new();
        let top_origin = g.top_level();
        let lib_receiver = g.add(ObjectOrigin::ConfiguringLambdaReceiver { function: lib, receiver: top_origin });
        let default = g.add(ObjectOrigin::Constant { literal: LiteralValue::String("0".into()), site: Site::Node(NodeId(9)) });
        let explicit = g.add(ObjectOrigin::Constant { literal: LiteralValue::String("1".into()), site: Site::Node(NodeId(2)) });

        let mut log = EffectLogBuilder::new(GenerationId(0));
        log.default_nested_access(top_origin, lib_receiver);
        log.default_assignment(PropertyReferenceResolution { receiver: lib_receiver, property: v }, default, Site::Node(NodeId(9)));
        log.set_generation(GenerationId(1));
        log.nested_access(top_origin, lib_receiver);
        log.assignment(
            PropertyReferenceResolution { receiver: lib_receiver, property: v },
            explicit,
            AssignmentMethod::Property,
            Site::Node(NodeId(2)),
        );
        let trace = AssignmentTracer::new(&schema).trace(&mut g, &log.build()).unwrap();

        let kinds: Vec<&str> = trace
            .elements
            .iter()
            .map(|e| match e {
                TraceElement::Assignment(_) => "assign",
                TraceElement::Addition(_) => "add",
                TraceElement::NestedObjectAccess(_) => "access",
            })
            .collect();
        assert_eq!(kinds, vec!["access", "assign", "access", "assign"]);
        assert_eq!(trace.resolved_log.assignments_from_defaults.len(), 1);
        assert_eq!(
            trace.final_assignments[0].1,
            AssignmentResolutionResult::Assigned { value: explicit, method: AssignmentMethod::Property }
        );
    }

    #[test]
    fn failures_are_recorded_and_generation_violation_is_fatal() {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let a = b.property(top, "a", ValueType::Int);
        let missing = b.property(top, "m", ValueType::Int);
        let schema = b.build();

        let mut g = OriginGraph::new();
        let receiver = g.top_level();
        let lhs = PropertyReferenceResolution { receiver, property: a };
        let one = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(1), site: Site::Value(ValueId(0)) });
        let two = g.add(ObjectOrigin::Constant { literal: LiteralValue::Int(2), site: Site::Value(ValueId(1)) });
        let use_missing = g.add(ObjectOrigin::PropertyReference { receiver, property: missing, site: Site::Value(ValueId(2)) });
        let call = g.add(ObjectOrigin::FunctionInvocation {
            function: crate::schema::FunctionId(0),
            receiver: None,
            arguments: vec![use_missing],
            site: Site::Value(ValueId(3)),
        });

        let mut log = EffectLogBuilder::new(GenerationId(1));
        log.assignment(lhs, one, AssignmentMethod::Property, Site::Node(NodeId(0)));
        log.assignment(lhs, two, AssignmentMethod::Property, Site::Node(NodeId(1)));
        log.assignment(lhs, call, AssignmentMethod::Property, Site::Node(NodeId(2)));
        let trace = AssignmentTracer::new(&schema).trace(&mut g, &log.build()).unwrap();
        let failures: Vec<_> = trace
            .failures()
            .map(|e| match e {
                TraceElement::Assignment(TraceOutcome::Failed { failure, .. }) => *failure,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0], TraceFailure::Reassignment);
        assert!(matches!(failures[1], TraceFailure::UnresolvedValueUsedInRhs(_)));

        let mut bad = EffectLogBuilder::new(GenerationId(1));
        bad.assignment(lhs, one, AssignmentMethod::Property, Site::Node(NodeId(0)));
        bad.set_generation(GenerationId(0));
        bad.assignment(lhs, two, AssignmentMethod::Property, Site::Node(NodeId(1)));
        let err = AssignmentTracer::new(&schema).trace(&mut g, &bad.build()).unwrap_err();
        assert!(matches!(err, DclError::GenerationOrderViolation { .. }));
    }
}
