/*!
# Reference document resolver

Resolves a parsed document against an `AnalysisSchema` by name and produces the resolution
overlay, the origin graph and the effect log consumed by the query/mutation core.

- Elements resolve against the functions of the current receiver type (matching arity).
- Properties resolve against the current receiver type and its supertypes.
- Value factories and named references search the receiver chain, innermost first.

Операции нумеруются в порядке документа, все эффекты получают одно поколение.
*/

use tracing::debug;

use super::effects::{AssignmentMethod, EffectLog, EffectLogBuilder, GenerationId, PropertyReferenceResolution};
use super::origin::{ObjectOrigin, OriginGraph, OriginId, Site};
use crate::dom::resolution::{DocumentResolution, NodeResolution, ValueResolution};
use crate::dom::{walk, Document, DocumentNode, ElementNode, NodeId, ValueId, ValueNode, VisitControl, Visitor};
use crate::schema::{AnalysisSchema, FunctionSemantics, TypeId};

/// Output of the reference resolution pass.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub resolution: DocumentResolution,
    pub origins: OriginGraph,
    pub effects: EffectLog,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDocumentResolver {
    pub generation: GenerationId,
}

impl SchemaDocumentResolver {
    pub fn new(generation: GenerationId) -> Self {
        Self { generation }
    }

    pub fn resolve(&self, schema: &AnalysisSchema, document: &Document) -> ResolvedDocument {
        let origins = OriginGraph::new();
        let top = Frame { receiver: origins.top_level(), receiver_type: schema.top_level_type(), element: None };
        let mut visitor = ResolvingVisitor {
            schema,
            origins,
            resolution: DocumentResolution::new(),
            effects: EffectLogBuilder::new(self.generation),
            frames: vec![top],
        };
        walk(document, &mut visitor);
        debug!(origins = visitor.origins.len(), "document resolved against schema");
        ResolvedDocument { resolution: visitor.resolution, origins: visitor.origins, effects: visitor.effects.build() }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    receiver: OriginId,
    receiver_type: TypeId,
    /// Element that opened this frame; `None` for the top level.
    element: Option<NodeId>,
}

struct ResolvingVisitor<'s> {
    schema: &'s AnalysisSchema,
    origins: OriginGraph,
    resolution: DocumentResolution,
    effects: EffectLogBuilder,
    frames: Vec<Frame>,
}

impl ResolvingVisitor<'_> {
    fn current(&self) -> Frame {
        // нижний кадр (верхний уровень) никогда не снимается
        self.frames[self.frames.len() - 1]
    }

    fn enter_element(&mut self, id: NodeId, element: &ElementNode, has_block: bool, doc: &Document) -> VisitControl {
        let frame = self.current();
        let candidates = self.schema.functions_named(frame.receiver_type, &element.name);
        let function = candidates.into_iter().find(|f| {
            let data = self.schema.function(*f);
            !data.is_value_factory() && data.parameters.len() == element.arguments.len()
        });
        let Some(function) = function else {
            self.resolve_values(&element.arguments, doc);
            return VisitControl::SkipChildren;
        };

        match self.schema.function(function).semantics {
            FunctionSemantics::AccessAndConfigure { configured_type } => {
                let receiver = self.origins.add(ObjectOrigin::ConfiguringLambdaReceiver { function, receiver: frame.receiver });
                self.effects.nested_access(frame.receiver, receiver);
                self.resolution.set_node(id, NodeResolution::ConfiguringElement { function, element_type: configured_type });
                self.frames.push(Frame { receiver, receiver_type: configured_type, element: Some(id) });
                VisitControl::Continue
            }
            FunctionSemantics::AddAndConfigure { added_type, accepts_block } => {
                let arguments = self.resolve_values(&element.arguments, doc);
                if has_block && !accepts_block {
                    return VisitControl::SkipChildren;
                }
                let Some(arguments) = arguments else {
                    return VisitControl::SkipChildren;
                };
                let invocation = self.origins.add(ObjectOrigin::FunctionInvocation {
                    function,
                    receiver: Some(frame.receiver),
                    arguments,
                    site: Site::Node(id),
                });
                self.effects.addition(frame.receiver, invocation);
                let receiver = self.origins.add(ObjectOrigin::AddAndConfigureReceiver { added: invocation });
                self.resolution.set_node(id, NodeResolution::ContainerElement { function, element_type: added_type });
                self.frames.push(Frame { receiver, receiver_type: added_type, element: Some(id) });
                VisitControl::Continue
            }
            FunctionSemantics::Pure { .. } => VisitControl::SkipChildren,
        }
    }

    fn enter_property(&mut self, id: NodeId, name: &str, value: ValueId, doc: &Document) {
        let frame = self.current();
        let rhs = self.resolve_value(value, doc);
        let Some(property) = self.schema.find_property(frame.receiver_type, name) else {
            return;
        };
        self.resolution.set_node(id, NodeResolution::PropertyAssignment { property, receiver_type: frame.receiver_type });
        if let Some(rhs) = rhs {
            let lhs = PropertyReferenceResolution { receiver: frame.receiver, property };
            self.effects.assignment(lhs, rhs, AssignmentMethod::Property, Site::Node(id));
        }
    }

    /// All-or-nothing: `None` if any value fails to resolve.
    fn resolve_values(&mut self, values: &[ValueId], doc: &Document) -> Option<Vec<OriginId>> {
        let resolved: Vec<Option<OriginId>> = values.iter().map(|v| self.resolve_value(*v, doc)).collect();
        resolved.into_iter().collect()
    }

    fn resolve_value(&mut self, id: ValueId, doc: &Document) -> Option<OriginId> {
        match doc.value(id) {
            ValueNode::Literal(literal) => {
                self.resolution.set_value(id, ValueResolution::Literal);
                Some(self.origins.add(ObjectOrigin::Constant { literal: literal.clone(), site: Site::Value(id) }))
            }
            ValueNode::ValueFactory { factory_name, values } => {
                let arguments = self.resolve_values(values, doc);
                let (receiver, function) = self.frames.iter().rev().find_map(|frame| {
                    self.schema
                        .functions_named(frame.receiver_type, factory_name)
                        .into_iter()
                        .find(|f| {
                            let data = self.schema.function(*f);
                            data.is_value_factory() && data.parameters.len() == values.len()
                        })
                        .map(|f| (frame.receiver, f))
                })?;
                self.resolution.set_value(id, ValueResolution::ValueFactory { function });
                let arguments = arguments?;
                Some(self.origins.add(ObjectOrigin::FunctionInvocation {
                    function,
                    receiver: Some(receiver),
                    arguments,
                    site: Site::Value(id),
                }))
            }
            ValueNode::NamedReference { name } => {
                let (receiver, property) = self
                    .frames
                    .iter()
                    .rev()
                    .find_map(|frame| self.schema.find_property(frame.receiver_type, name).map(|p| (frame.receiver, p)))?;
                self.resolution.set_value(id, ValueResolution::NamedReference { property });
                Some(self.origins.add(ObjectOrigin::PropertyReference { receiver, property, site: Site::Value(id) }))
            }
        }
    }
}

impl Visitor for ResolvingVisitor<'_> {
    fn enter(&mut self, id: NodeId, node: &DocumentNode, doc: &Document) -> VisitControl {
        match node {
            DocumentNode::Element(element) => {
                let has_block = doc.node_source(id).block.is_some();
                self.enter_element(id, element, has_block, doc)
            }
            DocumentNode::Property(p) => {
                self.enter_property(id, &p.name, p.value, doc);
                VisitControl::Continue
            }
            DocumentNode::Error(_) => VisitControl::SkipChildren,
        }
    }

    fn leave(&mut self, id: NodeId, _node: &DocumentNode, _doc: &Document) {
        if self.current().element == Some(id) {
            self.frames.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataParameter, SchemaBuilder, ValueType};
    use crate::syntax::parse;

    fn schema() -> AnalysisSchema {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let lib = b.data_type("Library");
        let dep = b.data_type("Dependency");
        b.property(top, "group", ValueType::String);
        b.configuring_function(top, "library", lib);
        b.property(lib, "version", ValueType::String);
        b.adding_function(lib, "dependency", vec![DataParameter::new("id", ValueType::String)], dep, true);
        b.property(dep, "scope", ValueType::String);
        b.value_factory(top, "coords", vec![DataParameter::new("g", ValueType::String)], ValueType::String);
        b.build()
    }

    #[test]
    fn resolves_nested_elements_and_effects() {
        let schema = schema();
        let doc = parse("group = \"g\"\nlibrary {\n    version = coords(group)\n    dependency(\"a\") { scope = \"x\" }\n}\n");
        let resolved = SchemaDocumentResolver::default().resolve(&schema, &doc);

        let library = doc.content()[1];
        assert!(matches!(resolved.resolution.node(library), NodeResolution::ConfiguringElement { .. }));
        let dependency = doc.children(library)[1];
        assert!(matches!(resolved.resolution.node(dependency), NodeResolution::ContainerElement { .. }));
        let scope = doc.children(dependency)[0];
        assert!(matches!(resolved.resolution.node(scope), NodeResolution::PropertyAssignment { .. }));

        let version = doc.property(doc.children(library)[0]).unwrap();
        assert!(matches!(resolved.resolution.value(version.value), ValueResolution::ValueFactory { .. }));

        assert_eq!(resolved.effects.assignments.len(), 3);
        assert_eq!(resolved.effects.additions.len(), 1);
        assert_eq!(resolved.effects.nested_object_accesses.len(), 1);
        let ops: Vec<u64> = resolved.effects.assignments.iter().map(|a| a.operation_id.0).collect();
        assert!(ops.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn repeated_configuring_blocks_share_a_receiver() {
        let schema = schema();
        let doc = parse("library { version = \"1\" }\nlibrary { version = \"2\" }");
        let resolved = SchemaDocumentResolver::default().resolve(&schema, &doc);
        let lhs: Vec<_> = resolved.effects.assignments.iter().map(|a| a.lhs).collect();
        assert_eq!(lhs[0], lhs[1]);
    }

    #[test]
    fn unknown_names_stay_unresolved() {
        let schema = schema();
        let doc = parse("unknown { version = \"1\" }\nlibrary(1)\nmissing = 2\nlibrary { version = nope }");
        let resolved = SchemaDocumentResolver::default().resolve(&schema, &doc);
        let unknown = doc.content()[0];
        assert_eq!(resolved.resolution.node(unknown), NodeResolution::NotResolved);
        assert_eq!(resolved.resolution.node(doc.children(unknown)[0]), NodeResolution::NotResolved);
        assert_eq!(resolved.resolution.node(doc.content()[1]), NodeResolution::NotResolved);
        assert_eq!(resolved.resolution.node(doc.content()[2]), NodeResolution::NotResolved);
        let version = doc.children(doc.content()[3])[0];
        assert!(matches!(resolved.resolution.node(version), NodeResolution::PropertyAssignment { .. }));
        assert!(resolved.effects.assignments.is_empty());
    }
}
