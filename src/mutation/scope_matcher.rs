/*!
# Scope location matcher

Enumerates every scope of a document (the top level plus one scope per element node) and runs
each scope's element chain through a small NFA compiled from a `ScopeLocation`:

- one state per location step plus an accepting state;
- `InMatchingScopes` consumes one element when the selector holds;
- `InAnyScope` loops on any element and has an epsilon edge to the next state.

A selector sees the element together with its parent's resolved type (the top-level type for
first-level elements): `ObjectsConfiguredBy` also requires the function's receiver to accept the
parent. Selectors never match unresolved elements or elements below an unresolved parent.
*/

use tracing::debug;

use super::scope::{NestedScopeSelector, Scope, ScopeLocation, ScopeLocationElement};
use crate::dom::resolution::DocumentWithResolution;
use crate::dom::{walk, Document, DocumentNode, NodeId, VisitControl, Visitor};
use crate::schema::{AnalysisSchema, FunctionId, TypeId};

pub struct ScopeLocationMatcher<'a> {
    schema: &'a AnalysisSchema,
    document: &'a DocumentWithResolution,
}

impl<'a> ScopeLocationMatcher<'a> {
    pub fn new(schema: &'a AnalysisSchema, document: &'a DocumentWithResolution) -> Self {
        Self { schema, document }
    }

    /// Top-level scope first, then element scopes in document order.
    pub fn all_scopes(&self) -> Vec<Scope> {
        struct Collector {
            chain: Vec<NodeId>,
            scopes: Vec<Scope>,
        }
        impl Visitor for Collector {
            fn enter(&mut self, id: NodeId, node: &DocumentNode, _doc: &Document) -> VisitControl {
                match node {
                    DocumentNode::Element(_) => {
                        self.chain.push(id);
                        self.scopes.push(Scope::new(self.chain.clone()));
                        VisitControl::Continue
                    }
                    _ => VisitControl::SkipChildren,
                }
            }
            fn leave(&mut self, _id: NodeId, node: &DocumentNode, _doc: &Document) {
                if matches!(node, DocumentNode::Element(_)) {
                    self.chain.pop();
                }
            }
        }

        let mut collector = Collector { chain: Vec::new(), scopes: vec![Scope::top_level()] };
        walk(&self.document.document, &mut collector);
        collector.scopes
    }

    pub fn match_location(&self, location: &ScopeLocation) -> Vec<Scope> {
        let scopes = self.all_scopes();
        let total = scopes.len();
        let matched: Vec<Scope> = scopes.into_iter().filter(|s| self.matches(location, s)).collect();
        debug!(location = %location, scopes = total, matched = matched.len(), "scope location matched");
        matched
    }

    /// Whether `scope` is accepted by the automaton of `location`.
    pub fn matches(&self, location: &ScopeLocation, scope: &Scope) -> bool {
        let steps = location.steps();
        let accepting = steps.len();
        let mut current = vec![false; accepting + 1];
        current[0] = true;
        epsilon_close(steps, &mut current);

        let mut parent = Some(self.schema.top_level_type());
        for element in &scope.elements {
            let resolved = self.document.resolution.node(*element).element();
            let mut next = vec![false; accepting + 1];
            for (state, step) in steps.iter().enumerate() {
                if !current[state] {
                    continue;
                }
                match step {
                    ScopeLocationElement::InAnyScope => next[state] = true,
                    ScopeLocationElement::InMatchingScopes(selector) => {
                        if self.selector_matches(*selector, parent, resolved) {
                            next[state + 1] = true;
                        }
                    }
                }
            }
            epsilon_close(steps, &mut next);
            if !next.iter().any(|s| *s) {
                return false;
            }
            current = next;
            parent = resolved.map(|(_, element_type)| element_type);
        }
        current[accepting]
    }

    fn selector_matches(
        &self,
        selector: NestedScopeSelector,
        parent: Option<TypeId>,
        element: Option<(FunctionId, TypeId)>,
    ) -> bool {
        let (Some(parent), Some((function, element_type))) = (parent, element) else {
            return false;
        };
        match selector {
            NestedScopeSelector::ObjectsOfType(expected) => self.schema.is_subtype_of(element_type, expected),
            NestedScopeSelector::ObjectsConfiguredBy(expected) => {
                function == expected && self.schema.is_subtype_of(parent, self.schema.function(expected).receiver)
            }
        }
    }
}

fn epsilon_close(steps: &[ScopeLocationElement], states: &mut [bool]) {
    // эпсилон-переходы идут только вперёд, одного прохода достаточно
    for (state, step) in steps.iter().enumerate() {
        if states[state] && *step == ScopeLocationElement::InAnyScope {
            states[state + 1] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DocumentAnalyzer, ReferenceAnalyzer};
    use crate::dom::resolution::NodeResolution;
    use crate::schema::{DataParameter, SchemaBuilder, ValueType};

    fn fixture() -> (AnalysisSchema, DocumentWithResolution) {
        let mut b = SchemaBuilder::new("Project");
        let top = b.top_level();
        let component = b.data_type("Component");
        let library = b.data_type("Library");
        b.supertype(library, component);
        let dep = b.data_type("Dependency");
        b.configuring_function(top, "library", library);
        b.configuring_function(top, "tooling", component);
        b.configuring_function(library, "nested", library);
        b.adding_function(library, "dependency", vec![DataParameter::new("id", ValueType::String)], dep, true);
        b.property(library, "version", ValueType::String);
        let schema = b.build();
        let text = "library {\n    nested {\n        dependency(\"a\") { }\n    }\n}\ntooling { }\nunknown { nested { } }\n";
        let document = ReferenceAnalyzer::default().analyze(&schema, text).unwrap();
        (schema, document)
    }

    fn depths(scopes: &[Scope]) -> Vec<usize> {
        scopes.iter().map(|s| s.depth()).collect()
    }

    #[test]
    fn enumerates_all_scopes_in_document_order() {
        let (schema, document) = fixture();
        let matcher = ScopeLocationMatcher::new(&schema, &document);
        assert_eq!(depths(&matcher.all_scopes()), vec![0, 1, 2, 3, 1, 1, 2]);
    }

    #[test]
    fn top_level_only_matches_top_level_location() {
        let (schema, document) = fixture();
        let matcher = ScopeLocationMatcher::new(&schema, &document);
        let matched = matcher.match_location(&ScopeLocation::from_top_level());
        assert_eq!(matched, vec![Scope::top_level()]);
        let lib = schema.type_by_name("Library").unwrap();
        assert!(!matcher.matches(&ScopeLocation::from_top_level().in_objects_of_type(lib), &Scope::top_level()));
    }

    #[test]
    fn type_selector_accepts_subtypes() {
        let (schema, document) = fixture();
        let matcher = ScopeLocationMatcher::new(&schema, &document);
        let component = schema.type_by_name("Component").unwrap();
        let matched = matcher.match_location(&ScopeLocation::from_top_level().in_objects_of_type(component));
        // library и tooling; unknown не разрешён
        assert_eq!(depths(&matched), vec![1, 1]);
    }

    #[test]
    fn any_scope_matches_zero_or_more_levels() {
        let (schema, document) = fixture();
        let matcher = ScopeLocationMatcher::new(&schema, &document);
        let nested = schema.functions_named(schema.type_by_name("Library").unwrap(), "nested")[0];
        let location = ScopeLocation::in_any_scope().in_objects_configured_by(nested);
        assert_eq!(depths(&matcher.match_location(&location)), vec![2]);

        let library = schema.type_by_name("Library").unwrap();
        let also_nested = ScopeLocation::from_top_level().in_objects_of_type(library).also_in_nested_scopes();
        assert_eq!(depths(&matcher.match_location(&also_nested)), vec![1, 2, 3]);
        assert_eq!(matcher.match_location(&ScopeLocation::in_any_scope()).len(), 7);
    }

    #[test]
    fn configured_by_checks_the_parent_type() {
        let (schema, _) = fixture();
        let library = schema.type_by_name("Library").unwrap();
        let nested = schema.functions_named(library, "nested")[0];
        let mut document = ReferenceAnalyzer::default().analyze(&schema, "tooling { nested { } }").unwrap();
        let tooling = document.document.content()[0];
        let inner = document.document.children(tooling)[0];
        // `nested` под `tooling`: Component не является получателем функции
        document.resolution.set_node(inner, NodeResolution::ConfiguringElement { function: nested, element_type: library });

        let matcher = ScopeLocationMatcher::new(&schema, &document);
        let scope = Scope::new(vec![tooling, inner]);
        assert!(!matcher.matches(&ScopeLocation::in_any_scope().in_objects_configured_by(nested), &scope));
        assert!(matcher.matches(&ScopeLocation::in_any_scope().in_objects_of_type(library), &scope));
    }

    #[test]
    fn matching_is_idempotent() {
        let (schema, document) = fixture();
        let matcher = ScopeLocationMatcher::new(&schema, &document);
        let location = ScopeLocation::in_any_scope();
        assert_eq!(matcher.match_location(&location), matcher.match_location(&location));
    }
}
