//! Scopes and scope locations.

use std::fmt;

use crate::dom::NodeId;
use crate::schema::{FunctionId, TypeId};

/// Chain of element nodes from the document root down to some depth; empty for the top level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Scope {
    pub elements: Vec<NodeId>,
}

impl Scope {
    pub fn top_level() -> Self {
        Self::default()
    }

    pub fn new(elements: Vec<NodeId>) -> Self {
        Self { elements }
    }

    pub fn is_top_level(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element owning the scope's content; `None` for the top level.
    pub fn innermost(&self) -> Option<NodeId> {
        self.elements.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.elements.len()
    }
}

/// Predicate over one nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestedScopeSelector {
    /// Elements whose resolved type is the given type or one of its subtypes.
    ObjectsOfType(TypeId),
    /// Elements resolved to exactly this function.
    ObjectsConfiguredBy(FunctionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeLocationElement {
    /// Zero or more nesting levels of any kind.
    InAnyScope,
    /// Exactly one nesting level satisfying the selector.
    InMatchingScopes(NestedScopeSelector),
}

/// Pattern over scope chains, read from the top level down.
///
/// ```
/// use dcl_analyzer::mutation::scope::ScopeLocation;
/// use dcl_analyzer::schema::TypeId;
///
/// let location = ScopeLocation::from_top_level().in_objects_of_type(TypeId(1)).also_in_nested_scopes();
/// assert_eq!(location.steps().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScopeLocation {
    steps: Vec<ScopeLocationElement>,
}

impl ScopeLocation {
    /// Matches only the top-level scope until more steps are added.
    pub fn from_top_level() -> Self {
        Self::default()
    }

    /// Any scope at any depth, the top level included.
    pub fn in_any_scope() -> Self {
        Self { steps: vec![ScopeLocationElement::InAnyScope] }
    }

    pub fn from_steps(steps: Vec<ScopeLocationElement>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[ScopeLocationElement] {
        &self.steps
    }

    pub fn nested(mut self, selector: NestedScopeSelector) -> Self {
        self.steps.push(ScopeLocationElement::InMatchingScopes(selector));
        self
    }

    pub fn in_objects_of_type(self, type_id: TypeId) -> Self {
        self.nested(NestedScopeSelector::ObjectsOfType(type_id))
    }

    pub fn in_objects_configured_by(self, function: FunctionId) -> Self {
        self.nested(NestedScopeSelector::ObjectsConfiguredBy(function))
    }

    /// Any number of intermediate levels before the next step.
    pub fn any_nested(mut self) -> Self {
        self.steps.push(ScopeLocationElement::InAnyScope);
        self
    }

    /// Also match every scope nested below the current endpoint, the endpoint itself included.
    pub fn also_in_nested_scopes(self) -> Self {
        self.any_nested()
    }
}

impl fmt::Display for ScopeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "top-level")?;
        for step in &self.steps {
            match step {
                ScopeLocationElement::InAnyScope => write!(f, " / **")?,
                ScopeLocationElement::InMatchingScopes(NestedScopeSelector::ObjectsOfType(t)) => write!(f, " / type#{}", t.0)?,
                ScopeLocationElement::InMatchingScopes(NestedScopeSelector::ObjectsConfiguredBy(fun)) => {
                    write!(f, " / fn#{}", fun.0)?
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_appends_steps_in_order() {
        let location = ScopeLocation::from_top_level().any_nested().in_objects_configured_by(FunctionId(2));
        assert_eq!(
            location.steps(),
            &[
                ScopeLocationElement::InAnyScope,
                ScopeLocationElement::InMatchingScopes(NestedScopeSelector::ObjectsConfiguredBy(FunctionId(2)))
            ]
        );
        assert_eq!(location.to_string(), "top-level / ** / fn#2");
        assert!(Scope::top_level().is_top_level());
        assert_eq!(Scope::new(vec![NodeId(3), NodeId(5)]).innermost(), Some(NodeId(5)));
    }
}
