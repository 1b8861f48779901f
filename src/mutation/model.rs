//! Schema-level mutation intents and their planning results.

use super::arguments::{NodeProvider, ValueProvider};
use super::document_mutation::DocumentMutation;
use super::scope::ScopeLocation;
use crate::schema::{FunctionId, PropertyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IfNotFoundBehavior {
    #[default]
    FailAndReport,
    /// Missing scopes or targets are not reported as failures.
    Ignore,
}

#[derive(Debug, Clone)]
pub enum ModelMutation {
    SetPropertyValue { property: PropertyId, value: ValueProvider },
    UnsetProperty { property: PropertyId },
    AddNewElement { element: NodeProvider },
    /// Adds an empty `name { }` block unless the scope already has an element configured by `function`.
    AddConfiguringBlockIfAbsent { function: FunctionId },
}

impl ModelMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelMutation::SetPropertyValue { .. } => "set",
            ModelMutation::UnsetProperty { .. } => "unset",
            ModelMutation::AddNewElement { .. } => "add-element",
            ModelMutation::AddConfiguringBlockIfAbsent { .. } => "add-block-if-absent",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelMutationRequest {
    pub location: ScopeLocation,
    pub mutation: ModelMutation,
    pub if_not_found: IfNotFoundBehavior,
}

impl ModelMutationRequest {
    pub fn new(location: ScopeLocation, mutation: ModelMutation) -> Self {
        Self { location, mutation, if_not_found: IfNotFoundBehavior::FailAndReport }
    }

    pub fn ignoring_missing(mut self) -> Self {
        self.if_not_found = IfNotFoundBehavior::Ignore;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMutationFailureReason {
    ScopeLocationNotMatched,
    TargetPropertyNotFound,
}

#[derive(Debug, Clone)]
pub struct UnsuccessfulModelMutation {
    pub request: ModelMutationRequest,
    pub reason: ModelMutationFailureReason,
}

#[derive(Debug, Clone, Default)]
pub struct ModelMutationPlan {
    pub document_mutations: Vec<DocumentMutation>,
    pub unsuccessful: Vec<UnsuccessfulModelMutation>,
}

impl ModelMutationPlan {
    pub fn is_successful(&self) -> bool {
        self.unsuccessful.is_empty()
    }
}
