/*!
# Mutations

Schema-aware edits of resolved documents.

```text
MutationDefinition ──► ModelMutationRequest ──► DocumentMutation ──► new text
   (catalog, recipes)     (scope location)        (node/value ids)     (text planner)
```

- `scope`, `scope_matcher` - where in a document a mutation applies
- `model`, `model_planner` - schema-level requests and their translation to node-level edits
- `document_mutation`, `text_tree`, `text_generator`, `text_planner` - node-level edits rendered
  into text that keeps untouched formatting byte for byte
- `definition`, `recipe`, `applicability`, `runner` - reusable definitions, their catalog and execution
*/

pub mod applicability;
pub mod arguments;
pub mod definition;
pub mod document_mutation;
pub mod model;
pub mod model_planner;
pub mod recipe;
pub mod runner;
pub mod scope;
pub mod scope_matcher;
pub mod text_generator;
pub mod text_planner;
pub mod text_tree;

pub use applicability::{ApplicableMutation, MutationApplicability, MutationApplicabilityChecker};
pub use arguments::{
    ArgumentValue, MutationArgumentContainer, MutationParameter, NameProvider, NodeProvider, NodesProvider,
    ParameterKind, Provider, ValueProvider,
};
pub use definition::{MutationDefinition, MutationDefinitionCatalog};
pub use document_mutation::{
    DocumentMutation, DocumentMutationFailureReason, DocumentTextMutationPlan, UnsuccessfulDocumentMutation,
};
pub use model::{
    IfNotFoundBehavior, ModelMutation, ModelMutationFailureReason, ModelMutationPlan, ModelMutationRequest,
    UnsuccessfulModelMutation,
};
pub use model_planner::ModelToDocumentMutationPlanner;
pub use recipe::{load_catalog, load_recipes, MutationRecipe, RecipeDefinition};
pub use runner::{MutationRunIssue, MutationRunResult, MutationRunner, MutationStepResult};
pub use scope::{NestedScopeSelector, Scope, ScopeLocation, ScopeLocationElement};
pub use scope_matcher::ScopeLocationMatcher;
pub use text_planner::DocumentTextMutationPlanner;
pub use text_tree::TextPreservingTree;
