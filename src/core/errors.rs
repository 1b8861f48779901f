/*!
# Error types

Typed errors of the crate. User-facing planning and resolution failures are returned as data
(see `mutation::model` and `analysis::assignment_resolver`); the variants here are either contract
violations or configuration problems.
*/

use thiserror::Error;

use crate::analysis::effects::GenerationId;

/// Errors raised by the analyzer core and its loaders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DclError {
    /// The effect log producer emitted an assignment out of generation order.
    #[error("assignment to '{property}' in generation {incoming} arrived after generation {recorded} was recorded")]
    GenerationOrderViolation {
        property: String,
        recorded: GenerationId,
        incoming: GenerationId,
    },

    #[error("mutation definition '{0}' is already registered")]
    DuplicateMutationDefinition(String),

    #[error("unknown type '{0}' in schema definition")]
    UnknownType(String),

    #[error("invalid schema definition: {0}")]
    InvalidSchema(String),

    #[error("invalid snippet: {0}")]
    InvalidSnippet(String),

    /// A recipe names a type, property or function the schema does not have.
    #[error("'{0}' does not resolve against the schema")]
    UnresolvedName(String),

    #[error("missing mutation argument '{0}'")]
    MissingArgument(String),

    #[error("mutation argument '{name}' has type {actual}, expected {expected}")]
    ArgumentTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
}

pub type DclResult<T> = std::result::Result<T, DclError>;
