//! Mutation parameters, argument values and lazily evaluated providers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::DclError;
use crate::dom::new_nodes::{NewNode, NewValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Int,
    Boolean,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::String => write!(f, "string"),
            ParameterKind::Int => write!(f, "int"),
            ParameterKind::Boolean => write!(f, "boolean"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationParameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: ParameterKind,
}

impl MutationParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: ParameterKind) -> Self {
        Self { name: name.into(), description: description.into(), kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    String(String),
    Int(i32),
    Boolean(bool),
}

impl ArgumentValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ArgumentValue::String(_) => ParameterKind::String,
            ArgumentValue::Int(_) => ParameterKind::Int,
            ArgumentValue::Boolean(_) => ParameterKind::Boolean,
        }
    }

    /// Parse command-line text as a value of the given kind.
    pub fn parse(kind: ParameterKind, name: &str, text: &str) -> Result<Self, DclError> {
        let mismatch = || DclError::ArgumentTypeMismatch {
            name: name.to_string(),
            expected: kind.to_string(),
            actual: format!("'{}'", text),
        };
        match kind {
            ParameterKind::String => Ok(ArgumentValue::String(text.to_string())),
            ParameterKind::Int => text.parse().map(ArgumentValue::Int).map_err(|_| mismatch()),
            ParameterKind::Boolean => text.parse().map(ArgumentValue::Boolean).map_err(|_| mismatch()),
        }
    }

    /// Literal value usable in generated source.
    pub fn to_new_value(&self) -> NewValue {
        match self {
            ArgumentValue::String(s) => NewValue::string(s.clone()),
            ArgumentValue::Int(i) => NewValue::int(*i),
            ArgumentValue::Boolean(b) => NewValue::boolean(*b),
        }
    }

    /// Unquoted text for template substitution.
    pub fn raw_text(&self) -> String {
        match self {
            ArgumentValue::String(s) => s.clone(),
            ArgumentValue::Int(i) => i.to_string(),
            ArgumentValue::Boolean(b) => b.to_string(),
        }
    }
}

/// Arguments supplied for one mutation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationArgumentContainer {
    values: HashMap<String, ArgumentValue>,
}

impl MutationArgumentContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ArgumentValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgumentValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgumentValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a declared parameter, checked against its kind.
    pub fn require(&self, parameter: &MutationParameter) -> Result<&ArgumentValue, DclError> {
        let value = self.get(&parameter.name).ok_or_else(|| DclError::MissingArgument(parameter.name.clone()))?;
        if value.kind() != parameter.kind {
            return Err(DclError::ArgumentTypeMismatch {
                name: parameter.name.clone(),
                expected: parameter.kind.to_string(),
                actual: value.kind().to_string(),
            });
        }
        Ok(value)
    }
}

type ArgumentFn<T> = Arc<dyn Fn(&MutationArgumentContainer) -> Result<T, DclError> + Send + Sync>;

/// Content known up front or computed from the run's arguments.
pub enum Provider<T> {
    Constant(T),
    ArgumentBased(ArgumentFn<T>),
}

impl<T: Clone + Send + Sync + 'static> Provider<T> {
    pub fn argument_based(f: impl Fn(&MutationArgumentContainer) -> Result<T, DclError> + Send + Sync + 'static) -> Self {
        Provider::ArgumentBased(Arc::new(f))
    }

    pub fn evaluate(&self, arguments: &MutationArgumentContainer) -> Result<T, DclError> {
        match self {
            Provider::Constant(value) => Ok(value.clone()),
            Provider::ArgumentBased(f) => f(arguments),
        }
    }

    pub fn map<U: Clone + Send + Sync + 'static>(&self, f: impl Fn(T) -> U + Send + Sync + 'static) -> Provider<U> {
        match self {
            Provider::Constant(value) => Provider::Constant(f(value.clone())),
            Provider::ArgumentBased(inner) => {
                let inner = Arc::clone(inner);
                Provider::argument_based(move |arguments| inner(arguments).map(&f))
            }
        }
    }
}

impl<T: Clone> Clone for Provider<T> {
    fn clone(&self) -> Self {
        match self {
            Provider::Constant(value) => Provider::Constant(value.clone()),
            Provider::ArgumentBased(f) => Provider::ArgumentBased(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Provider::ArgumentBased(_) => f.write_str("ArgumentBased(..)"),
        }
    }
}

pub type ValueProvider = Provider<NewValue>;
pub type NodeProvider = Provider<NewNode>;
pub type NodesProvider = Provider<Vec<NewNode>>;
pub type NameProvider = Provider<String>;
